pub mod asof;
pub mod historical;
pub mod ratios;

pub use asof::align_as_of;
pub use historical::{historical_valuation, ValuationPoint};
pub use ratios::{compute_ratios, RatioValue, ValuationRatios, DENOMINATOR_EPSILON};
