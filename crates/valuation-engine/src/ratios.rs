use provider_core::FinancialRecord;
use serde::{Serialize, Serializer};

/// Per-share figures this close to zero produce absurd ratios, so they
/// are treated as unusable rather than divided by.
pub const DENOMINATOR_EPSILON: f64 = 0.01;

/// One derived ratio. Unusable inputs are explicit states, not NaN and
/// not zero, so downstream consumers cannot mistake them for data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatioValue {
    Value(f64),
    /// Input missing or too close to zero.
    Unavailable,
    /// Input present but negative; worth flagging separately since it
    /// usually means losses, not missing data.
    UnavailableNegative,
}

impl RatioValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RatioValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RatioValue::Value(_))
    }
}

impl Serialize for RatioValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RatioValue::Value(v) => serializer.serialize_f64(*v),
            RatioValue::Unavailable => serializer.serialize_str("N/A"),
            RatioValue::UnavailableNegative => serializer.serialize_str("N/A (negative)"),
        }
    }
}

impl std::fmt::Display for RatioValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatioValue::Value(v) => write!(f, "{v:.2}"),
            RatioValue::Unavailable => write!(f, "N/A"),
            RatioValue::UnavailableNegative => write!(f, "N/A (negative)"),
        }
    }
}

/// The full derived-ratio set for one price against one annual report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationRatios {
    /// Price / diluted EPS.
    pub pe: RatioValue,
    /// Price / book value per share.
    pub pb: RatioValue,
    /// Price / operating cash flow per share.
    pub pcf: RatioValue,
    pub pe_weighted: RatioValue,
    pub pe_deducted: RatioValue,
    pub pb_adjusted: RatioValue,
    pub capital_reserve_ratio: RatioValue,
    pub undistributed_profit_ratio: RatioValue,
    /// PE / net-profit growth rate; only meaningful with real growth.
    pub peg: RatioValue,
    /// PB x ROE, an implied earnings yield cross-check.
    pub pb_roe: RatioValue,
}

impl ValuationRatios {
    /// Every ratio unusable; used when no prior report exists.
    pub fn unavailable() -> Self {
        Self {
            pe: RatioValue::Unavailable,
            pb: RatioValue::Unavailable,
            pcf: RatioValue::Unavailable,
            pe_weighted: RatioValue::Unavailable,
            pe_deducted: RatioValue::Unavailable,
            pb_adjusted: RatioValue::Unavailable,
            capital_reserve_ratio: RatioValue::Unavailable,
            undistributed_profit_ratio: RatioValue::Unavailable,
            peg: RatioValue::Unavailable,
            pb_roe: RatioValue::Unavailable,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Divide a price by a per-share figure under the sentinel policy:
/// usable above the epsilon, flagged when negative, unavailable otherwise.
pub fn ratio(price: f64, denominator: Option<f64>) -> RatioValue {
    match denominator {
        Some(d) if d > DENOMINATOR_EPSILON => RatioValue::Value(round2(price / d)),
        Some(d) if d < 0.0 => RatioValue::UnavailableNegative,
        _ => RatioValue::Unavailable,
    }
}

/// All derived ratios for one close against one report.
pub fn compute_ratios(price: f64, record: &FinancialRecord) -> ValuationRatios {
    let pe = ratio(price, record.eps);

    let peg = match (pe, record.growth_rate) {
        (RatioValue::Value(pe_v), Some(growth)) if pe_v > 0.0 && growth > DENOMINATOR_EPSILON => {
            RatioValue::Value(round2(pe_v / growth))
        }
        (_, Some(growth)) if growth < 0.0 => RatioValue::UnavailableNegative,
        _ => RatioValue::Unavailable,
    };

    let pb = ratio(price, record.bps);
    let pb_roe = match (pb, record.roe) {
        (RatioValue::Value(pb_v), Some(roe)) if pb_v > 0.0 => {
            RatioValue::Value(round2(pb_v * roe))
        }
        _ => RatioValue::Unavailable,
    };

    ValuationRatios {
        pe,
        pb,
        pcf: ratio(price, record.cashflow_ps),
        pe_weighted: ratio(price, record.weighted_eps),
        pe_deducted: ratio(price, record.deducted_eps),
        pb_adjusted: ratio(price, record.adjusted_bps),
        capital_reserve_ratio: ratio(price, record.capital_reserve_ps),
        undistributed_profit_ratio: ratio(price, record.undistributed_profit_ps),
        peg,
        pb_roe,
    }
}
