pub mod config;
pub mod error;
pub mod registry;
pub mod timeout;
pub mod types;

pub use config::*;
pub use error::*;
pub use registry::*;
pub use timeout::*;
pub use types::*;
