pub mod classify;
pub mod gateway;
pub mod protocol;
pub mod retry;

pub use classify::{call_failure, classify_failure, hints_for};
pub use gateway::WorkerGateway;
pub use protocol::WorkerResponse;
pub use retry::RetryClient;
