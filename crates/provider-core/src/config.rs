use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE: f64 = 1.5;
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_REPORT_CACHE_CAPACITY: usize = 128;
pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(300);

/// How the isolated worker process is launched. The gateway appends the
/// endpoint name and the parameter transfer artifact as trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        WorkerCommand::new("python3").with_args(["akshare_worker.py"])
    }
}

/// Immutable configuration handed to the orchestrator at construction.
/// Retry and pool defaults live here rather than in process-wide globals.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub worker: WorkerCommand,
    pub max_retries: u32,
    pub backoff_base: f64,
    /// Fan-out pool size; sized to the heaviest known caller.
    pub pool_size: usize,
    pub report_cache_capacity: usize,
    pub price_cache_ttl: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            worker: WorkerCommand::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            pool_size: DEFAULT_POOL_SIZE,
            report_cache_capacity: DEFAULT_REPORT_CACHE_CAPACITY,
            price_cache_ttl: DEFAULT_PRICE_CACHE_TTL,
        }
    }
}

impl ProviderConfig {
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn with_report_cache_capacity(mut self, capacity: usize) -> Self {
        self.report_cache_capacity = capacity.max(1);
        self
    }

    pub fn with_price_cache_ttl(mut self, ttl: Duration) -> Self {
        self.price_cache_ttl = ttl;
        self
    }
}
