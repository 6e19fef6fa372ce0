use palisade_rbac_tracking::policy::EventPolicy;

/// DynamoDB's batch-write ceiling; also the default cascade chunk size.
pub const MAX_BATCH_SIZE: usize = 25;

/// Default attempts for draining unprocessed batch items and throttled calls.
pub const DEFAULT_RETRY_BUDGET: u32 = 8;

/// The store's configuration surface. Injected at construction; nothing global.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct StoreConfig {
    /// The wide-row table holding every entity row.
    #[cfg_attr(
        feature = "clap",
        clap(long, default_value = "rbac", env = "RBAC_TABLE_NAME")
    )]
    table_name: String,

    /// Backend region/endpoint selector; the ambient provider chain applies when unset.
    #[cfg_attr(feature = "clap", clap(long, env = "RBAC_REGION"))]
    region: Option<String>,

    /// Governs audit-event emission per save.
    #[cfg_attr(
        feature = "clap",
        clap(long, default_value = "all-changes", env = "RBAC_EVENT_POLICY", value_enum)
    )]
    event_policy: EventPolicy,

    /// Operations per batch write; the backend's maximum is the ceiling.
    #[cfg_attr(
        feature = "clap",
        clap(long, default_value_t = MAX_BATCH_SIZE, env = "RBAC_BATCH_SIZE")
    )]
    batch_size: usize,

    /// Total attempts for unprocessed-item drains and throttled retries.
    #[cfg_attr(
        feature = "clap",
        clap(long, default_value_t = DEFAULT_RETRY_BUDGET, env = "RBAC_RETRY_BUDGET")
    )]
    retry_budget: u32,
}

impl StoreConfig {
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            region: None,
            event_policy: EventPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub const fn with_event_policy(mut self, event_policy: EventPolicy) -> Self {
        self.event_policy = event_policy;
        self
    }

    /// Clamped to the backend maximum; a zero batch size is meaningless and becomes 1.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            1
        } else if batch_size > MAX_BATCH_SIZE {
            MAX_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    #[must_use]
    pub const fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    #[must_use]
    pub const fn event_policy(&self) -> EventPolicy {
        self.event_policy
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub const fn retry_budget(&self) -> u32 {
        self.retry_budget
    }
}
