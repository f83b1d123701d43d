//! Sync engine configuration

use std::time::Duration;

use crate::reconcile::OrphanPolicy;

/// Configuration for the import orchestrator and its collaborators.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// IDs fetched per collection page.
    pub page_size: u32,

    /// How long a collected ID queue stays valid.
    pub queue_ttl: Duration,

    /// Delay between one processing tick and the next.
    pub tick_delay: Duration,

    /// Delay between media worker ticks.
    pub media_tick_delay: Duration,

    /// Timeout for fetching a single image.
    pub media_fetch_timeout: Duration,

    /// Run a reconciliation comparison after a run completes.
    pub reconcile_on_complete: bool,

    /// Automatically remediate orphaned listings after the comparison.
    pub auto_handle_orphans: bool,

    /// Remediation applied to orphaned listings when automation is on.
    pub orphan_policy: OrphanPolicy,

    /// Automatically import missing listings after the comparison.
    pub auto_import_missing: bool,

    /// How long a reconciliation comparison stays cached.
    pub comparison_cache_ttl: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            queue_ttl: Duration::from_secs(24 * 60 * 60),
            tick_delay: Duration::from_secs(1),
            media_tick_delay: Duration::from_secs(1),
            media_fetch_timeout: Duration::from_secs(60),
            reconcile_on_complete: false,
            auto_handle_orphans: false,
            orphan_policy: OrphanPolicy::Trash,
            auto_import_missing: false,
            comparison_cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}
