use serde::Serialize;

/// Point-in-time view of gateway bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_size: usize,
    pub active_count: usize,
    pub failure_count: u32,
    pub circuit_open: bool,
    pub pending_dedup_count: usize,
}
