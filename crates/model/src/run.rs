use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Counters for one harvest run. Updated from worker completions; the
/// orchestrator publishes snapshots of this through `RunStatus`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pairs: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

impl RunStats {
    /// A run counts as successful when something was harvested and fewer
    /// than half of the processed pairs failed.
    pub fn is_acceptable(&self) -> bool {
        self.successful > 0 && (self.failed as f64) < (self.processed as f64) * 0.5
    }
}

/// Upload counters accumulated across incremental batches plus the final
/// end-of-run batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub incremental_batches: u64,
    pub incremental_files_uploaded: u64,
    pub final_files_uploaded: u64,
    pub attempts: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::Starting | RunPhase::Running)
    }
}

/// Point-in-time snapshot of a run, safe to hand out across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub processed: usize,
    pub total: usize,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub upload_stats: UploadStats,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            processed: 0,
            total: 0,
            started_at: None,
            ended_at: None,
            last_error: None,
            upload_stats: UploadStats::default(),
        }
    }
}

/// Result of a completed daily run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub stats: RunStats,
    pub upload_stats: UploadStats,
    pub success: bool,
}
