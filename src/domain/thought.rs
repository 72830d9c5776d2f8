//! Reasoning steps recorded in the confidence chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step in the confidence chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    /// Position in the chain; ids are dense and start at 0
    pub id: u64,

    /// Chain-wide creation sequence; unlike `id`, never reused after truncation
    #[serde(default)]
    pub seq: u64,

    pub description: String,

    pub reasoning: String,

    /// Reliability score in [0, 1]
    pub confidence: f64,

    /// Checkpoint this step was recorded against, if any
    pub checkpoint_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ThoughtStep {
    /// Whether this step falls strictly below `threshold`
    pub fn is_below(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}
