use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an entry in an agent's transaction buffer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Input,
    Output,
}

/// One buffered interaction, tagged with the transaction it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
    pub agent: String,
    pub kind: InteractionKind,
    pub content: serde_json::Value,
}

/// Counters exposed by the transactional memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub transactions_processed: u64,
    pub buffers_cleared: u64,
    pub last_activity: Option<DateTime<Utc>>,
    /// Number of agents that own a buffer.
    pub active_buffers: usize,
    /// Buffered entry count per agent.
    pub buffer_details: BTreeMap<String, usize>,
}
