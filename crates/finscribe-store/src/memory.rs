use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use finscribe_models::config::MemoryConfig;
use finscribe_models::memory::{InteractionKind, MemoryEntry, MemoryStats};
use tracing::{debug, warn};

use crate::snapshot::SnapshotWriter;

#[derive(Debug, Default)]
struct AgentBuffer {
    active: Option<String>,
    entries: Vec<MemoryEntry>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buffers: HashMap<String, AgentBuffer>,
    transactions_processed: u64,
    buffers_cleared: u64,
    last_activity: Option<DateTime<Utc>>,
}

/// Short-term, request-scoped memory for agents.
///
/// Each agent owns a buffer with at most one active transaction. Everything
/// buffered under a transaction is discarded when it completes; nothing
/// outlives the request that produced it. Long-term memory does not exist.
pub struct TransactionalMemory {
    state: Mutex<MemoryState>,
    persistence: Option<SnapshotWriter>,
}

impl TransactionalMemory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            persistence: None,
        }
    }

    /// Snapshot each transaction into `dir` before it is cleared.
    pub fn with_persistence(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            persistence: Some(SnapshotWriter::new(dir)),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        if config.persistence {
            Self::with_persistence(&config.persistence_directory)
        } else {
            Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new transaction for `agent`, replacing any active one.
    pub fn start_transaction(&self, agent: &str) -> String {
        let now = Utc::now();
        let transaction_id = format!("{agent}_{}", now.format("%Y-%m-%dT%H:%M:%S%.9f"));

        let mut state = self.lock();
        let buffer = state.buffers.entry(agent.to_string()).or_default();
        if let Some(previous) = buffer.active.replace(transaction_id.clone()) {
            let before = buffer.entries.len();
            buffer.entries.retain(|e| e.transaction_id != previous);
            debug!(
                agent,
                previous = %previous,
                dropped = before - buffer.entries.len(),
                "Replaced unfinished transaction"
            );
        }
        state.last_activity = Some(now);

        transaction_id
    }

    /// Buffer an interaction under the agent's active transaction.
    /// Without an active transaction this does nothing.
    pub fn append(&self, agent: &str, kind: InteractionKind, content: serde_json::Value) {
        let mut state = self.lock();
        let Some(buffer) = state.buffers.get_mut(agent) else {
            debug!(agent, "No memory buffer, interaction dropped");
            return;
        };
        let Some(transaction_id) = buffer.active.clone() else {
            debug!(agent, "No active transaction, interaction dropped");
            return;
        };
        buffer.entries.push(MemoryEntry {
            timestamp: Utc::now(),
            transaction_id,
            agent: agent.to_string(),
            kind,
            content,
        });
    }

    /// Entries of the agent's active transaction, in insertion order.
    pub fn current_contents(&self, agent: &str) -> Vec<MemoryEntry> {
        let state = self.lock();
        match state.buffers.get(agent) {
            Some(AgentBuffer {
                active: Some(id),
                entries,
            }) => entries
                .iter()
                .filter(|e| &e.transaction_id == id)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn active_transaction(&self, agent: &str) -> Option<String> {
        self.lock()
            .buffers
            .get(agent)
            .and_then(|b| b.active.clone())
    }

    /// Close the agent's transaction and drop everything it buffered.
    ///
    /// With persistence enabled the entries are written out first; a failed
    /// write is logged and the buffer is cleared anyway.
    pub fn complete(&self, agent: &str) {
        let released = {
            let mut state = self.lock();
            state.transactions_processed += 1;
            state.last_activity = Some(Utc::now());

            let mut released = Vec::new();
            let mut cleared = false;
            if let Some(buffer) = state.buffers.get_mut(agent) {
                if let Some(id) = buffer.active.take() {
                    let (mine, others): (Vec<_>, Vec<_>) = buffer
                        .entries
                        .drain(..)
                        .partition(|e| e.transaction_id == id);
                    buffer.entries = others;
                    released = mine;
                }
                cleared = true;
            }
            if cleared {
                state.buffers_cleared += 1;
            }
            released
        };

        if let Some(writer) = &self.persistence {
            if !released.is_empty() {
                match writer.write(agent, Utc::now(), &released) {
                    Ok(path) => debug!(agent, path = %path.display(), "Transaction persisted"),
                    Err(e) => warn!(agent, error = %e, "Failed to persist transaction"),
                }
            }
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let state = self.lock();
        MemoryStats {
            transactions_processed: state.transactions_processed,
            buffers_cleared: state.buffers_cleared,
            last_activity: state.last_activity,
            active_buffers: state.buffers.len(),
            buffer_details: state
                .buffers
                .iter()
                .map(|(name, b)| (name.clone(), b.entries.len()))
                .collect(),
        }
    }

    /// Drop every buffer and zero the counters.
    pub fn reset(&self) {
        *self.lock() = MemoryState::default();
    }
}

impl Default for TransactionalMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AGENT: &str = "financial_analyst";

    #[test]
    fn transaction_id_contains_agent_name() {
        let memory = TransactionalMemory::new();
        let id = memory.start_transaction(AGENT);
        assert!(id.starts_with("financial_analyst_"));
        assert_eq!(memory.active_transaction(AGENT), Some(id));
    }

    #[test]
    fn append_without_transaction_is_noop() {
        let memory = TransactionalMemory::new();
        memory.append(AGENT, InteractionKind::Input, json!({"ticker": "AAPL"}));
        assert!(memory.current_contents(AGENT).is_empty());
        assert_eq!(memory.stats().active_buffers, 0);
    }

    #[test]
    fn complete_clears_contents_and_counts() {
        let memory = TransactionalMemory::new();
        memory.start_transaction(AGENT);
        for i in 0..4 {
            memory.append(AGENT, InteractionKind::Input, json!({ "i": i }));
        }
        assert_eq!(memory.current_contents(AGENT).len(), 4);

        let before = memory.stats().buffers_cleared;
        memory.complete(AGENT);

        assert!(memory.current_contents(AGENT).is_empty());
        assert_eq!(memory.active_transaction(AGENT), None);
        let stats = memory.stats();
        assert_eq!(stats.buffers_cleared, before + 1);
        assert_eq!(stats.transactions_processed, 1);
        assert_eq!(stats.buffer_details.get(AGENT), Some(&0));
    }

    #[test]
    fn append_after_complete_is_dropped() {
        let memory = TransactionalMemory::new();
        memory.start_transaction(AGENT);
        memory.complete(AGENT);
        memory.append(AGENT, InteractionKind::Output, json!("late"));
        assert!(memory.current_contents(AGENT).is_empty());
        assert_eq!(memory.stats().buffer_details.get(AGENT), Some(&0));
    }

    #[test]
    fn complete_unknown_agent_does_not_count_a_clear() {
        let memory = TransactionalMemory::new();
        memory.complete("strategic_writer");
        let stats = memory.stats();
        assert_eq!(stats.buffers_cleared, 0);
        assert_eq!(stats.transactions_processed, 1);
    }

    #[test]
    fn restart_replaces_active_transaction() {
        let memory = TransactionalMemory::new();
        memory.start_transaction(AGENT);
        memory.append(AGENT, InteractionKind::Input, json!("first"));

        let second = memory.start_transaction(AGENT);
        memory.append(AGENT, InteractionKind::Input, json!("second"));

        let contents = memory.current_contents(AGENT);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].transaction_id, second);
        assert_eq!(contents[0].content, json!("second"));
        assert_eq!(memory.stats().buffer_details.get(AGENT), Some(&1));
    }

    #[test]
    fn buffers_are_isolated_per_agent() {
        let memory = TransactionalMemory::new();
        memory.start_transaction(AGENT);
        memory.start_transaction("strategic_writer");
        memory.append(AGENT, InteractionKind::Input, json!(1));
        memory.append("strategic_writer", InteractionKind::Output, json!(2));

        memory.complete(AGENT);

        assert!(memory.current_contents(AGENT).is_empty());
        assert_eq!(memory.current_contents("strategic_writer").len(), 1);
    }

    #[test]
    fn persistence_writes_entries_before_clearing() {
        let dir = tempfile::tempdir().unwrap();
        let memory = TransactionalMemory::with_persistence(dir.path());
        memory.start_transaction(AGENT);
        memory.append(AGENT, InteractionKind::Input, json!({"ticker": "MSFT"}));
        memory.complete(AGENT);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let entries: Vec<MemoryEntry> =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content["ticker"], "MSFT");
        assert!(memory.current_contents(AGENT).is_empty());
    }

    #[test]
    fn persistence_failure_does_not_block_complete() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let memory = TransactionalMemory::with_persistence(&blocker);
        memory.start_transaction(AGENT);
        memory.append(AGENT, InteractionKind::Input, json!(1));
        memory.complete(AGENT);

        assert!(memory.current_contents(AGENT).is_empty());
        assert_eq!(memory.stats().buffers_cleared, 1);
    }

    #[test]
    fn reset_zeroes_everything() {
        let memory = TransactionalMemory::new();
        memory.start_transaction(AGENT);
        memory.complete(AGENT);
        memory.reset();
        assert_eq!(memory.stats(), MemoryStats::default());
    }
}
