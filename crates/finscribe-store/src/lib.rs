pub mod error;
pub mod memory;
pub mod metrics;
pub mod snapshot;

pub use error::StoreError;
pub use memory::TransactionalMemory;
pub use metrics::MetricsStore;
pub use snapshot::SnapshotWriter;
