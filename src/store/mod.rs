pub mod coordinator;
pub mod flows;
pub mod reports;
pub mod storage;

pub use coordinator::StateCoordinator;
pub use flows::FlowStore;
pub use reports::{ReportStore, REPORT_CAP};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageKey};
