//! Core domain logic for BatteryGuard.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::object::{
    Battery, BatteryStatus, BuildingObject, Contact, DeviceType, FileAttachment, FileCategory,
    FileKind, IssueStatus, LogEntry, ObjectTask, ObjectValidationError, PendingIssue,
    RecurrenceInterval, RegularEvent, TaskPriority, TaskStatus, TechKind, Technology,
};
pub use model::report::{Report, ReportMeasurement, ReportStatus, SupplierInfo, VERDICT_PASS};
pub use model::{new_entity_id, EntityId};
pub use repo::object_repo::{ObjectRepository, ObjectRootUpdate, SqliteObjectRepository};
pub use repo::sequence_repo::{SequenceGenerator, SqliteSequenceGenerator};
pub use repo::tree_repo::{
    NestedCollection, NestedItem, ObjectTreeRepository, SqliteObjectTreeRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::object_service::ObjectService;
pub use service::report_service::{ReportService, ReportServiceError};
pub use service::tree_service::TreeService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
