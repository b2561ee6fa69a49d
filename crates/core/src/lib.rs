//! Core library: folder templates, file signatures, placement signals and the
//! arbiter that turns them into one recorded suggestion.

pub mod arbiter;
pub mod classifier;
pub mod config;
pub mod error;
pub mod learned;
pub mod models;
pub mod pipeline;
pub mod projects;
pub mod records;
pub mod rules;
pub mod signature;
pub mod templates;

pub use arbiter::{ReportOutcome, Router};
pub use error::{RoutingError, StoreError};
pub use models::{FileDescriptor, Method, RoutingCandidate, RoutingRecord, RoutingResult};
