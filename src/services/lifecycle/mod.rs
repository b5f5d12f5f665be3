//! Analysis Lifecycle
//!
//! Asynchronous acceptance and background execution of analysis requests.

pub mod coordinator;
pub mod staging;

pub use coordinator::AnalysisCoordinator;
pub use staging::{stage_bytes, stage_file, StagedPayload};
