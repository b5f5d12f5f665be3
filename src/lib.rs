//! ML Analysis Service - Backend Library
//!
//! Accepts analysis requests over tabular datasets, dispatches them to a
//! catalog of statistical and machine-learning capabilities, and stores the
//! results together with visualization hints, complementary analyses and
//! prioritized actions. It includes:
//! - Capability registry, resolver and parameter inference
//! - Analysis executor with fallback substitution
//! - Recommendation engine and lifecycle coordinator
//! - Storage layer (SQLite, Config)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

// ── Models ─────────────────────────────────────────────────────────────
pub use models::analysis::{
    Acceptance, ActionKind, ActionRecommendation, AnalysisRequest, AnalysisResult, AnalysisRun,
    AnalysisStatus, ComplementarySuggestion, DatasetReference, FallbackReason, Industry, Priority,
    Visualization,
};
pub use models::capability::{CapabilityDescriptor, ParameterMetadata, ParameterSpec};
pub use models::settings::{ConfigUpdate, ServiceConfig};

// ── Services ───────────────────────────────────────────────────────────
pub use services::{
    AnalysisCoordinator, AnalysisExecutor, CapabilityRegistry, CapabilityResolver,
    DatasetLoader, Execution, FileDatasetLoader, ParameterResolver, RecommendationEngine,
};

// ── Storage & State ────────────────────────────────────────────────────
pub use state::ServiceState;
pub use storage::{ResultStore, SqliteResultStore};
pub use utils::error::{AppError, AppResult};
