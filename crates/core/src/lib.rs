//! ML Analysis Core
//!
//! Foundational traits, data model and error types for the ML Analysis
//! workspace. This crate has zero dependencies on application-level code
//! (database, file formats, async runtime, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`) and the analysis
//!   failure taxonomy (`AnalysisError`)
//! - `dataset` - Column-oriented tabular data (`TabularDataset`, `Column`, `ColumnData`)
//! - `capability_trait` - The capability abstraction (`Capability`, `CapabilityOutput`, `Category`)
//!
//! ## Design Principles
//!
//! 1. **Minimal dependencies beyond serde/thiserror/chrono** - keeps build times minimal
//! 2. **Trait-based abstractions** - capability implementations and test
//!    doubles plug in the same way
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod capability_trait;
pub mod dataset;
pub mod error;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{AnalysisError, CoreError, CoreResult};

// ── Dataset ────────────────────────────────────────────────────────────
pub use dataset::{Column, ColumnData, TabularDataset};

// ── Capability Trait ───────────────────────────────────────────────────
pub use capability_trait::{Capability, CapabilityOutput, Category, Parameters, ParamsExt};
