//! Data Models
//!
//! Contains all data structures used throughout the service.

pub mod analysis;
pub mod capability;
pub mod settings;

pub use analysis::*;
pub use capability::*;
pub use settings::*;
