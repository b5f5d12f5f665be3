//! Storage Layer
//!
//! Handles all data persistence: SQLite database, the result store built on
//! it, and JSON config.

pub mod config;
pub mod database;
pub mod result_store;

pub use config::*;
pub use database::*;
pub use result_store::*;
