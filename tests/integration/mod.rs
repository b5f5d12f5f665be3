//! Integration Tests Module
//!
//! End-to-end tests for the ML Analysis service.
//! Tests cover the capability registry and resolver, parameter inference,
//! execution with fallback substitution, recommendations and the analysis
//! lifecycle against an in-memory SQLite store.

// Registry, resolver and parameter inference tests
mod registry_test;

// Executor and recommendation tests
mod execution_test;

// Lifecycle coordinator tests
mod lifecycle_test;
