// ABOUTME: Library root for apostello - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod registry;
pub mod remote;
pub mod ssh;
pub mod types;
