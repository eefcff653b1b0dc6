// ABOUTME: Library root for marathon-bluegreen - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod bluegreen;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod haproxy;
pub mod http;
pub mod marathon;
pub mod output;
pub mod types;
