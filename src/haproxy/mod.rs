// ABOUTME: Load balancer integration: stats feed parsing and replica queries.
// ABOUTME: Only consumes HAProxy's stats and PID endpoints, never configures it.

mod client;
mod error;
pub mod stats;

pub use client::{
    HaproxyClient, LoadBalancer, PIDS_PATH, ProxySnapshot, ReplicaStatus, STATS_PATH,
};
pub use error::{ProxyError, ProxyErrorKind};
pub use stats::{BackendAddress, BackendAddressError, BackendRow, ProxyInfo};
