// ABOUTME: HAProxy stats and PID endpoint client with DNS replica discovery.
// ABOUTME: Merges every replica's CSV feed into one snapshot per drain step.

use super::error::{InvalidUrlSnafu, MissingHostSnafu, ProxyError, RequestSnafu, StatusSnafu};
use crate::http::HttpClient;
use async_trait::async_trait;
use futures::future::try_join_all;
use http::Uri;
use nonempty::NonEmpty;
use snafu::{OptionExt, ResultExt, ensure};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

pub const STATS_PATH: &str = "/haproxy?stats;csv";
pub const PIDS_PATH: &str = "/_haproxy_getpids";

/// Operations the drain loop needs from the load balancer.
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Succeeds when the stats endpoint answers.
    async fn is_alive(&self) -> Result<(), ProxyError>;

    /// Query every replica's stats feed and process list.
    async fn snapshot(&self) -> Result<ProxySnapshot, ProxyError>;
}

/// Process count reported by one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStatus {
    pub address: String,
    pub pids: usize,
}

/// Concatenated stats of all replicas, in replica order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySnapshot {
    pub csv: String,
    pub replicas: Vec<ReplicaStatus>,
}

impl ProxySnapshot {
    /// The first replica running more than one HAProxy process, which means
    /// a reload is in progress there.
    pub fn reloading_replica(&self) -> Option<&ReplicaStatus> {
        self.replicas.iter().find(|r| r.pids > 1)
    }
}

pub struct HaproxyClient {
    url: String,
    host: String,
    port: u16,
    http: HttpClient,
}

impl HaproxyClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let trimmed = url.trim_end_matches('/');
        let uri: Uri = trimmed.parse().context(InvalidUrlSnafu { url })?;
        let authority = uri.authority().context(MissingHostSnafu { url })?;

        Ok(Self {
            url: trimmed.to_string(),
            host: authority.host().to_string(),
            port: authority.port_u16().unwrap_or(80),
            http: HttpClient::new(timeout),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Base URLs of every replica behind the configured host.
    ///
    /// Each resolved address is one replica. When resolution fails the
    /// configured URL is used as-is.
    pub async fn replicas(&self) -> NonEmpty<String> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let resolved: Vec<SocketAddr> = match tokio::net::lookup_host((host, self.port)).await {
            Ok(addrs) => {
                let mut unique: Vec<SocketAddr> = Vec::new();
                for addr in addrs {
                    if !unique.contains(&addr) {
                        unique.push(addr);
                    }
                }
                unique
            }
            Err(e) => {
                debug!(host = %self.host, error = %e, "load balancer lookup failed, using url as-is");
                Vec::new()
            }
        };

        let urls = resolved
            .into_iter()
            .map(|addr| format!("http://{addr}"))
            .collect();
        NonEmpty::from_vec(urls).unwrap_or_else(|| NonEmpty::new(self.url.clone()))
    }

    async fn fetch(&self, url: String) -> Result<String, ProxyError> {
        let uri: Uri = url.parse().context(InvalidUrlSnafu { url: url.as_str() })?;
        let resp = self
            .http
            .get(&uri)
            .await
            .context(RequestSnafu { url: url.as_str() })?;
        ensure!(
            resp.status.is_success(),
            StatusSnafu {
                url,
                status: resp.status
            }
        );
        Ok(resp.text())
    }

    async fn query_replica(&self, base: String) -> Result<(String, ReplicaStatus), ProxyError> {
        debug!(replica = %base, "querying load balancer stats");
        let csv = self.fetch(format!("{base}{STATS_PATH}")).await?;
        let pids = self.fetch(format!("{base}{PIDS_PATH}")).await?;

        Ok((
            csv,
            ReplicaStatus {
                address: base,
                pids: count_pids(&pids),
            },
        ))
    }
}

#[async_trait]
impl LoadBalancer for HaproxyClient {
    async fn is_alive(&self) -> Result<(), ProxyError> {
        self.fetch(format!("{}{STATS_PATH}", self.url)).await.map(|_| ())
    }

    async fn snapshot(&self) -> Result<ProxySnapshot, ProxyError> {
        let replicas = self.replicas().await;
        let results = try_join_all(replicas.into_iter().map(|base| self.query_replica(base))).await?;

        let mut snapshot = ProxySnapshot::default();
        for (csv, status) in results {
            snapshot.csv.push_str(&csv);
            if !csv.ends_with('\n') {
                snapshot.csv.push('\n');
            }
            snapshot.replicas.push(status);
        }
        Ok(snapshot)
    }
}

fn count_pids(body: &str) -> usize {
    body.split_whitespace().count()
}
