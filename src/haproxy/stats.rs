// ABOUTME: Parser for the HAProxy CSV stats feed, possibly from several replicas.
// ABOUTME: Builds a column-indexed backend table and decodes task addresses.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use thiserror::Error;

pub const STATUS_UP: &str = "UP";
pub const STATUS_MAINT: &str = "MAINT";

pub const COLUMN_SVNAME: &str = "svname";
pub const COLUMN_STATUS: &str = "status";
pub const COLUMN_QCUR: &str = "qcur";
pub const COLUMN_SCUR: &str = "scur";

static BACKEND_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<a>\d+)_(?P<b>\d+)_(?P<c>\d+)_(?P<d>\d+)_(?P<port>\d+)$")
        .expect("backend address pattern is valid")
});

/// Split one CSV record. Fields may be double-quoted, with `""` for a
/// literal quote, as HAProxy does for free-text columns such as `check_desc`.
fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell)),
            c => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

/// One data row of the stats feed, cells in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRow(Vec<String>);

impl BackendRow {
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }
}

/// Backend rows for one `{group}_{port}` proxy, merged across every
/// load-balancer replica whose feed was concatenated into the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyInfo {
    columns: HashMap<String, usize>,
    backends: Vec<BackendRow>,
    instance_count: usize,
}

impl ProxyInfo {
    /// Parse `csv`, keeping rows whose proxy name is `backend`.
    ///
    /// Every `#` header row counts as one replica. Column positions come
    /// from the last header seen.
    pub fn parse(csv: &str, backend: &str) -> Self {
        let mut info = ProxyInfo::default();
        let mut header: Vec<String> = Vec::new();

        for line in csv.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let cells = split_record(line);

            if cells[0].starts_with('#') {
                header = cells;
                header[0] = header[0].trim_start_matches('#').trim().to_string();
                info.instance_count += 1;
                continue;
            }

            let is_aggregate = matches!(
                cells.get(1).map(String::as_str),
                Some("BACKEND") | Some("FRONTEND")
            );
            if cells[0] == backend && cells.len() > 1 && !is_aggregate {
                info.backends.push(BackendRow(cells));
            }
        }

        info.columns = header
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_string(), index))
            .collect();

        tracing::debug!(
            backend,
            backends = info.backends.len(),
            replicas = info.instance_count,
            "parsed load balancer stats"
        );
        info
    }

    /// Number of replicas (header rows) the feed was assembled from.
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    pub fn backends(&self) -> &[BackendRow] {
        &self.backends
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn field<'r>(&self, row: &'r BackendRow, column: &str) -> Option<&'r str> {
        self.column(column).and_then(|index| row.cell(index))
    }

    /// Integer value of `column`, zero when absent or not a number.
    pub fn int_field(&self, row: &BackendRow, column: &str) -> u64 {
        self.field(row, column)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn backends_with_status(&self, status: &str) -> Vec<&BackendRow> {
        self.backends
            .iter()
            .filter(|row| self.field(row, COLUMN_STATUS) == Some(status))
            .collect()
    }

    /// `count` divided by the replica count, or `None` when no header row
    /// was seen.
    pub fn per_instance(&self, count: usize) -> Option<usize> {
        count.checked_div(self.instance_count)
    }

    /// Decode the task addresses behind `rows`.
    ///
    /// A server name is accepted only once it has been seen exactly
    /// `instance_count` times, i.e. every replica reports it. Names that do
    /// not encode an IPv4 address and port are skipped.
    pub fn host_ports(&self, rows: &[&BackendRow]) -> HashMap<Ipv4Addr, BTreeSet<u16>> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut result: HashMap<Ipv4Addr, BTreeSet<u16>> = HashMap::new();

        for row in rows {
            let Some(svname) = self.field(row, COLUMN_SVNAME) else {
                continue;
            };
            let count = seen.entry(svname).or_insert(0);
            *count += 1;
            if *count != self.instance_count {
                continue;
            }

            match BackendAddress::parse(svname) {
                Ok(addr) => {
                    result.entry(addr.host).or_default().insert(addr.port);
                }
                Err(e) => tracing::debug!(svname, error = %e, "skipping backend"),
            }
        }
        result
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendAddressError {
    #[error("'{0}' is not of the form a_b_c_d_port")]
    Format(String),

    #[error("'{0}' has an octet out of range")]
    Octet(String),

    #[error("'{0}' has a port out of range")]
    Port(String),
}

/// A task address decoded from a server name such as `10_0_0_5_31005`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendAddress {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl BackendAddress {
    pub fn parse(svname: &str) -> Result<Self, BackendAddressError> {
        let caps = BACKEND_ADDRESS
            .captures(svname)
            .ok_or_else(|| BackendAddressError::Format(svname.to_string()))?;

        let octet = |name: &str| -> Result<u8, BackendAddressError> {
            caps[name]
                .parse()
                .map_err(|_| BackendAddressError::Octet(svname.to_string()))
        };
        let host = Ipv4Addr::new(octet("a")?, octet("b")?, octet("c")?, octet("d")?);
        let port = caps["port"]
            .parse()
            .map_err(|_| BackendAddressError::Port(svname.to_string()))?;

        Ok(Self { host, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_record_honours_quotes() {
        assert_eq!(
            split_record(r#"web,"L7STS, 503","say ""hi""",,x"#),
            vec!["web", "L7STS, 503", r#"say "hi""#, "", "x"]
        );
        assert_eq!(split_record(""), vec![""]);
    }

    const FEED: &str = "\
# pxname,svname,qcur,qmax,scur,smax,status,
web_10000,FRONTEND,,,0,5,OPEN,
web_10000,10_0_0_1_31001,0,0,2,5,UP,
web_10000,10_0_0_2_31002,0,0,0,5,MAINT,
web_10000,BACKEND,0,0,2,5,UP,
other_10000,10_0_0_9_31009,0,0,0,5,UP,
";

    #[test]
    fn keeps_only_task_rows_of_the_backend() {
        let info = ProxyInfo::parse(FEED, "web_10000");
        assert_eq!(info.instance_count(), 1);
        assert_eq!(info.backends().len(), 2);
        assert_eq!(info.field(&info.backends()[0], "svname"), Some("10_0_0_1_31001"));
    }

    #[test]
    fn header_marker_is_stripped_from_first_column() {
        let info = ProxyInfo::parse(FEED, "web_10000");
        assert_eq!(info.column("pxname"), Some(0));
        assert_eq!(info.column("status"), Some(6));
    }

    #[test]
    fn filters_by_status() {
        let info = ProxyInfo::parse(FEED, "web_10000");
        assert_eq!(info.backends_with_status(STATUS_UP).len(), 1);
        let maint = info.backends_with_status(STATUS_MAINT);
        assert_eq!(maint.len(), 1);
        assert_eq!(info.int_field(maint[0], COLUMN_SCUR), 0);
    }

    #[test]
    fn int_field_defaults_to_zero() {
        let info = ProxyInfo::parse(FEED, "web_10000");
        let row = &info.backends()[0];
        assert_eq!(info.int_field(row, "missing"), 0);
        assert_eq!(info.int_field(row, "scur"), 2);
    }

    #[test]
    fn empty_feed_has_no_replicas() {
        let info = ProxyInfo::parse("", "web_10000");
        assert_eq!(info.instance_count(), 0);
        assert_eq!(info.per_instance(4), None);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let feed = FEED.replace('\n', "\r\n");
        let info = ProxyInfo::parse(&feed, "web_10000");
        assert_eq!(info.backends().len(), 2);
        assert_eq!(info.backends_with_status(STATUS_MAINT).len(), 1);
    }

    #[test]
    fn decodes_backend_address() {
        let addr = BackendAddress::parse("10_0_0_5_31005").unwrap();
        assert_eq!(addr.host, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(addr.port, 31005);
    }

    #[test]
    fn rejects_malformed_backend_addresses() {
        assert!(matches!(
            BackendAddress::parse("web-1"),
            Err(BackendAddressError::Format(_))
        ));
        assert!(matches!(
            BackendAddress::parse("10_0_0_256_80"),
            Err(BackendAddressError::Octet(_))
        ));
        assert!(matches!(
            BackendAddress::parse("10_0_0_1_70000"),
            Err(BackendAddressError::Port(_))
        ));
    }

    #[test]
    fn host_ports_skips_names_that_are_not_addresses() {
        let feed = "\
# pxname,svname,status
web_1,10_0_0_1_31001,MAINT
web_1,task-a,MAINT
";
        let info = ProxyInfo::parse(feed, "web_1");
        let rows = info.backends_with_status(STATUS_MAINT);
        let hosts = info.host_ports(&rows);
        assert_eq!(hosts.len(), 1);
        assert!(hosts[&Ipv4Addr::new(10, 0, 0, 1)].contains(&31001));
    }
}
