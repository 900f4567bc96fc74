//! Port probe command construction and result classification.
//!
//! The probe runs on the target host and prints exactly one marker line
//! naming the detection branch that fired, optionally followed by `|` and
//! the raw listener lines that branch saw. Classification is fail-open:
//! anything ambiguous counts as "no conflict".

use serde::Serialize;

/// Sentinel tokens printed by the probe script.
pub mod markers {
    /// The port is published by the proxy container itself.
    pub const PROXY_USING_PORT: &str = "proxy_using_port";
    /// Nothing listens on the port.
    pub const PORT_FREE: &str = "port_free";
    /// Listener table shows other sockets; detail follows after `|`.
    pub const PORT_CONFLICT: &str = "port_conflict";
    /// No socket tool available and a raw connect succeeded.
    pub const PORT_IN_USE: &str = "port_in_use";
}

/// Outcome of probing one port. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub port: u16,
    pub conflict: bool,
    /// Listener lines reported alongside a conflict marker.
    pub detail: Option<String>,
}

impl ProbeResult {
    #[must_use]
    pub fn free(port: u16) -> Self {
        Self {
            port,
            conflict: false,
            detail: None,
        }
    }
}

/// Shell one-liner probing `port`, treating sockets published by
/// `own_container` as our own.
///
/// Branch order: `ss`, then `netstat`, then `nc -z` against loopback.
#[must_use]
pub fn probe_command(port: u16, own_container: &str) -> String {
    let own = own_container;
    let free = markers::PORT_FREE;
    let conflict = markers::PORT_CONFLICT;
    [
        format!("port={port}"),
        format!(
            "own_id=$(docker ps -q --filter \"name=^{own}$\" 2>/dev/null)"
        ),
        format!(
            "if [ -n \"$own_id\" ] && docker port \"$own_id\" 2>/dev/null | grep -q \":$port$\"; then echo {}; exit 0; fi",
            markers::PROXY_USING_PORT
        ),
        "if command -v ss >/dev/null 2>&1; then out=$(ss -Htln \"sport = :$port\" 2>/dev/null)".to_string(),
        "elif command -v netstat >/dev/null 2>&1; then out=$(netstat -tln 2>/dev/null | grep -E \"[:.]$port[[:space:]]\")".to_string(),
        format!(
            "else if nc -z -w1 127.0.0.1 \"$port\" >/dev/null 2>&1; then echo {}; else echo {free}; fi; exit 0; fi",
            markers::PORT_IN_USE
        ),
        format!("if [ -z \"$out\" ]; then echo {free}; else echo \"{conflict}|$out\"; fi"),
    ]
    .join("; ")
}

/// Classify the raw output of [`probe_command`].
///
/// `exit_code` is `None` when the remote process died from a signal.
#[must_use]
pub fn classify(port: u16, exit_code: Option<i32>, stdout: &str) -> ProbeResult {
    if exit_code != Some(0) {
        return ProbeResult::free(port);
    }
    let output = stdout.trim();
    let (marker, detail) = match output.split_once('|') {
        Some((marker, detail)) => (marker.trim(), Some(detail.trim())),
        None => (output, None),
    };
    match marker {
        markers::PORT_CONFLICT => {
            let detail = detail.unwrap_or_default();
            let lines: Vec<&str> = detail
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            ProbeResult {
                port,
                conflict: !is_dual_stack_listener(port, &lines),
                detail: Some(detail.to_string()),
            }
        }
        markers::PORT_IN_USE => ProbeResult {
            port,
            conflict: true,
            detail: None,
        },
        _ => ProbeResult::free(port),
    }
}

/// One process listening on both the IPv4 and IPv6 wildcard shows up as
/// at most two lines: `0.0.0.0:P` and `:::P` (`[::]:P` in `ss` output).
fn is_dual_stack_listener(port: u16, lines: &[&str]) -> bool {
    if lines.is_empty() || lines.len() > 2 {
        return false;
    }
    let v4 = format!("0.0.0.0:{port}");
    let v6 = [format!(":::{port}"), format!("[::]:{port}")];
    let has_v4 = lines.iter().any(|l| listens_on(l, &v4));
    let has_v6 = lines
        .iter()
        .any(|l| v6.iter().any(|addr| listens_on(l, addr)));
    has_v4 && has_v6
}

/// True when a whitespace-separated column of `line` is exactly `addr`.
fn listens_on(line: &str, addr: &str) -> bool {
    line.split_whitespace().any(|col| col == addr)
}
