//! Server latency probing
//!
//! Spawns the system `ping` for one round-trip measurement and parses its
//! output. Runs as an ordinary async task so results come back through the
//! caller's channel discipline like every other completion.

use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a latency probe
#[derive(Debug, Error)]
pub enum LatencyError {
    #[error("host did not answer within the timeout")]
    Timeout,

    #[error("could not resolve host")]
    Resolve,

    #[error("failed to run ping: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("unparseable ping output")]
    Parse,
}

/// Ping a host once and return the round-trip time in milliseconds.
pub async fn ping_host(host: &str, timeout: Duration) -> Result<u32, LatencyError> {
    let timeout_secs = timeout.as_secs().max(1).to_string();

    let output = tokio::process::Command::new("ping")
        .args(["-c", "1", "-W", &timeout_secs, host])
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!(host, "ping finished");
    parse_ping_output(&stdout)
}

/// Parse ping output into a round-trip time.
///
/// Prefers the summary line (`rtt min/avg/max/mdev = a/b/c/d ms`, taking the
/// average) and falls back to a per-packet `time=` field.
pub fn parse_ping_output(output: &str) -> Result<u32, LatencyError> {
    let rtt_pattern = Regex::new(r"rtt min/avg/max/mdev = [\d.]+/([\d.]+)/")
        .expect("Failed to compile rtt pattern");
    let time_pattern = Regex::new(r"time=([\d.]+)").expect("Failed to compile time pattern");

    if let Some(captures) = rtt_pattern.captures(output) {
        if let Ok(avg) = captures[1].parse::<f32>() {
            return Ok((avg + 0.5) as u32);
        }
    }

    if let Some(captures) = time_pattern.captures(output) {
        if let Ok(time) = captures[1].parse::<f32>() {
            return Ok((time + 0.5) as u32);
        }
    }

    if output.contains("Destination Host Unreachable") || output.contains("100% packet loss") {
        return Err(LatencyError::Timeout);
    }

    if output.contains("unknown host") || output.contains("Name or service not known") {
        return Err(LatencyError::Resolve);
    }

    Err(LatencyError::Parse)
}

/// Strip a `:port` suffix from a `host:port` address.
pub fn extract_hostname(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty()
                && !host.contains(':')
                && !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            host
        }
        _ => address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rtt_summary_line() {
        let output = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=12.3 ms\n\
                      --- 10.0.0.1 ping statistics ---\n\
                      1 packets transmitted, 1 received, 0% packet loss, time 0ms\n\
                      rtt min/avg/max/mdev = 12.345/23.456/34.567/5.678 ms\n";
        assert_eq!(parse_ping_output(output).unwrap(), 23);
    }

    #[test]
    fn falls_back_to_time_field() {
        let output = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=7.8 ms\n";
        assert_eq!(parse_ping_output(output).unwrap(), 8);
    }

    #[test]
    fn total_loss_reads_as_timeout() {
        let output = "--- 10.0.0.1 ping statistics ---\n\
                      1 packets transmitted, 0 received, 100% packet loss, time 0ms\n";
        assert!(matches!(
            parse_ping_output(output),
            Err(LatencyError::Timeout)
        ));
    }

    #[test]
    fn unknown_host_reads_as_resolve_error() {
        let output = "ping: nowhere.invalid: Name or service not known\n";
        assert!(matches!(
            parse_ping_output(output),
            Err(LatencyError::Resolve)
        ));
    }

    #[test]
    fn strips_port_suffixes_only() {
        assert_eq!(extract_hostname("vpn.example.com:1194"), "vpn.example.com");
        assert_eq!(extract_hostname("vpn.example.com"), "vpn.example.com");
        assert_eq!(extract_hostname("::1"), "::1");
    }
}
