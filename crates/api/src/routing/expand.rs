//! Hostname pattern expansion
//!
//! Turns a hostname (and optional port) into the ordered list of candidate
//! patterns the resolver looks up, most specific first:
//!
//! ```text
//! www.example.com -> ["www.example.com", "*.example.com", "*.com", "*"]
//! ```
//!
//! With a port, the port-qualified pattern is preferred over the bare one
//! at every specificity level.

use std::net::Ipv4Addr;

use sitewarden_shared::AliasError;

/// Expand `host` and `port` into candidate domain patterns.
///
/// The result is finite, fully materialized, and deterministic; without a
/// port it always ends in the bare wildcard `*`. IPv4 literals are atomic
/// and never decomposed into wildcard segments.
pub fn expand_netloc(host: &str, port: Option<&str>) -> Result<Vec<String>, AliasError> {
    if host.is_empty() {
        return Err(AliasError::InvalidHost(host.to_string()));
    }

    // IP addresses are atomic: *.0.0.1 would be meaningless.
    if host.parse::<Ipv4Addr>().is_ok() {
        return Ok(with_port_variants(vec![host.to_string()], port));
    }

    let labels: Vec<&str> = host.split('.').collect();
    let mut patterns = Vec::with_capacity(labels.len() + 1);
    for i in 0..=labels.len() {
        if i == 0 {
            patterns.push(host.to_string());
        } else {
            // "*.suffix" for the remaining labels; bare "*" once none remain.
            let pattern: Vec<&str> = std::iter::once("*")
                .chain(labels[i..].iter().copied())
                .collect();
            patterns.push(pattern.join("."));
        }
    }

    Ok(with_port_variants(patterns, port))
}

/// Interleave `pattern:port` before each bare `pattern` when a port is given.
fn with_port_variants(patterns: Vec<String>, port: Option<&str>) -> Vec<String> {
    match port {
        None => patterns,
        Some(port) => {
            let mut result = Vec::with_capacity(patterns.len() * 2);
            for pattern in patterns {
                result.push(format!("{pattern}:{port}"));
                result.push(pattern);
            }
            result
        }
    }
}
