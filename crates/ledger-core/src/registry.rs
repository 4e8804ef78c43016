use crate::{LedgerError, Result};
use std::collections::HashSet;
use tracing::info;

/// Reduce a peer address to its `host:port` form.
///
/// Accepts full URLs (`http://10.0.0.5:5000/`), scheme-relative ones (`//10.0.0.5:5000`)
/// and bare `host:port` strings. Returns `None` when nothing usable remains.
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    let rest = match trimmed.split_once("://") {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => trimmed.strip_prefix("//").unwrap_or(trimmed),
    };
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);

    if host_port.is_empty() || host_port.chars().any(char::is_whitespace) {
        return None;
    }
    Some(host_port.to_ascii_lowercase())
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Deduplicated set of peer addresses.
#[derive(Clone, Debug, Default)]
pub struct NodeRegistry {
    nodes: HashSet<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the normalized address; registering an existing peer is a no-op.
    pub fn register(&mut self, address: &str) -> Result<String> {
        let node = normalize_address(address)
            .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))?;
        if self.nodes.insert(node.clone()) {
            info!(peer = %node, "registered peer");
        }
        Ok(node)
    }

    /// Removes a peer. On an empty registry this silently does nothing, even for
    /// malformed addresses.
    pub fn deregister(&mut self, address: &str) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let node = normalize_address(address)
            .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))?;
        if !self.nodes.remove(&node) {
            return Err(LedgerError::NotFound(node));
        }
        info!(peer = %node, "deregistered peer");
        Ok(())
    }

    /// Snapshot of the members, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.nodes.iter().cloned().collect();
        nodes.sort();
        nodes
    }
}
