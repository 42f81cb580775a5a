//! Error taxonomy shared between the daemon and the CLI.
//!
//! These mirror `spec.md` §7: `signature-invalid`, `name-conflict`,
//! `not-found`, `bad-input`, `storage-io`. They carry just enough detail
//! to render a useful message; the underlying cause (an I/O error, a
//! malformed signature) never needs to cross the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Publishing a `SignedNodeInfo` failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddError {
    /// The signature did not verify.
    SignatureInvalid,
    /// One or more legal identity names already map to a different key.
    NameConflict { names: Vec<String> },
    /// The submitted bytes could not be parsed as a `SignedNodeInfo`.
    Malformed,
    /// A storage-backend read or write failed while processing the
    /// publish.
    StorageIo(String),
}

impl fmt::Display for NodeAddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddError::SignatureInvalid => f.write_str("signature did not verify"),
            NodeAddError::NameConflict { names } => {
                write!(f, "identity name(s) already registered under a different key: {}", names.join(", "))
            }
            NodeAddError::Malformed => f.write_str("malformed signed node info"),
            NodeAddError::StorageIo(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

/// An admin-initiated parameters change failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParametersUpdateError {
    /// The current parameters could not be read back (storage failure).
    StorageIo(String),
    /// The input describing the change was malformed (e.g. a whitelist
    /// line that was not `<fqn>:<sha256>`).
    BadInput(String),
}

impl fmt::Display for ParametersUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParametersUpdateError::StorageIo(msg) => write!(f, "storage error: {msg}"),
            ParametersUpdateError::BadInput(msg) => write!(f, "bad input: {msg}"),
        }
    }
}

/// A lookup by key or hash found nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundError;

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not found")
    }
}

/// The result of publishing a node info.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishNodeResult {
    pub hash: crate::Hash,
}

/// The result of an admin-triggered parameters update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParametersUpdateResult {
    pub new_parameters_hash: crate::Hash,
    pub activates_at: jiff::Timestamp,
}

/// A single line of a whitelist request body: `<fqn>:<sha256-hex>`.
pub fn parse_whitelist_line(line: &str) -> Result<(String, crate::Hash), String> {
    let (fqn, hash) = line
        .split_once(':')
        .ok_or_else(|| format!("malformed whitelist line (expected '<fqn>:<sha256>'): {line}"))?;
    let hash: crate::Hash = hash
        .parse()
        .map_err(|_| format!("malformed attachment hash in whitelist line: {line}"))?;
    if fqn.is_empty() {
        return Err(format!("empty contract name in whitelist line: {line}"));
    }
    Ok((fqn.to_string(), hash))
}

/// The plain-text/JSON view of the currently configured notaries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotaryListResult {
    pub notaries: Vec<crate::NotaryInfo>,
}

/// The plain-text/JSON view of known node infos.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeListResult {
    pub nodes: Vec<NodeListEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeListEntry {
    pub hash: crate::Hash,
    pub legal_identities: Vec<String>,
}

/// The plain-text/JSON view of the whitelist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhitelistResult {
    pub entries: Vec<(String, Vec<crate::Hash>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_whitelist_line() {
        let hash = crate::Hash::of(b"attachment");
        let line = format!("com.example.Contract:{hash}");
        let (fqn, parsed) = parse_whitelist_line(&line).unwrap();
        assert_eq!(fqn, "com.example.Contract");
        assert_eq!(parsed, hash);
    }

    #[test]
    fn rejects_line_without_colon() {
        assert!(parse_whitelist_line("com.example.Contract").is_err());
    }

    #[test]
    fn rejects_line_with_bad_hash() {
        assert!(parse_whitelist_line("com.example.Contract:not-a-hash").is_err());
    }
}
