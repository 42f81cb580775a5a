//! The notary directory watcher (`spec.md` §4.C).
//!
//! Polls [`Config::notary_dir`](crate::config::Config::notary_dir) on a
//! fixed interval and, whenever its contents change, tells the
//! processor to replace the notary list wholesale via
//! [`ApplicationCommand::NotaryDirectoryChanged`]. This unit holds no
//! state of its own beyond the last digest it observed; everything
//! about *what the current notaries are* lives behind the processor's
//! channel.
//!
//! The upstream notary certificate format is a JKS keystore; this crate
//! substitutes a line-oriented text format instead (see `notary_cert`
//! below), since pulling in a JKS/PKCS#12 parser for a single field
//! (name, a validating flag, and a public key) is not worth the
//! dependency weight. Each file holds one notary, one line:
//! `<name>:<validating-bool>:<public-key-hex>`.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use netmap_api::{LegalIdentity, NotaryInfo};

use crate::comms::ApplicationCommand;

/// How often the directory is re-scanned. Not exposed as a config key;
/// `spec.md` §9 leaves the interval as an implementation detail.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches `dir` for changes to its notary certificate files and pushes
/// the derived notary set into the processor.
pub struct NotaryWatcher {
    pub dir: Utf8PathBuf,
    pub processor_tx: mpsc::UnboundedSender<ApplicationCommand>,
}

impl NotaryWatcher {
    /// Run forever, polling every [`POLL_INTERVAL`]. Returns once the
    /// processor's command channel closes (i.e. the processor has shut
    /// down), matching every other unit's lifetime.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        // The sentinel no real digest can equal, so the first tick
        // always fires even against an empty directory.
        let mut last_digest = String::new();

        loop {
            interval.tick().await;

            let (digest, notaries) = match scan(&self.dir).await {
                Ok(scanned) => scanned,
                Err(err) => {
                    warn!("failed to scan notary directory '{}': {err}", self.dir);
                    continue;
                }
            };

            if digest == last_digest {
                continue;
            }
            last_digest = digest;

            let (reply, reply_rx) = oneshot::channel();
            let cmd = ApplicationCommand::NotaryDirectoryChanged {
                notaries,
                observed_at: Timestamp::now(),
                reply,
            };
            if self.processor_tx.send(cmd).is_err() {
                debug!("processor command channel closed, notary watcher exiting");
                return;
            }
            let _ = reply_rx.await;
        }
    }
}

/// Scan `dir`, returning an order-independent digest over its matching
/// files' contents and the `NotaryInfo` set those files describe.
/// Unparseable files are skipped with a warning rather than failing the
/// whole scan, the same "corrupt entry doesn't abort the operation"
/// posture the processor's own store reads take.
async fn scan(dir: &Utf8Path) -> std::io::Result<(String, Vec<NotaryInfo>)> {
    let mut entries = BTreeMap::new();
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((netmap_api::Hash::of(b"").to_hex(), Vec::new()))
        }
        Err(e) => return Err(e),
    };

    while let Some(entry) = read_dir.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let contents = tokio::fs::read_to_string(entry.path()).await?;
        entries.insert(name, contents);
    }

    let mut digest_input = String::new();
    let mut notaries = Vec::with_capacity(entries.len());
    for (name, contents) in &entries {
        digest_input.push_str(name);
        digest_input.push('\0');
        digest_input.push_str(contents);
        digest_input.push('\0');

        match parse_notary_file(contents) {
            Ok(notary) => notaries.push(notary),
            Err(err) => warn!("skipping malformed notary certificate file '{name}': {err}"),
        }
    }

    Ok((netmap_api::Hash::of(digest_input.as_bytes()).to_hex(), notaries))
}

/// Parse one notary certificate file's single line:
/// `<name>:<validating-bool>:<public-key-hex>`.
fn parse_notary_file(contents: &str) -> Result<NotaryInfo, String> {
    let line = contents.trim();
    let mut parts = line.splitn(3, ':');
    let name = parts.next().filter(|s| !s.is_empty()).ok_or("missing notary name")?;
    let validating = parts
        .next()
        .ok_or("missing validating flag")?
        .parse::<bool>()
        .map_err(|_| "validating flag must be 'true' or 'false'".to_string())?;
    let key_hex = parts.next().ok_or("missing public key")?;
    let owning_key = decode_hex(key_hex)?;

    Ok(NotaryInfo {
        identity: LegalIdentity {
            name: name.to_string(),
            owning_key: Bytes::from(owning_key),
        },
        validating,
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex string: {s}"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| format!("invalid hex in '{s}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notary_line(name: &str, validating: bool, key: &[u8]) -> String {
        let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
        format!("{name}:{validating}:{hex}")
    }

    #[test]
    fn parses_a_well_formed_line() {
        let notary = parse_notary_file(&notary_line("Notary A", true, b"key")).unwrap();
        assert_eq!(notary.identity.name, "Notary A");
        assert!(notary.validating);
        assert_eq!(notary.identity.owning_key.as_ref(), b"key");
    }

    #[test]
    fn rejects_a_missing_field() {
        assert!(parse_notary_file("Notary A:true").is_err());
    }

    #[test]
    fn rejects_a_non_boolean_validating_flag() {
        assert!(parse_notary_file("Notary A:yes:6b6579").is_err());
    }

    #[tokio::test]
    async fn scanning_an_absent_directory_yields_no_notaries() {
        let dir = tempfile::tempdir().unwrap();
        let missing = camino::Utf8Path::from_path(dir.path()).unwrap().join("does-not-exist");
        let (_, notaries) = scan(&missing).await.unwrap();
        assert!(notaries.is_empty());
    }

    #[tokio::test]
    async fn scanning_picks_up_files_and_digest_changes_on_edit() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        tokio::fs::write(root.join("a.notary"), notary_line("Notary A", true, b"key-a"))
            .await
            .unwrap();

        let (first_digest, first_notaries) = scan(root).await.unwrap();
        assert_eq!(first_notaries.len(), 1);

        tokio::fs::write(root.join("b.notary"), notary_line("Notary B", false, b"key-b"))
            .await
            .unwrap();
        let (second_digest, second_notaries) = scan(root).await.unwrap();
        assert_eq!(second_notaries.len(), 2);
        assert_ne!(first_digest, second_digest);
    }

    #[tokio::test]
    async fn rescanning_unchanged_contents_yields_the_same_digest() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        tokio::fs::write(root.join("a.notary"), notary_line("Notary A", true, b"key-a"))
            .await
            .unwrap();

        let (first, _) = scan(root).await.unwrap();
        let (second, _) = scan(root).await.unwrap();
        assert_eq!(first, second);
    }
}
