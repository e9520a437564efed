//! Read-only vulnerability database clients.
//!
//! The analyzer only ever asks the database two questions: "what is entry
//! `id`" and "which entries affect module `path`". Both are blocking calls;
//! cancellation is propagated through an ambient [`CancelToken`] checked on
//! entry to every lookup.
//!
//! Two implementations are provided:
//! - [`DirClient`] serves the published on-disk catalog layout
//!   (`index.json`, `aliases.json`, `<escaped-module-path>.json`,
//!   `ID/<id>.json`, `ID/index.json`)
//! - [`MemClient`] serves entries from memory, for tests and pre-fetched
//!   catalogs

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::Entry;
use crate::path::{check_module_path, escape_module_path};

/// Default database location when `GOVULNDB` is unset.
pub const DEFAULT_SOURCE: &str = "https://vuln.go.dev";

/// Environment variable naming the database locations, comma separated.
pub const GOVULNDB_ENV: &str = "GOVULNDB";

/// Errors surfaced by database clients.
#[derive(Debug, Error)]
pub enum OsvError {
    /// The ambient cancellation token was triggered.
    #[error("lookup cancelled")]
    Cancelled,

    /// No usable database source among the configured locations.
    #[error("no usable vulnerability database among {0:?}")]
    NoUsableSource(Vec<String>),

    /// A catalog file exists but does not parse.
    #[error("malformed catalog file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog read failed: {0}")]
    Io(#[from] io::Error),
}

/// Cooperative cancellation handle threaded through catalog fetches.
///
/// Clones share the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), OsvError> {
        if self.is_cancelled() {
            Err(OsvError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Read-only lookup interface over the vulnerability database.
pub trait Client {
    /// Fetches a single entry by its database-internal id.
    fn by_id(&self, token: &CancelToken, id: &str) -> Result<Option<Entry>, OsvError>;

    /// Fetches all entries affecting the given module path.
    fn by_module(&self, token: &CancelToken, module_path: &str) -> Result<Vec<Entry>, OsvError>;

    /// Resolves a CVE/GHSA alias to database-internal ids.
    fn by_alias(&self, token: &CancelToken, alias: &str) -> Result<Vec<String>, OsvError>;
}

/// Returns the configured database locations: `GOVULNDB` split on commas,
/// or the default source.
pub fn db_sources() -> Vec<String> {
    match std::env::var(GOVULNDB_ENV) {
        Ok(v) if !v.is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => vec![DEFAULT_SOURCE.to_string()],
    }
}

// ============================================================================
// Directory-backed client
// ============================================================================

/// Client over an on-disk catalog in the published database layout.
#[derive(Debug, Clone)]
pub struct DirClient {
    root: PathBuf,
}

impl DirClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirClient { root: root.into() }
    }

    /// Picks the first locally-servable source from a `GOVULNDB`-style list:
    /// a `file://` URL or a plain directory path. Remote transports are the
    /// business of an external client implementation.
    pub fn from_sources(sources: &[String]) -> Result<Self, OsvError> {
        for source in sources {
            if let Some(path) = source.strip_prefix("file://") {
                return Ok(DirClient::new(path));
            }
            if !source.contains("://") {
                return Ok(DirClient::new(source.as_str()));
            }
            tracing::debug!(target: "vulnreach", source = %source, "skipping non-local database source");
        }
        Err(OsvError::NoUsableSource(sources.to_vec()))
    }

    /// The module index: module path to last-modified timestamp.
    pub fn index(&self) -> Result<BTreeMap<String, DateTime<Utc>>, OsvError> {
        match self.read_json(&self.root.join("index.json"))? {
            Some(index) => Ok(index),
            None => Ok(BTreeMap::new()),
        }
    }

    /// All known entry ids, from `ID/index.json`.
    pub fn ids(&self) -> Result<Vec<String>, OsvError> {
        match self.read_json(&self.root.join("ID").join("index.json"))? {
            Some(ids) => Ok(ids),
            None => Ok(Vec::new()),
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, OsvError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| OsvError::Malformed {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl Client for DirClient {
    fn by_id(&self, token: &CancelToken, id: &str) -> Result<Option<Entry>, OsvError> {
        token.check()?;
        self.read_json(&self.root.join("ID").join(format!("{id}.json")))
    }

    fn by_module(&self, token: &CancelToken, module_path: &str) -> Result<Vec<Entry>, OsvError> {
        token.check()?;
        if !check_module_path(module_path) {
            return Ok(Vec::new());
        }
        let file = self.root.join(format!("{}.json", escape_module_path(module_path)));
        match self.read_json(&file)? {
            Some(entries) => Ok(entries),
            None => Ok(Vec::new()),
        }
    }

    fn by_alias(&self, token: &CancelToken, alias: &str) -> Result<Vec<String>, OsvError> {
        token.check()?;
        let aliases: Option<BTreeMap<String, Vec<String>>> =
            self.read_json(&self.root.join("aliases.json"))?;
        Ok(aliases
            .and_then(|mut map| map.remove(alias))
            .unwrap_or_default())
    }
}

// ============================================================================
// In-memory client
// ============================================================================

/// Client over an in-memory module-to-entries map. The fixture counterpart
/// of [`DirClient`].
#[derive(Debug, Clone, Default)]
pub struct MemClient {
    by_module: BTreeMap<String, Vec<Entry>>,
    aliases: BTreeMap<String, Vec<String>>,
}

impl MemClient {
    pub fn new(by_module: BTreeMap<String, Vec<Entry>>) -> Self {
        MemClient {
            by_module,
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<String, Vec<String>>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Registers `entry` under `module_path`, keeping insertion order.
    pub fn insert(&mut self, module_path: impl Into<String>, entry: Entry) {
        self.by_module.entry(module_path.into()).or_default().push(entry);
    }
}

impl Client for MemClient {
    fn by_id(&self, token: &CancelToken, id: &str) -> Result<Option<Entry>, OsvError> {
        token.check()?;
        Ok(self
            .by_module
            .values()
            .flatten()
            .find(|e| e.id == id)
            .cloned())
    }

    fn by_module(&self, token: &CancelToken, module_path: &str) -> Result<Vec<Entry>, OsvError> {
        token.check()?;
        if !check_module_path(module_path) {
            return Ok(Vec::new());
        }
        Ok(self.by_module.get(module_path).cloned().unwrap_or_default())
    }

    fn by_alias(&self, token: &CancelToken, alias: &str) -> Result<Vec<String>, OsvError> {
        token.check()?;
        Ok(self.aliases.get(alias).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            ..Entry::default()
        }
    }

    mod sources {
        use super::*;

        #[test]
        fn file_url_becomes_directory() {
            let client =
                DirClient::from_sources(&["file:///tmp/vulndb".to_string()]).unwrap();
            assert_eq!(client.root, PathBuf::from("/tmp/vulndb"));
        }

        #[test]
        fn plain_path_is_accepted() {
            let client = DirClient::from_sources(&["/tmp/vulndb".to_string()]).unwrap();
            assert_eq!(client.root, PathBuf::from("/tmp/vulndb"));
        }

        #[test]
        fn remote_only_sources_are_rejected() {
            let err = DirClient::from_sources(&["https://vuln.go.dev".to_string()]).unwrap_err();
            assert!(matches!(err, OsvError::NoUsableSource(_)));
        }

        #[test]
        fn remote_sources_are_skipped_in_favor_of_local() {
            let client = DirClient::from_sources(&[
                "https://vuln.go.dev".to_string(),
                "file:///tmp/db".to_string(),
            ])
            .unwrap();
            assert_eq!(client.root, PathBuf::from("/tmp/db"));
        }
    }

    mod dir_client {
        use super::*;

        fn write_catalog(dir: &Path) {
            fs::create_dir_all(dir.join("ID")).unwrap();
            fs::create_dir_all(dir.join("b.com")).unwrap();
            let entries = vec![entry("GO-2024-0001")];
            fs::write(
                dir.join("b.com/m.json"),
                serde_json::to_vec(&entries).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.join("ID").join("GO-2024-0001.json"),
                serde_json::to_vec(&entry("GO-2024-0001")).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.join("ID").join("index.json"),
                serde_json::to_vec(&vec!["GO-2024-0001"]).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.join("aliases.json"),
                serde_json::to_vec(&BTreeMap::from([(
                    "CVE-2024-11111".to_string(),
                    vec!["GO-2024-0001".to_string()],
                )]))
                .unwrap(),
            )
            .unwrap();
        }

        #[test]
        fn reads_module_entries() {
            let dir = tempfile::tempdir().unwrap();
            write_catalog(dir.path());
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            let entries = client.by_module(&token, "b.com/m").unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].id, "GO-2024-0001");
        }

        #[test]
        fn missing_module_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            write_catalog(dir.path());
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            assert!(client.by_module(&token, "c.com/none").unwrap().is_empty());
        }

        #[test]
        fn invalid_module_path_skips_lookup() {
            let dir = tempfile::tempdir().unwrap();
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            assert!(client.by_module(&token, "bad//path").unwrap().is_empty());
        }

        #[test]
        fn reads_entry_by_id() {
            let dir = tempfile::tempdir().unwrap();
            write_catalog(dir.path());
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            let found = client.by_id(&token, "GO-2024-0001").unwrap();
            assert_eq!(found.unwrap().id, "GO-2024-0001");
            assert!(client.by_id(&token, "GO-9999-9999").unwrap().is_none());
        }

        #[test]
        fn resolves_aliases() {
            let dir = tempfile::tempdir().unwrap();
            write_catalog(dir.path());
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            let ids = client.by_alias(&token, "CVE-2024-11111").unwrap();
            assert_eq!(ids, vec!["GO-2024-0001"]);
            assert!(client.by_alias(&token, "CVE-0000-0000").unwrap().is_empty());
        }

        #[test]
        fn lists_known_ids() {
            let dir = tempfile::tempdir().unwrap();
            write_catalog(dir.path());
            let client = DirClient::new(dir.path());

            assert_eq!(client.ids().unwrap(), vec!["GO-2024-0001"]);
        }

        #[test]
        fn malformed_file_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("b.com")).unwrap();
            fs::write(dir.path().join("b.com/m.json"), b"{not json").unwrap();
            let client = DirClient::new(dir.path());
            let token = CancelToken::new();

            let err = client.by_module(&token, "b.com/m").unwrap_err();
            assert!(matches!(err, OsvError::Malformed { .. }));
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancelled_token_stops_lookups() {
            let client = MemClient::default();
            let token = CancelToken::new();
            token.cancel();

            assert!(matches!(
                client.by_module(&token, "b.com/m"),
                Err(OsvError::Cancelled)
            ));
            assert!(matches!(
                client.by_id(&token, "GO-2024-0001"),
                Err(OsvError::Cancelled)
            ));
        }

        #[test]
        fn clones_share_the_flag() {
            let token = CancelToken::new();
            let clone = token.clone();
            clone.cancel();
            assert!(token.is_cancelled());
        }
    }

    mod mem_client {
        use super::*;

        #[test]
        fn serves_inserted_entries() {
            let mut client = MemClient::default();
            client.insert("b.com/m", entry("GO-2024-0001"));
            let token = CancelToken::new();

            let entries = client.by_module(&token, "b.com/m").unwrap();
            assert_eq!(entries.len(), 1);
            assert!(client.by_module(&token, "other.com/x").unwrap().is_empty());
        }

        #[test]
        fn by_id_scans_all_modules() {
            let mut client = MemClient::default();
            client.insert("a.com/a", entry("GO-2024-0001"));
            client.insert("b.com/b", entry("GO-2024-0002"));
            let token = CancelToken::new();

            let found = client.by_id(&token, "GO-2024-0002").unwrap();
            assert_eq!(found.unwrap().id, "GO-2024-0002");
        }
    }
}
