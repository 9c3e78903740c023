//! Manifest synchronizer - reconciles a media tree against the persisted manifest
//!
//! Records whose lookup already reached a final answer (an identifier or a
//! confirmed miss) are reused untouched; only unresolved records hit the
//! metadata service. The manifest is rewritten after every
//! `checkpoint_interval` newly resolved records, so an aborted run loses at
//! most that many lookups.

use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

use crate::config::LibraryConfig;
use crate::error::ScanError;
use crate::filter::MediaFilter;
use crate::manifest::{sort_records, Manifest, ManifestStore};
use crate::metadata::{Metadata, MetadataSource};
use crate::models::{MediaEntry, MediaNode, MediaRecord, MediaTree, Resolution};
use crate::normalize::normalize_filename;
use crate::progress::{ProgressReporter, SyncPhase};
use crate::scanner;

/// Counters for one synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Media files in the scanned tree
    pub total: u64,
    /// Records reused without a lookup
    pub cached: u64,
    /// Records that received an identifier in this run
    pub fetched: u64,
    /// Records confirmed absent upstream in this run
    pub not_found: u64,
    /// Records looked up but still without an identifier
    pub unresolved: u64,
    /// Manifest records whose file was not seen in this scan
    pub stale: u64,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

/// Result of a synchronization run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Full manifest, stale records included
    pub manifest: Manifest,
    /// Keys of the files present in this scan, in traversal order
    pub present: Vec<String>,
    pub stats: SyncStats,
}

impl SyncOutcome {
    /// Records for files present in this scan, sorted for display
    pub fn records(&self) -> Vec<MediaRecord> {
        let mut records: Vec<MediaRecord> = self
            .present
            .iter()
            .filter_map(|key| self.manifest.get(key).cloned())
            .collect();
        sort_records(&mut records);
        records
    }
}

/// A media file together with its manifest key and parent directory name
#[derive(Debug)]
struct Leaf<'t> {
    key: String,
    parent: &'t str,
    node: &'t MediaNode,
}

/// Flatten the tree depth first; keys are `/`-joined below the media root
fn collect_leaves<'t>(tree: &'t MediaTree, base: &str, parent: &'t str, out: &mut Vec<Leaf<'t>>) {
    for (name, entry) in &tree.entries {
        let key = format!("{}/{}", base, name);
        match entry {
            MediaEntry::Media(node) => out.push(Leaf { key, parent, node }),
            MediaEntry::Dir(subtree) => collect_leaves(subtree, &key, name, out),
        }
    }
}

/// Whether a failed file-name lookup should be retried with the directory name
///
/// Only when both differ and share at least one token, so a generic folder
/// such as `Downloads` is never queried for an unrelated file.
pub fn should_retry_with_parent(normalized_file: &str, normalized_parent: &str) -> bool {
    normalized_parent != normalized_file
        && normalized_file
            .split(' ')
            .any(|token| normalized_parent.contains(token))
}

/// Reconciles media trees against a manifest store
pub struct Synchronizer<'a> {
    source: &'a dyn MetadataSource,
    store: &'a ManifestStore,
    reporter: Option<&'a ProgressReporter>,
    checkpoint_interval: u64,
}

impl<'a> Synchronizer<'a> {
    pub fn new(source: &'a dyn MetadataSource, store: &'a ManifestStore) -> Self {
        Self {
            source,
            store,
            reporter: None,
            checkpoint_interval: 1,
        }
    }

    /// Report progress while reconciling
    pub fn with_reporter(mut self, reporter: &'a ProgressReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Persist after this many newly resolved records (minimum 1)
    pub fn checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Bring `previous` up to date with `tree`
    ///
    /// Lookup failures other than "not found" abort the run; whatever was
    /// checkpointed before stays on disk.
    pub async fn synchronize(
        &self,
        previous: Manifest,
        tree: &MediaTree,
    ) -> Result<SyncOutcome, ScanError> {
        let start = Instant::now();
        let mut leaves = Vec::new();
        collect_leaves(tree, "", "", &mut leaves);

        let mut manifest = previous;
        let mut present = Vec::with_capacity(leaves.len());
        let mut stats = SyncStats {
            total: leaves.len() as u64,
            ..Default::default()
        };
        let mut pending_writes = 0u64;

        for (visited, leaf) in leaves.iter().enumerate() {
            let record = manifest
                .get(&leaf.key)
                .cloned()
                .unwrap_or_else(|| MediaRecord::new(leaf.node));

            // Fresh records are always unresolved, so a final one is already stored.
            if record.imdb_id.is_final() {
                log::debug!("Reusing manifest record for {}", leaf.key);
                stats.cached += 1;
            } else {
                let record = self.resolve(record, leaf.parent).await?;
                match record.imdb_id {
                    Resolution::Resolved(_) => stats.fetched += 1,
                    Resolution::NotFound => stats.not_found += 1,
                    Resolution::Unresolved => stats.unresolved += 1,
                }
                manifest.insert(leaf.key.clone(), record);

                pending_writes += 1;
                if pending_writes >= self.checkpoint_interval {
                    self.store.save(&manifest).await?;
                    pending_writes = 0;
                }
            }

            present.push(leaf.key.clone());
            if let Some(reporter) = self.reporter {
                reporter.report_progress(
                    SyncPhase::Sync,
                    visited as u64 + 1,
                    stats.total,
                    &stats,
                    &leaf.key,
                );
            }
        }

        self.store.save(&manifest).await?;

        let seen: HashSet<&String> = present.iter().collect();
        stats.stale = manifest.keys().filter(|key| !seen.contains(key)).count() as u64;
        stats.duration_ms = start.elapsed().as_millis() as u64;

        Ok(SyncOutcome {
            manifest,
            present,
            stats,
        })
    }

    /// Look up metadata for an unresolved record, falling back to its directory name
    async fn resolve(&self, mut record: MediaRecord, parent: &str) -> Result<MediaRecord, ScanError> {
        let normalized = normalize_filename(&record.name);
        let mut metadata = self.fetch(&normalized).await?;

        if !metadata.is_resolved() {
            let normalized_parent = normalize_filename(parent);
            if should_retry_with_parent(&normalized, &normalized_parent) {
                metadata = self.fetch(&normalized_parent).await?;
            }
        }

        record.apply(metadata.imdb_id, metadata.fields, normalized);
        Ok(record)
    }

    async fn fetch(&self, title: &str) -> Result<Metadata, ScanError> {
        if title.is_empty() {
            log::warn!("metadata lookup skipped: empty title");
            return Ok(Metadata::not_found());
        }
        log::info!("fetching metadata for \"{}\"", title);
        self.source.lookup(title).await
    }
}

/// Scan the media directory, synchronize the manifest and return the sorted listing
pub async fn refresh_library(
    config: &LibraryConfig,
    source: &dyn MetadataSource,
    reporter: &ProgressReporter,
) -> Result<Vec<MediaRecord>, ScanError> {
    let store = ManifestStore::new(config.effective_manifest_path());
    reporter.report_start(config.media_root(), store.path());

    let result = async {
        let snapshot = scanner::walk(config.media_root()).await?;
        let tree = MediaFilter::from_config(config).apply(&snapshot);
        reporter.report_progress(
            SyncPhase::Scan,
            0,
            tree.media_count() as u64,
            &SyncStats::default(),
            "",
        );

        let previous = store.load_or_create().await?;
        Synchronizer::new(source, &store)
            .checkpoint_interval(config.checkpoint_interval)
            .with_reporter(reporter)
            .synchronize(previous, &tree)
            .await
    }
    .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            reporter.report_error(&err);
            return Err(err);
        }
    };

    reporter.report_done(&outcome.stats);
    let stats = &outcome.stats;
    if stats.stale > 0 {
        log::info!("{} stale record(s) kept in manifest", stats.stale);
    }
    log::info!(
        "Synchronized in {}ms: {} cached, {} fetched, {} not found, {} unresolved",
        stats.duration_ms,
        stats.cached,
        stats.fetched,
        stats.not_found,
        stats.unresolved
    );

    let records = outcome.records();
    log::info!("{} file(s) found", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanErrorKind;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::function;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    mock! {
        pub Source {}

        #[async_trait]
        impl MetadataSource for Source {
            async fn lookup(&self, title: &str) -> Result<Metadata, ScanError>;
        }
    }

    const MIB: u64 = 1024 * 1024;

    fn media(name: &str) -> MediaEntry {
        MediaEntry::Media(MediaNode {
            name: name.to_string(),
            path: PathBuf::from("/media").join(name),
            size: 700 * MIB,
        })
    }

    fn tree(entries: Vec<(&str, MediaEntry)>) -> MediaTree {
        MediaTree {
            entries: entries
                .into_iter()
                .map(|(name, entry)| (name.to_string(), entry))
                .collect(),
        }
    }

    fn found(id: &str, title: &str) -> Metadata {
        crate::metadata::normalize_response(json!({
            "Response": "True",
            "imdbID": id,
            "Title": title,
        }))
        .unwrap()
    }

    fn store(dir: &TempDir) -> ManifestStore {
        ManifestStore::new(dir.path().join("manifest.json"))
    }

    #[test]
    fn test_should_retry_with_parent() {
        assert!(should_retry_with_parent("Inception Extended", "Inception"));
        assert!(!should_retry_with_parent("Se7en", "Se7en"));
        assert!(!should_retry_with_parent("Heat", "Downloads"));
        assert!(!should_retry_with_parent("Heat", ""));
        assert!(should_retry_with_parent("", "Inception"));
    }

    #[test]
    fn test_collect_leaves_keys_and_parents() {
        let t = tree(vec![
            ("top.mkv", media("top.mkv")),
            (
                "movies",
                MediaEntry::Dir(tree(vec![(
                    "Se7en",
                    MediaEntry::Dir(tree(vec![("Se7en.mkv", media("Se7en.mkv"))])),
                )])),
            ),
        ]);
        let mut leaves = Vec::new();
        collect_leaves(&t, "", "", &mut leaves);

        let keys: Vec<(&str, &str)> = leaves.iter().map(|l| (l.key.as_str(), l.parent)).collect();
        assert_eq!(
            keys,
            vec![("/movies/Se7en/Se7en.mkv", "Se7en"), ("/top.mkv", "")]
        );
    }

    #[tokio::test]
    async fn test_new_record_is_resolved_and_persisted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Heat"))
            .times(1)
            .returning(|_| Ok(found("tt0113277", "Heat")));

        let t = tree(vec![("Heat.1995.DVDRip.avi", media("Heat.1995.DVDRip.avi"))]);
        let outcome = Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();

        let record = outcome.manifest.get("/Heat.1995.DVDRip.avi").unwrap();
        assert_eq!(record.imdb_id, Resolution::Resolved("tt0113277".into()));
        assert_eq!(record.title(), Some("Heat"));
        assert_eq!(record.normalized_filename.as_deref(), Some("Heat"));
        assert_eq!(outcome.stats.fetched, 1);
        assert_eq!(outcome.stats.total, 1);

        let on_disk = store.load().await.unwrap();
        assert_eq!(on_disk, outcome.manifest);
    }

    #[tokio::test]
    async fn test_parent_fallback_when_tokens_overlap() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Inception Extended"))
            .times(1)
            .returning(|_| Ok(Metadata::not_found()));
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Inception"))
            .times(1)
            .returning(|_| Ok(found("tt1375666", "Inception")));

        let t = tree(vec![(
            "Inception (2010)",
            MediaEntry::Dir(tree(vec![(
                "Inception.Extended.mkv",
                media("Inception.Extended.mkv"),
            )])),
        )]);
        let outcome = Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();

        let record = outcome
            .manifest
            .get("/Inception (2010)/Inception.Extended.mkv")
            .unwrap();
        assert_eq!(record.imdb_id.id(), Some("tt1375666"));
        assert_eq!(
            record.normalized_filename.as_deref(),
            Some("Inception Extended")
        );
    }

    #[tokio::test]
    async fn test_no_fallback_when_parent_normalizes_equal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Se7en"))
            .times(1)
            .returning(|_| Ok(Metadata::not_found()));

        let t = tree(vec![(
            "Se7en",
            MediaEntry::Dir(tree(vec![("Se7en 1995.mkv", media("Se7en 1995.mkv"))])),
        )]);
        let outcome = Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();

        assert_eq!(outcome.stats.not_found, 1);
        assert_eq!(
            outcome.manifest.get("/Se7en/Se7en 1995.mkv").unwrap().imdb_id,
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn test_no_fallback_without_shared_token() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Metadata::not_found()));

        let t = tree(vec![(
            "Downloads",
            MediaEntry::Dir(tree(vec![("Heat.avi", media("Heat.avi"))])),
        )]);
        Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_final_records_are_never_refetched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let source = MockSource::new();

        let mut previous = Manifest::new();
        let mut resolved = MediaRecord::new(&MediaNode {
            name: "Heat.avi".into(),
            path: PathBuf::from("/media/Heat.avi"),
            size: 1,
        });
        resolved.imdb_id = Resolution::Resolved("tt0113277".into());
        previous.insert("/Heat.avi", resolved.clone());

        let mut missing = resolved.clone();
        missing.name = "Obscure.avi".into();
        missing.imdb_id = Resolution::NotFound;
        previous.insert("/Obscure.avi", missing.clone());

        let mut gone = resolved.clone();
        gone.name = "Deleted.avi".into();
        previous.insert("/Deleted.avi", gone.clone());

        let t = tree(vec![
            ("Heat.avi", media("Heat.avi")),
            ("Obscure.avi", media("Obscure.avi")),
        ]);
        let outcome = Synchronizer::new(&source, &store)
            .synchronize(previous, &t)
            .await
            .unwrap();

        assert_eq!(outcome.stats.cached, 2);
        assert_eq!(outcome.stats.stale, 1);
        assert_eq!(outcome.manifest.get("/Heat.avi"), Some(&resolved));
        assert_eq!(outcome.manifest.get("/Obscure.avi"), Some(&missing));
        assert_eq!(outcome.manifest.get("/Deleted.avi"), Some(&gone));

        let listed: Vec<String> = outcome.records().into_iter().map(|r| r.name).collect();
        assert_eq!(listed, vec!["Heat.avi", "Obscure.avi"]);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let t = tree(vec![
            ("Heat.avi", media("Heat.avi")),
            ("Nothing.mkv", media("Nothing.mkv")),
        ]);

        let mut first_source = MockSource::new();
        first_source
            .expect_lookup()
            .with(function(|t: &str| t == "Heat"))
            .times(1)
            .returning(|_| Ok(found("tt0113277", "Heat")));
        first_source
            .expect_lookup()
            .with(function(|t: &str| t == "Nothing"))
            .times(1)
            .returning(|_| Ok(Metadata::not_found()));
        let first = Synchronizer::new(&first_source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();

        let idle_source = MockSource::new();
        let second = Synchronizer::new(&idle_source, &store)
            .synchronize(first.manifest.clone(), &t)
            .await
            .unwrap();

        assert_eq!(second.manifest, first.manifest);
        assert_eq!(second.stats.cached, 2);
        assert_eq!(second.stats.fetched, 0);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_after_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Alien"))
            .times(1)
            .returning(|_| Ok(found("tt0078748", "Alien")));
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Brazil"))
            .times(1)
            .returning(|_| Err(ScanError::metadata("connection reset")));

        let t = tree(vec![
            ("Alien.mkv", media("Alien.mkv")),
            ("Brazil.mkv", media("Brazil.mkv")),
        ]);
        let err = Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::Metadata);

        let on_disk = store.load().await.unwrap();
        assert_eq!(on_disk.len(), 1);
        assert!(on_disk.get("/Alien.mkv").unwrap().imdb_id.is_resolved());
    }

    #[tokio::test]
    async fn test_empty_title_skips_lookup() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let source = MockSource::new();

        let t = tree(vec![("1080p.mkv", media("1080p.mkv"))]);
        let outcome = Synchronizer::new(&source, &store)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap();

        let record = outcome.manifest.get("/1080p.mkv").unwrap();
        assert_eq!(record.imdb_id, Resolution::NotFound);
        assert_eq!(record.normalized_filename.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_checkpoint_interval_batches_writes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut source = MockSource::new();
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Alien"))
            .returning(|_| Ok(found("tt0078748", "Alien")));
        source
            .expect_lookup()
            .with(function(|t: &str| t == "Brazil"))
            .returning(|_| Err(ScanError::metadata("timeout")));

        let t = tree(vec![
            ("Alien.mkv", media("Alien.mkv")),
            ("Brazil.mkv", media("Brazil.mkv")),
        ]);
        Synchronizer::new(&source, &store)
            .checkpoint_interval(10)
            .synchronize(Manifest::new(), &t)
            .await
            .unwrap_err();

        // nothing reached the batch size, so nothing was written
        assert!(!store.path().exists());
    }
}
