//! Manifest module - the persisted path -> record cache

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ScanError, ScanErrorKind};
use crate::models::MediaRecord;

/// Mapping from media-root-relative path (`/dir/file.mkv`) to record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    records: BTreeMap<String, MediaRecord>,
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MediaRecord> {
        self.records.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, record: MediaRecord) {
        self.records.insert(key.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// All records, ordered for display
    pub fn sorted_records(&self) -> Vec<MediaRecord> {
        let mut records: Vec<MediaRecord> = self.records.values().cloned().collect();
        sort_records(&mut records);
        records
    }
}

/// Sort records by display title using a locale-style collation
pub fn sort_records(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| collate(a.display_title(), b.display_title()));
}

/// Compare ignoring accents and case first, then case, then raw text
pub fn collate(a: &str, b: &str) -> Ordering {
    let primary = |s: &str| -> Vec<char> { s.chars().flat_map(char::to_lowercase).map(fold_accent).collect() };
    let secondary = |s: &str| -> Vec<char> { s.chars().flat_map(char::to_lowercase).collect() };

    primary(a)
        .cmp(&primary(b))
        .then_with(|| secondary(a).cmp(&secondary(b)))
        // lowercase before uppercase
        .then_with(|| b.cmp(a))
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// On-disk location of a manifest
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the manifest, creating an empty one if the file does not exist yet
    pub async fn load_or_create(&self) -> Result<Manifest, ScanError> {
        match self.load().await {
            Err(err) if err.kind == ScanErrorKind::NotFound => {
                log::info!("Creating empty manifest at {:?}", self.path);
                let manifest = Manifest::new();
                self.save(&manifest).await?;
                Ok(manifest)
            }
            other => other,
        }
    }

    /// Read and parse the manifest
    pub async fn load(&self) -> Result<Manifest, ScanError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ScanError::from_io(&self.path, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ScanError::manifest_parse(self.path.clone(), e.to_string()))
    }

    /// Rewrite the whole manifest: temp file in the same directory, then rename
    pub async fn save(&self, manifest: &Manifest) -> Result<(), ScanError> {
        let json = serde_json::to_vec(manifest)
            .map_err(|e| ScanError::io_error(Some(self.path.clone()), e.to_string()))?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| ScanError::from_io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| ScanError::from_io(&self.path, e))?;

        log::debug!("Wrote {} record(s) to {:?}", manifest.len(), self.path);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaNode, Resolution};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(name: &str, title: Option<&str>, normalized: Option<&str>) -> MediaRecord {
        let mut record = MediaRecord::new(&MediaNode {
            name: name.to_string(),
            path: PathBuf::from("/media").join(name),
            size: 2 * 1024 * 1024,
        });
        record.normalized_filename = normalized.map(str::to_string);
        if let Some(title) = title {
            record.details.insert("title".into(), json!(title));
        }
        record
    }

    #[test]
    fn test_collate_is_case_and_accent_insensitive() {
        assert_eq!(collate("amélie", "Amelie 2"), Ordering::Less);
        assert_eq!(collate("Zodiac", "alien"), Ordering::Greater);
        assert_eq!(collate("école", "Fargo"), Ordering::Less);
        assert_eq!(collate("heat", "Heat"), Ordering::Less);
        assert_eq!(collate("Heat", "Heat"), Ordering::Equal);
    }

    #[test]
    fn test_sorted_records_use_display_title() {
        let mut manifest = Manifest::new();
        manifest.insert("/b.mkv", record("b.mkv", Some("Zodiac"), Some("Zodiac")));
        manifest.insert("/a.mkv", record("a.mkv", None, Some("brazil")));
        manifest.insert("/c.mkv", record("c.mkv", Some("Alien"), Some("alien 1979")));
        manifest.insert("/d.mkv", record("d.mkv", None, None));

        let titles: Vec<String> = manifest
            .sorted_records()
            .iter()
            .map(|r| r.display_title().to_string())
            .collect();
        assert_eq!(titles, vec!["Alien", "brazil", "d.mkv", "Zodiac"]);
    }

    #[test]
    fn test_manifest_json_shape() {
        let mut manifest = Manifest::new();
        let mut rec = record("Heat.avi", None, Some("Heat"));
        rec.imdb_id = Resolution::NotFound;
        manifest.insert("/movies/Heat.avi", rec);

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["/movies/Heat.avi"]["imdbID"], json!(false));
        assert_eq!(value["/movies/Heat.avi"]["normalizedFilename"], json!("Heat"));
    }

    #[tokio::test]
    async fn test_load_or_create_writes_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let manifest = store.load_or_create().await.unwrap();
        assert!(manifest.is_empty());
        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, "{}");
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut manifest = Manifest::new();
        let mut resolved = record("Inception.2010.1080p.mkv", Some("Inception"), Some("Inception"));
        resolved.imdb_id = Resolution::Resolved("tt1375666".into());
        resolved.details.insert("plot".into(), serde_json::Value::Null);
        manifest.insert("/movies/Inception.2010.1080p.mkv", resolved);
        manifest.insert("/x.mkv", record("x.mkv", None, None));

        store.save(&manifest).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, manifest);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ManifestStore::new(&path).load_or_create().await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::ManifestParse);
        // the broken file is left alone
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("missing/manifest.json"));
        let err = store.load_or_create().await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::NotFound);
    }
}
