//! Core data models for the manifest pipeline

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file seen by the directory walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File name without path
    pub name: String,
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// A directory seen by the directory walker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirInfo {
    /// Directory name without path
    pub name: String,
    /// Full path to the directory
    pub path: PathBuf,
    /// Entries keyed by name
    pub children: BTreeMap<String, FileSnapshot>,
}

/// Structural snapshot of a directory tree, rebuilt on every scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSnapshot {
    File(FileInfo),
    Dir(DirInfo),
}

impl FileSnapshot {
    /// Entry name
    pub fn name(&self) -> &str {
        match self {
            FileSnapshot::File(file) => &file.name,
            FileSnapshot::Dir(dir) => &dir.name,
        }
    }

    /// Count of files anywhere below this entry
    pub fn file_count(&self) -> usize {
        match self {
            FileSnapshot::File(_) => 1,
            FileSnapshot::Dir(dir) => dir.children.values().map(FileSnapshot::file_count).sum(),
        }
    }
}

/// A file that passed the media filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaNode {
    /// File name without path
    pub name: String,
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// One entry of a filtered media tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEntry {
    Media(MediaNode),
    Dir(MediaTree),
}

/// Filtered tree: every leaf is a [`MediaNode`], no directory is empty
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaTree {
    pub entries: BTreeMap<String, MediaEntry>,
}

impl MediaTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tree holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of media files in the tree
    pub fn media_count(&self) -> usize {
        self.entries
            .values()
            .map(|entry| match entry {
                MediaEntry::Media(_) => 1,
                MediaEntry::Dir(tree) => tree.media_count(),
            })
            .sum()
    }
}

/// Metadata resolution state of a record
///
/// Persisted as the `imdbID` field: `null` (never resolved), `false`
/// (service confirmed no match) or the identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Unresolved,
    NotFound,
    Resolved(String),
}

impl Resolution {
    /// Whether a lookup has already produced a final answer
    pub fn is_final(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    /// Whether the service returned an identifier
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// The identifier, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resolution::Unresolved => serializer.serialize_none(),
            Resolution::NotFound => serializer.serialize_bool(false),
            Resolution::Resolved(id) => serializer.serialize_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(String),
            Flag(bool),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Resolution::Unresolved),
            Some(Raw::Flag(false)) => Ok(Resolution::NotFound),
            Some(Raw::Flag(true)) => Err(de::Error::custom(
                "imdbID must be null, false or an identifier string",
            )),
            Some(Raw::Id(id)) => Ok(Resolution::Resolved(id)),
        }
    }
}

/// Keys owned by the record itself; metadata payloads never overwrite them
pub const RESERVED_KEYS: [&str; 5] = ["name", "path", "size", "imdbID", "normalizedFilename"];

/// Persisted manifest entry for one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// File name without path
    pub name: String,
    /// Full path to the file
    pub path: String,
    /// File size in bytes at discovery time
    pub size: u64,
    /// Resolution state
    #[serde(rename = "imdbID", default)]
    pub imdb_id: Resolution,
    /// Title derived from the file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_filename: Option<String>,
    /// Metadata fields as returned by the lookup service (title, year, plot, ...)
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl MediaRecord {
    /// Seed an unresolved record for a newly discovered file
    pub fn new(node: &MediaNode) -> Self {
        Self {
            name: node.name.clone(),
            path: node.path.to_string_lossy().to_string(),
            size: node.size,
            imdb_id: Resolution::Unresolved,
            normalized_filename: None,
            details: Map::new(),
        }
    }

    fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.detail_str("title")
    }

    pub fn year(&self) -> Option<&str> {
        self.detail_str("year")
    }

    pub fn runtime(&self) -> Option<&str> {
        self.detail_str("runtime")
    }

    pub fn plot(&self) -> Option<&str> {
        self.detail_str("plot")
    }

    pub fn imdb_rating(&self) -> Option<&str> {
        self.detail_str("imdbRating")
    }

    pub fn poster(&self) -> Option<&str> {
        self.detail_str("poster")
    }

    pub fn dvd(&self) -> Option<&str> {
        self.detail_str("dvd")
    }

    /// Title used for listing order: service title, else normalized name, else file name
    pub fn display_title(&self) -> &str {
        self.title()
            .or(self.normalized_filename.as_deref())
            .unwrap_or(&self.name)
    }

    /// Merge lookup output into the record, overwriting earlier detail fields
    pub fn apply(&mut self, imdb_id: Resolution, details: Map<String, Value>, normalized: String) {
        self.imdb_id = imdb_id;
        for (key, value) in details {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.details.insert(key, value);
        }
        self.normalized_filename = Some(normalized);
    }
}
