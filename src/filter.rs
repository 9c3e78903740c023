//! Media tree filter - prunes a snapshot down to playable media

use std::collections::HashSet;
use std::path::Path;

use crate::config::{LibraryConfig, DEFAULT_MIN_MEDIA_SIZE};
use crate::models::{FileSnapshot, MediaEntry, MediaNode, MediaTree};

/// Extension and size policy for media files
#[derive(Debug, Clone)]
pub struct MediaFilter {
    extensions: HashSet<String>,
    min_size: u64,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            extensions: LibraryConfig::default_extensions(),
            min_size: DEFAULT_MIN_MEDIA_SIZE,
        }
    }
}

impl MediaFilter {
    /// Build the policy from a library configuration
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            min_size: config.min_media_size,
        }
    }

    /// Whether a file with this name and size counts as media
    pub fn accepts(&self, name: &str, size: u64) -> bool {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension {
            Some(ext) if self.extensions.contains(&ext) => size >= self.min_size,
            _ => false,
        }
    }

    /// Keep media files, drop everything else along with emptied directories
    pub fn apply(&self, snapshot: &FileSnapshot) -> MediaTree {
        match snapshot {
            FileSnapshot::Dir(dir) => {
                let mut tree = MediaTree::new();
                for (name, child) in &dir.children {
                    match child {
                        FileSnapshot::File(file) => {
                            if self.accepts(&file.name, file.size) {
                                tree.entries.insert(
                                    name.clone(),
                                    MediaEntry::Media(MediaNode {
                                        name: file.name.clone(),
                                        path: file.path.clone(),
                                        size: file.size,
                                    }),
                                );
                            }
                        }
                        FileSnapshot::Dir(_) => {
                            let subtree = self.apply(child);
                            if !subtree.is_empty() {
                                tree.entries.insert(name.clone(), MediaEntry::Dir(subtree));
                            }
                        }
                    }
                }
                tree
            }
            FileSnapshot::File(_) => MediaTree::new(),
        }
    }
}
