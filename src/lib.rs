//! Media directory scanner that keeps a metadata-enriched manifest in sync
//!
//! The pipeline walks a media directory, keeps video files above a size
//! threshold, derives a search title from each file name, looks titles up in
//! an OMDb-style service and caches the answers in a JSON manifest. Each
//! record is looked up at most once; later runs reuse the cached answer.

pub mod config;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod scanner;
pub mod sync;

pub use config::LibraryConfig;
pub use error::{ScanError, ScanErrorKind};
pub use filter::MediaFilter;
pub use manifest::{Manifest, ManifestStore};
pub use metadata::{Metadata, MetadataSource, OmdbClient};
pub use models::{FileSnapshot, MediaEntry, MediaNode, MediaRecord, MediaTree, Resolution};
pub use normalize::normalize_filename;
pub use progress::{ProgressReporter, SyncPhase};
pub use scanner::{walk, walk_directory};
pub use sync::{refresh_library, SyncOutcome, SyncStats, Synchronizer};
