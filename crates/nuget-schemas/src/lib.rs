//! Data model for the restore engine: package identity and versioning,
//! the canonical dependency-graph-spec serialization that gets fingerprinted,
//! and the lock/cache file schemas written to disk.

pub mod cache_file;
pub mod dgspec;
pub mod identity;
pub mod lock_file;
pub mod log_message;
pub mod version;
pub mod version_range;

pub use cache_file::CacheFile;
pub use identity::{DependencyGroup, PackageDependency, PackageIdentity, PackageReference};
pub use lock_file::LockFile;
pub use log_message::{LogLevel, LogMessage};
pub use version::PackageVersion;
pub use version_range::VersionRange;
