//! Cache file load/save/validity (spec §4.9): the tolerant-on-read,
//! atomic-on-write persistence around `nuget_schemas::CacheFile`.

use std::path::Path;

use nuget_schemas::cache_file::CacheFile;
use nuget_util::atomic::write_atomic;
use nuget_util::errors::{RestoreError, RestoreResult};

/// Missing file or unparsable JSON both yield an always-invalid cache
/// (spec §4.9's "tolerant" load); any other IO error surfaces.
pub fn load(path: &Path) -> RestoreResult<CacheFile> {
    let project_file_path = path.to_path_buf();
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| CacheFile::invalid(project_file_path))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheFile::invalid(project_file_path)),
        Err(e) => Err(RestoreError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// 2-space indented JSON via an atomic tmp+rename write (spec §4.9).
pub fn save(path: &Path, cache: &CacheFile) -> RestoreResult<()> {
    let json = serde_json::to_vec_pretty(cache).map_err(|e| RestoreError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &json)
}

/// Structural validity AND hash equality AND every `expectedPackageFiles`
/// entry present on disk (spec §4.9). Returns the loaded cache regardless
/// so a hit's caller can replay its logs.
pub fn is_cache_valid(path: &Path, current_hash: &str) -> RestoreResult<(bool, CacheFile)> {
    let cache = load(path)?;
    let valid = cache.is_valid()
        && cache.dg_spec_hash == current_hash
        && cache.expected_package_files.iter().all(|f| f.exists());
    Ok((valid, cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn load_of_missing_file_is_an_invalid_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("obj").join("project.nuget.cache");
        let cache = load(&path).unwrap();
        assert!(!cache.is_valid());
    }

    #[test]
    fn load_of_malformed_json_is_an_invalid_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.nuget.cache");
        std::fs::write(&path, b"not json").unwrap();
        let cache = load(&path).unwrap();
        assert!(!cache.is_valid());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("obj").join("project.nuget.cache");
        let mut cache = CacheFile::new(PathBuf::from("/a.csproj"));
        cache.success = true;
        cache.dg_spec_hash = "abc123".into();
        save(&path, &cache).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, cache);
    }

    #[test]
    fn is_cache_valid_requires_every_expected_file_to_exist() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("project.nuget.cache");
        let present = dir.path().join("present.sha512");
        std::fs::write(&present, b"x").unwrap();
        let missing = dir.path().join("missing.sha512");

        let mut cache = CacheFile::new(PathBuf::from("/a.csproj"));
        cache.success = true;
        cache.dg_spec_hash = "hash1".into();
        cache.expected_package_files = vec![present];
        save(&cache_path, &cache).unwrap();

        let (valid, _) = is_cache_valid(&cache_path, "hash1").unwrap();
        assert!(valid);

        let mut cache2 = cache.clone();
        cache2.expected_package_files.push(missing);
        save(&cache_path, &cache2).unwrap();
        let (valid2, _) = is_cache_valid(&cache_path, "hash1").unwrap();
        assert!(!valid2);
    }

    #[test]
    fn is_cache_valid_rejects_a_hash_mismatch() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("project.nuget.cache");
        let mut cache = CacheFile::new(PathBuf::from("/a.csproj"));
        cache.success = true;
        cache.dg_spec_hash = "old-hash".into();
        save(&cache_path, &cache).unwrap();

        let (valid, loaded) = is_cache_valid(&cache_path, "new-hash").unwrap();
        assert!(!valid);
        assert_eq!(loaded.dg_spec_hash, "old-hash");
    }
}
