//! Content-addressed keyset cache.
//!
//! Entries live in `<root>/<digest>` where the digest covers the keyset info
//! and the seed. Each entry is guarded by the advisory lock `<root>/<digest>.lock`:
//! lookups hold it shared, while removal of a corrupted entry and publication of
//! a new one hold it exclusively. A reader can thus never observe an entry that
//! is being removed or written.

use crate::consts::LOCK_SUFFIX;
use crate::error::{KeysetError, KeysetResult};
use crate::generation::{combine_seed, generate};
use crate::hashing::cache_key;
use crate::keys::{Keyset, KeysetInfo};
use crate::storage::lock::{EntryLock, LockMode};
use crate::storage::{load_keyset, save_keyset, sibling_path};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

pub struct KeysetCache {
    root: PathBuf,
    generations: AtomicUsize,
}

impl KeysetCache {
    /// Opens the cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> KeysetResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| KeysetError::io(&root, e))?;
        Ok(Self {
            root,
            generations: AtomicUsize::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of keysets this instance had to generate.
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    /// Directory of the entry for `info` and the seed halves, whether it exists or not.
    pub fn entry_path(
        &self,
        info: &KeysetInfo,
        seed_msb: u64,
        seed_lsb: u64,
    ) -> KeysetResult<PathBuf> {
        Ok(self.root.join(cache_key(info, seed_msb, seed_lsb)?))
    }

    /// Returns the cached keyset for `info` and the seed halves, generating and
    /// publishing it first if needed.
    ///
    /// Corrupted entries are removed and regenerated. Only failures to
    /// regenerate or publish are returned as errors.
    pub fn get_keyset(
        &self,
        info: &KeysetInfo,
        seed_msb: u64,
        seed_lsb: u64,
    ) -> KeysetResult<Keyset> {
        let entry = self.entry_path(info, seed_msb, seed_lsb)?;
        let lock_path = sibling_path(&entry, LOCK_SUFFIX);

        {
            let _guard = EntryLock::acquire(&lock_path, LockMode::Shared)?;
            if entry.exists() {
                match load_keyset(info, &entry) {
                    Ok(keyset) => {
                        tracing::debug!("Cache hit for {}", entry.display());
                        touch(&entry);
                        return Ok(keyset);
                    }
                    Err(e) => {
                        tracing::warn!("Cache entry {} cannot be loaded: {e}", entry.display());
                    }
                }
            }
        }

        let _guard = EntryLock::acquire(&lock_path, LockMode::Exclusive)?;
        if entry.exists() {
            // another holder of the lock may have published or healed the entry meanwhile
            match load_keyset(info, &entry) {
                Ok(keyset) => {
                    tracing::debug!("Cache hit for {} after waiting", entry.display());
                    touch(&entry);
                    return Ok(keyset);
                }
                Err(e) => {
                    tracing::warn!("Removing corrupted cache entry {}: {e}", entry.display());
                    fs::remove_dir_all(&entry).map_err(|e| KeysetError::io(&entry, e))?;
                }
            }
        }

        tracing::info!("Cache miss for {}, generating keyset", entry.display());
        let keyset = generate(info, combine_seed(seed_msb, seed_lsb))?;
        self.generations.fetch_add(1, Ordering::SeqCst);
        save_keyset(&keyset, &entry)?;
        tracing::info!("Keyset cached at {}", entry.display());
        Ok(keyset)
    }
}

// Updates the entry mtime so that external housekeeping can evict by age.
fn touch(entry: &Path) {
    if let Err(e) = File::open(entry).and_then(|dir| dir.set_modified(SystemTime::now())) {
        tracing::warn!("Failed to touch cache entry {}: {e}", entry.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::INCOMPLETE_SUFFIX;
    use crate::generation::keyset;
    use crate::keys::KeyKind;
    use crate::testing::{small_keyset, small_keyset_info, SMALL_SEED};
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};
    use tracing_test::traced_test;

    const MSB: u64 = 0;
    const LSB: u64 = SMALL_SEED as u64;

    fn no_staging_residue(root: &Path) -> bool {
        fs::read_dir(root).unwrap().all(|e| {
            !e.unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(INCOMPLETE_SUFFIX)
        })
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();

        let first = cache.get_keyset(&info, MSB, LSB).unwrap();
        let second = cache.get_keyset(&info, MSB, LSB).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.generations(), 1);

        let entry = cache.entry_path(&info, MSB, LSB).unwrap();
        assert!(entry.join(KeyKind::Bootstrap.file_name(0)).is_file());
        assert!(sibling_path(&entry, LOCK_SUFFIX).is_file());
        assert_eq!(first, small_keyset().1);
    }

    #[test]
    fn distinct_seeds_have_distinct_entries() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();

        let a = cache.get_keyset(&info, MSB, LSB).unwrap();
        let b = cache.get_keyset(&info, MSB, LSB + 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.generations(), 2);
        assert_ne!(
            cache.entry_path(&info, MSB, LSB).unwrap(),
            cache.entry_path(&info, MSB, LSB + 1).unwrap()
        );
    }

    #[test]
    fn hit_refreshes_mtime() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();
        cache.get_keyset(&info, MSB, LSB).unwrap();

        let entry = cache.entry_path(&info, MSB, LSB).unwrap();
        let old = UNIX_EPOCH + Duration::from_secs(1_000_000);
        File::open(&entry).unwrap().set_modified(old).unwrap();

        cache.get_keyset(&info, MSB, LSB).unwrap();
        let refreshed = fs::metadata(&entry).unwrap().modified().unwrap();
        assert!(refreshed > old);
    }

    #[test]
    fn concurrent_lookups_generate_once() {
        let root = tempfile::tempdir().unwrap();
        let cache = Arc::new(KeysetCache::new(root.path()).unwrap());
        let info = Arc::new(small_keyset_info());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let info = Arc::clone(&info);
                std::thread::spawn(move || cache.get_keyset(&info, MSB, LSB).unwrap())
            })
            .collect();
        let results: Vec<Keyset> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.generations(), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert!(no_staging_residue(root.path()));
    }

    // Separate instances share nothing but the directory, like separate processes.
    #[test]
    fn independent_caches_generate_once() {
        let root = tempfile::tempdir().unwrap();
        let info = Arc::new(small_keyset_info());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = root.path().to_path_buf();
                let info = Arc::clone(&info);
                std::thread::spawn(move || {
                    let cache = KeysetCache::new(path).unwrap();
                    let keyset = cache.get_keyset(&info, MSB, LSB).unwrap();
                    (cache.generations(), keyset)
                })
            })
            .collect();
        let results: Vec<(usize, Keyset)> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().map(|(g, _)| g).sum::<usize>(), 1);
        assert!(results.windows(2).all(|w| w[0].1 == w[1].1));
    }

    enum Damage {
        Truncate,
        Garbage,
        Delete,
    }

    #[rstest]
    #[case::truncated_bootstrap_key(KeyKind::Bootstrap, Damage::Truncate)]
    #[case::garbage_secret_key(KeyKind::Secret, Damage::Garbage)]
    #[case::deleted_packing_key(KeyKind::PackingKeyswitch, Damage::Delete)]
    fn corrupted_entry_is_regenerated(#[case] kind: KeyKind, #[case] damage: Damage) {
        let root = tempfile::tempdir().unwrap();
        let info = small_keyset_info();
        let expected = KeysetCache::new(root.path())
            .unwrap()
            .get_keyset(&info, MSB, LSB)
            .unwrap();

        let entry = KeysetCache::new(root.path())
            .unwrap()
            .entry_path(&info, MSB, LSB)
            .unwrap();
        let victim = entry.join(kind.file_name(0));
        match damage {
            Damage::Truncate => {
                let bytes = fs::read(&victim).unwrap();
                fs::write(&victim, &bytes[..bytes.len() / 3]).unwrap();
            }
            Damage::Garbage => fs::write(&victim, [0xffu8; 64]).unwrap(),
            Damage::Delete => fs::remove_file(&victim).unwrap(),
        }

        let cache = KeysetCache::new(root.path()).unwrap();
        let healed = cache.get_keyset(&info, MSB, LSB).unwrap();
        assert_eq!(healed, expected);
        assert_eq!(cache.generations(), 1);
        assert!(no_staging_residue(root.path()));

        // the healed entry is a regular hit afterwards
        cache.get_keyset(&info, MSB, LSB).unwrap();
        assert_eq!(cache.generations(), 1);
    }

    #[traced_test]
    #[test]
    fn corruption_is_logged_not_returned() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();
        cache.get_keyset(&info, MSB, LSB).unwrap();

        let entry = cache.entry_path(&info, MSB, LSB).unwrap();
        fs::write(entry.join(KeyKind::Keyswitch.file_name(0)), b"").unwrap();

        assert!(cache.get_keyset(&info, MSB, LSB).is_ok());
        assert_eq!(cache.generations(), 2);
        assert!(logs_contain("cannot be loaded"));
        assert!(logs_contain("Removing corrupted cache entry"));
    }

    #[test]
    fn stale_staging_directory_does_not_block_publication() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();
        let entry = cache.entry_path(&info, MSB, LSB).unwrap();
        let staging = sibling_path(&entry, INCOMPLETE_SUFFIX);
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("pbsKey_0"), b"interrupted").unwrap();

        cache.get_keyset(&info, MSB, LSB).unwrap();
        assert!(entry.is_dir());
        assert!(!staging.exists());
    }

    #[test]
    fn keyset_goes_through_the_cache() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let info = small_keyset_info();

        let cached = keyset(&info, MSB, LSB, Some(&cache)).unwrap();
        let direct = keyset(&info, MSB, LSB, None).unwrap();
        assert_eq!(cached, direct);
        assert_eq!(cache.generations(), 1);
        assert!(cache.entry_path(&info, MSB, LSB).unwrap().is_dir());
    }

    #[test]
    fn invalid_info_is_not_cached() {
        let root = tempfile::tempdir().unwrap();
        let cache = KeysetCache::new(root.path()).unwrap();
        let mut info = small_keyset_info();
        info.bootstrap_keys[0].output_id = 5;

        let err = cache.get_keyset(&info, MSB, LSB).unwrap_err();
        assert!(matches!(err, KeysetError::ContractViolation(_)));
        assert!(!cache.entry_path(&info, MSB, LSB).unwrap().exists());
        assert_eq!(cache.generations(), 0);
    }
}
