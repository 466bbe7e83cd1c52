use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fslock::LockFile;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::dog::Dog;
use crate::{Version, serialize_atomically, traceable_path};

type Error = anyhow::Error;

pub const FAVORITES_FILE_NAME: &str = "favorites.json";

/// A favorited dog along with when the user marked it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FavoriteEntry {
    pub dog: Dog,
    #[serde(with = "time::serde::iso8601")]
    pub added: OffsetDateTime,
}

/// The set of favorited dogs, keyed by dog id.
///
/// Membership is unique by id: re-adding a present id is a no-op and keeps
/// the original entry. The in-memory value is only ever persisted as a
/// whole via [write_favorites_json], so readers never observe a partial
/// update.
#[derive(Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Favorites {
    version: Version<1>,
    entries: BTreeMap<String, FavoriteEntry>,
}

impl Favorites {
    /// Inserts a dog unless its id is already present.
    ///
    /// Returns whether the dog was inserted.
    pub fn add(&mut self, dog: Dog) -> bool {
        match self.entries.entry(dog.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(FavoriteEntry {
                    dog,
                    added: OffsetDateTime::now_utc(),
                });
                true
            },
        }
    }

    /// Removes the dog with the given id.
    ///
    /// Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Empties the set unconditionally.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Dog> {
        self.entries.get(id).map(|entry| &entry.dog)
    }

    pub fn dogs(&self) -> impl Iterator<Item = &Dog> {
        self.entries.values().map(|entry| &entry.dog)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FavoriteEntry> {
        self.entries.values()
    }

    /// The favorited ids, in stable (sorted) order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Favorites state file for the given data directory.
///
/// {data_dir}/favorites.json
pub fn favorites_json_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(FAVORITES_FILE_NAME)
}

/// Acquires the filesystem-based lock on favorites.json
pub fn acquire_favorites_json_lock(
    favorites_json_path: impl AsRef<Path>,
) -> Result<LockFile, Error> {
    let lock_path = favorites_json_lock_path(favorites_json_path);
    let lock_path_parent = lock_path.parent().expect("lock path has parent");
    if !(lock_path.exists()) {
        std::fs::create_dir_all(lock_path_parent)?;
    }
    let mut lock = LockFile::open(&lock_path).context("failed to open lockfile")?;
    lock.lock().context("failed to lock lockfile")?;
    Ok(lock)
}

/// Returns the path to the lock file for favorites.json.
/// The presence of the lock file does not indicate an active lock because the
/// file isn't removed after use.
/// This is a separate file because we replace favorites.json on write.
fn favorites_json_lock_path(favorites_json_path: impl AsRef<Path>) -> PathBuf {
    favorites_json_path.as_ref().with_extension("lock")
}

/// Returns the parsed `favorites.json` file, or `None` if the file does not
/// exist yet.
///
/// The file can be written with [write_favorites_json].
/// This function acquires a lock on the file,
/// which should be reused for writing, to avoid TOCTOU issues.
pub fn read_favorites_json(
    path: impl AsRef<Path>,
) -> Result<(Option<Favorites>, LockFile), Error> {
    let path = path.as_ref();
    let lock_file = acquire_favorites_json_lock(path).context("failed to acquire lockfile")?;

    if !path.exists() {
        debug!(
            path = traceable_path(path),
            "favorites file not found, starting empty"
        );
        return Ok((None, lock_file));
    }

    debug!(path = traceable_path(path), "reading favorites.json");
    let contents =
        std::fs::read_to_string(path).context(format!("failed to read file {}", path.display()))?;
    let parsed: Favorites = serde_json::from_str(&contents)
        .context(format!("failed to parse file {}", path.display()))?;

    Ok((Some(parsed), lock_file))
}

/// Writes the `favorites.json` file.
/// The file is written atomically.
/// The lock is released after the write.
///
/// This uses [crate::serialize_atomically] to write the file, and inherits
/// its requirements:
/// * `path` must have a parent directory.
/// * The lock must correspond to the file being written.
pub fn write_favorites_json(
    favorites: &Favorites,
    path: impl AsRef<Path>,
    lock: LockFile,
) -> Result<(), Error> {
    serialize_atomically(favorites, &path, lock)?;
    Ok(())
}
