//! On-disk layout of a keyset.
//!
//! A keyset directory holds one file per key, named `<prefix>_<id>`, with the
//! wire form of the key. Directories are published by renaming a fully written
//! and synced sibling `<dir>.incomplete`, so a reader never sees a partial keyset.

use crate::consts::INCOMPLETE_SUFFIX;
use crate::error::{KeysetError, KeysetResult};
use crate::keys::info::DerivedKeyInfo;
use crate::keys::{
    BootstrapKey, ClientKeyset, KeyEntity, KeyId, Keyset, KeysetInfo, KeyswitchKey,
    PackingKeyswitchKey, SecretKey, ServerKeyset,
};
use itertools::Itertools;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub mod lock;

/// Path of the sibling of `path` with `.<suffix>` appended to its file name.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes `keyset` into `dir`, which must not exist yet.
pub fn save_keyset(keyset: &Keyset, dir: &Path) -> KeysetResult<()> {
    let staging = sibling_path(dir, INCOMPLETE_SUFFIX);
    if staging.exists() {
        tracing::warn!("Removing stale staging directory {}", staging.display());
        fs::remove_dir_all(&staging).map_err(|e| KeysetError::io(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| KeysetError::io(&staging, e))?;

    let published = write_keyset(keyset, &staging).and_then(|_| {
        fs::rename(&staging, dir).map_err(|e| KeysetError::io(dir, e))
    });
    if let Err(e) = published {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            tracing::warn!(
                "Failed to clean up staging directory {}: {cleanup}",
                staging.display()
            );
        }
        return Err(e);
    }
    sync_dir(dir.parent());
    tracing::debug!("Published keyset to {}", dir.display());
    Ok(())
}

fn write_keyset(keyset: &Keyset, dir: &Path) -> KeysetResult<()> {
    for key in &keyset.client.secret_keys {
        write_key(key, dir)?;
    }
    for key in &keyset.server.bootstrap_keys {
        write_key(key, dir)?;
    }
    for key in &keyset.server.keyswitch_keys {
        write_key(key, dir)?;
    }
    for key in &keyset.server.packing_keyswitch_keys {
        write_key(key, dir)?;
    }
    sync_dir(Some(dir));
    Ok(())
}

fn write_key<K: KeyEntity>(key: &K, dir: &Path) -> KeysetResult<()> {
    let path = dir.join(K::KIND.file_name(key.id()));
    let bytes = key.to_wire()?;
    let mut file = File::create(&path).map_err(|e| KeysetError::io(&path, e))?;
    file.write_all(&bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| KeysetError::io(&path, e))
}

// Best effort: not every platform can open and sync a directory.
fn sync_dir(dir: Option<&Path>) {
    if let Some(dir) = dir {
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!("Could not sync directory {}: {e}", dir.display());
        }
    }
}

/// Reads the keyset described by `info` from `dir`.
///
/// Every key named by `info` must be present, decodable and carry exactly the
/// info it is expected to have. Any failure names the offending file.
pub fn load_keyset(info: &KeysetInfo, dir: &Path) -> KeysetResult<Keyset> {
    let client = ClientKeyset {
        secret_keys: info
            .sorted_secret_keys()
            .into_iter()
            .map(|sk| read_key::<SecretKey>(dir, sk.id, sk))
            .collect::<KeysetResult<_>>()?,
    };
    let server = ServerKeyset {
        bootstrap_keys: read_derived_keys::<BootstrapKey>(dir, &info.bootstrap_keys)?,
        keyswitch_keys: read_derived_keys::<KeyswitchKey>(dir, &info.keyswitch_keys)?,
        packing_keyswitch_keys: read_derived_keys::<PackingKeyswitchKey>(
            dir,
            &info.packing_keyswitch_keys,
        )?,
    };
    Ok(Keyset { client, server })
}

fn read_derived_keys<K>(dir: &Path, infos: &[K::Info]) -> KeysetResult<Vec<K>>
where
    K: KeyEntity,
    K::Info: DerivedKeyInfo,
{
    infos
        .iter()
        .sorted_by_key(|i| i.id())
        .map(|i| read_key(dir, i.id(), i))
        .collect()
}

fn read_key<K: KeyEntity>(dir: &Path, id: KeyId, expected: &K::Info) -> KeysetResult<K> {
    let path = dir.join(K::KIND.file_name(id));
    let bytes = fs::read(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => KeysetError::MissingKey { path: path.clone() },
        _ => KeysetError::io(&path, e),
    })?;
    let key = K::from_wire(&bytes).map_err(|e| KeysetError::Corrupted {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    if key.info() != expected {
        return Err(KeysetError::Corrupted {
            path,
            reason: format!("expected {expected:?} but found {:?}", key.info()),
        });
    }
    Ok(key)
}
