//! JSON keystore file.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::algorithm::SecretKey;
use crate::error::KeyError;
use crate::record::KeyRecord;

const KEYSTORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct KeystoreFile {
    version: u32,
    keys: Vec<StoredKey>,
}

#[derive(Serialize, Deserialize)]
struct StoredKey {
    record: KeyRecord,
    secret: String,
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.secret);
    }
}

/// Reads all keys from `path`. A missing file is an empty keystore.
pub(crate) fn load(path: &Path) -> Result<Vec<(KeyRecord, SecretKey)>, KeyError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(KeyError::Keystore {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: KeystoreFile = serde_json::from_slice(&bytes)?;
    if file.version != KEYSTORE_VERSION {
        return Err(KeyError::KeystoreVersion(file.version));
    }

    let mut keys = Vec::with_capacity(file.keys.len());
    for stored in &file.keys {
        let secret = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(stored.secret.as_bytes())
                .map_err(|err| KeyError::Crypto(format!("secret encoding: {}", err)))?,
        );
        let key = SecretKey::from_secret_bytes(stored.record.algorithm, &secret)?;
        keys.push((stored.record.clone(), key));
    }
    Ok(keys)
}

/// Writes all keys to `path` through a sibling temp file and a rename.
pub(crate) fn save(path: &Path, keys: &[(KeyRecord, &SecretKey)]) -> Result<(), KeyError> {
    let mut stored = Vec::with_capacity(keys.len());
    for (record, secret) in keys {
        let bytes = secret.to_secret_bytes()?;
        stored.push(StoredKey {
            record: record.clone(),
            secret: URL_SAFE_NO_PAD.encode(bytes.as_slice()),
        });
    }
    let file = KeystoreFile {
        version: KEYSTORE_VERSION,
        keys: stored,
    };
    let json = Zeroizing::new(serde_json::to_vec_pretty(&file)?);

    let io_err = |source| KeyError::Keystore {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, json.as_slice()).map_err(io_err)?;
    restrict_permissions(&tmp).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
