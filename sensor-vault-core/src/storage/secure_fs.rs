//! File helpers for the encryption service: synced writes, best-effort
//! secure deletion, suffix handling and checksums.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::models::error::VaultError;

const OVERWRITE_CHUNK: usize = 64 * 1024;
const UNIQUE_NAME_ATTEMPTS: usize = 16;

/// Write `data` to `path`, replacing any existing file, and fsync it.
pub fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    write_all_synced(&mut file, data)
}

pub fn write_all_synced(file: &mut File, data: &[u8]) -> io::Result<()> {
    file.write_all(data)?;
    file.flush()?;
    file.sync_all()
}

/// Create a new file named `base + suffix`, or `base.<tag> + suffix` with a
/// random tag when that name is taken. An existing file is never opened.
pub fn create_unique(base: &Path, suffix: &str) -> io::Result<(PathBuf, File)> {
    let preferred = append_suffix(base, suffix);
    match create_new(&preferred) {
        Ok(file) => return Ok((preferred, file)),
        Err(e) if e.kind() != io::ErrorKind::AlreadyExists => return Err(e),
        Err(_) => {}
    }

    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let candidate = append_suffix(base, &format!(".{}{}", &tag[..8], suffix));
        match create_new(&candidate) {
            Ok(file) => {
                log::debug!("{} is taken, using {}", preferred.display(), candidate.display());
                return Ok((candidate, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name next to {}", preferred.display()),
    ))
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Overwrite `path` in place with random bytes, fsync, then unlink.
///
/// Best effort: on flash storage the overwrite does not guarantee physical
/// erasure. If the overwrite fails the file is still unlinked. Returns
/// `Ok(false)` when there was nothing to delete.
pub fn secure_delete(path: &Path) -> io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if let Err(e) = overwrite_with_random(path, len) {
        log::warn!("secure overwrite of {} failed: {}", path.display(), e);
    }
    fs::remove_file(path)?;
    log::debug!("securely deleted {}", path.display());
    Ok(true)
}

fn overwrite_with_random(path: &Path, len: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    let mut rng = rand::thread_rng();
    let mut chunk = vec![0u8; OVERWRITE_CHUNK];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(OVERWRITE_CHUNK as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    file.flush()?;
    file.sync_all()
}

/// `path` with `suffix` appended to its file name (`a.m4a` + `.enc` → `a.m4a.enc`).
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Pure string test; no I/O.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.as_os_str().to_string_lossy().ends_with(suffix)
}

/// `path` without a trailing `suffix`, or `None` if it does not end with it.
pub fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let text = path.to_string_lossy();
    text.strip_suffix(suffix).map(PathBuf::from)
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, VaultError> {
    let data = fs::read(path)
        .map_err(|e| VaultError::Persistence(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.bin");
        fs::write(&path, vec![0x42u8; 200_000]).unwrap();

        assert!(secure_delete(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn secure_delete_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!secure_delete(&dir.path().join("missing")).unwrap());
    }

    #[test]
    fn synced_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_synced(&path, b"first version").unwrap();
        write_synced(&path, b"v2").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"v2");
    }

    #[test]
    fn create_unique_never_reuses_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("memo.aac");
        fs::write(dir.path().join("memo.aac.enc"), b"earlier recording").unwrap();

        let (first, mut file) = create_unique(&base, ".enc").unwrap();
        write_all_synced(&mut file, b"new").unwrap();
        let (second, _) = create_unique(&base, ".enc").unwrap();

        assert_ne!(first, dir.path().join("memo.aac.enc"));
        assert_ne!(first, second);
        assert!(has_suffix(&first, ".enc"));
        assert_eq!(fs::read(dir.path().join("memo.aac.enc")).unwrap(), b"earlier recording");
        assert_eq!(fs::read(&first).unwrap(), b"new");
    }

    #[test]
    fn create_unique_prefers_the_plain_name() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = create_unique(&dir.path().join("clip.aac"), ".temp").unwrap();
        assert_eq!(path, dir.path().join("clip.aac.temp"));
    }

    #[test]
    fn suffix_helpers() {
        let path = Path::new("/clips/memo.m4a");
        let enc = append_suffix(path, ".enc");
        assert_eq!(enc, PathBuf::from("/clips/memo.m4a.enc"));
        assert!(has_suffix(&enc, ".enc"));
        assert!(!has_suffix(path, ".enc"));
        assert_eq!(strip_suffix(&enc, ".enc"), Some(path.to_path_buf()));
        assert_eq!(strip_suffix(path, ".enc"), None);
    }

    #[test]
    fn checksum_is_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
