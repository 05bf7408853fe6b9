//! Classify a mount's filesystem type so the daemon can warn when its state
//! directory sits on a network filesystem, where advisory locks are not
//! reliable.

use std::path::Path;

/// Filesystem kind as far as lock reliability is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Local,
    Network(&'static str),
    Unknown,
}

const NETWORK_FS_TYPES: &[&str] = &[
    "nfs", "nfs4", "cifs", "smbfs", "afs", "gfs", "gfs2", "glusterfs", "lustre", "ceph", "ceph.fuse",
    "fuse.sshfs", "fuse.s3fs", "9p",
];

/// Determine whether `path` lives on a network filesystem.
///
/// Reads `/proc/mounts` on Linux and picks the longest mount-point prefix
/// match rather than shelling out to `mount` per call. Falls back to
/// `Unknown` when `/proc/mounts` is unavailable (e.g. macOS) since this is
/// only ever used for a best-effort startup warning, not a hard dependency.
pub fn is_network_filesystem(path: &Path) -> FsKind {
    let mounts = match std::fs::read_to_string("/proc/mounts") {
        Ok(contents) => contents,
        Err(_) => return FsKind::Unknown,
    };
    classify(&mounts, path)
}

fn classify(mounts: &str, path: &Path) -> FsKind {
    let target = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => path.to_path_buf(),
    };

    let mut best: Option<(usize, &str)> = None;
    for line in mounts.lines() {
        let mut fields = line.split_whitespace();
        let _device = fields.next();
        let Some(mount_point) = fields.next() else {
            continue;
        };
        let Some(fs_type) = fields.next() else {
            continue;
        };
        let mount_point = unescape_octal(mount_point);
        if target.starts_with(&mount_point) {
            let len = mount_point.as_os_str().len();
            if best.map(|(best_len, _)| len > best_len).unwrap_or(true) {
                best = Some((len, fs_type));
            }
        }
    }

    match best {
        Some((_, fs_type)) => {
            let normalized = fs_type.to_ascii_lowercase();
            if let Some(&known) = NETWORK_FS_TYPES.iter().find(|&&k| k == normalized) {
                FsKind::Network(known)
            } else if normalized.starts_with("fuse.") && normalized.contains('s') {
                FsKind::Network("fuse")
            } else {
                FsKind::Local
            }
        }
        None => FsKind::Unknown,
    }
}

/// `/proc/mounts` escapes spaces, tabs, and backslashes as `\040` etc.
fn unescape_octal(s: &str) -> std::path::PathBuf {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(code) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or(""), 8) {
                out.push(code);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    std::path::PathBuf::from(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
#[path = "fs_kind_tests.rs"]
mod tests;
