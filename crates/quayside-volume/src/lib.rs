//! # quayside-volume
//!
//! Filesystem bootstrap for the queue manager's mounted data volume.
//!
//! The server container runs this at startup: make sure a `data`
//! subdirectory exists under the volume mount and is owned by the fixed
//! `mqm` uid/gid, whatever state a previous container left behind.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::fs;
use std::path::Path;

use quayside_common::constants::{DATA_SUBDIR, MQ_GID, MQ_UID};
use quayside_common::error::{QuaysideError, Result};

/// Mode for a freshly created data directory.
#[cfg(unix)]
const DATA_DIR_MODE: u32 = 0o755;

/// Ensures the data directory under `path` exists and is owned correctly.
///
/// Idempotent and safe to run on every startup: an existing directory is
/// kept as-is apart from ownership, and ownership is changed only when it
/// differs from the expected `mqm` uid/gid. Off Linux, ownership metadata
/// is not meaningful and is left alone.
///
/// # Errors
///
/// Returns [`QuaysideError::Io`] if the directory cannot be created or the
/// ownership change is rejected.
pub fn ensure_volume(path: &Path) -> Result<()> {
    ensure_data_dir(path, MQ_UID, MQ_GID)
}

fn ensure_data_dir(path: &Path, uid: u32, gid: u32) -> Result<()> {
    let data_dir = path.join(DATA_SUBDIR);
    if !data_dir.exists() {
        create_data_dir(&data_dir)?;
        tracing::info!(path = %data_dir.display(), "data directory created");
    }
    adjust_ownership(&data_dir, uid, gid)
}

fn create_data_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    let builder = builder.recursive(true);
    #[cfg(unix)]
    let builder = {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DATA_DIR_MODE)
    };
    builder.create(dir).map_err(|e| QuaysideError::Io {
        path: dir.to_path_buf(),
        source: e,
    })
}

#[cfg(target_os = "linux")]
fn adjust_ownership(dir: &Path, uid: u32, gid: u32) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let metadata = fs::metadata(dir).map_err(|e| QuaysideError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    if metadata.uid() == uid && metadata.gid() == gid {
        return Ok(());
    }
    nix::unistd::chown(
        dir,
        Some(nix::unistd::Uid::from_raw(uid)),
        Some(nix::unistd::Gid::from_raw(gid)),
    )
    .map_err(|errno| {
        tracing::error!(path = %dir.display(), error = %errno, "data directory ownership change failed");
        QuaysideError::Io {
            path: dir.to_path_buf(),
            source: errno.into(),
        }
    })?;
    tracing::info!(path = %dir.display(), uid, gid, "data directory ownership adjusted");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn adjust_ownership(_dir: &Path, _uid: u32, _gid: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_ids() -> (u32, u32) {
        (
            nix::unistd::Uid::effective().as_raw(),
            nix::unistd::Gid::effective().as_raw(),
        )
    }

    #[test]
    fn creates_the_data_directory_with_expected_mode() {
        let root = tempfile::tempdir().expect("tempdir");
        let (uid, gid) = current_ids();

        ensure_data_dir(root.path(), uid, gid).expect("bootstrap");
        let data = root.path().join(DATA_SUBDIR);
        assert!(data.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&data).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn second_call_preserves_existing_state() {
        let root = tempfile::tempdir().expect("tempdir");
        let (uid, gid) = current_ids();

        ensure_data_dir(root.path(), uid, gid).expect("first call");
        let marker = root.path().join(DATA_SUBDIR).join("qm1.dat");
        fs::write(&marker, b"queue manager state").expect("write marker");

        ensure_data_dir(root.path(), uid, gid).expect("second call");
        assert!(marker.exists());
        let contents = fs::read(&marker).expect("read marker");
        assert_eq!(contents, b"queue manager state");
    }

    #[test]
    fn adopts_a_directory_left_by_a_previous_container() {
        let root = tempfile::tempdir().expect("tempdir");
        let (uid, gid) = current_ids();
        fs::create_dir_all(root.path().join(DATA_SUBDIR)).expect("pre-create");

        ensure_data_dir(root.path(), uid, gid).expect("bootstrap");
        assert!(root.path().join(DATA_SUBDIR).is_dir());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn ownership_is_adjusted_when_running_as_root() {
        if !nix::unistd::Uid::effective().is_root() {
            return;
        }
        use std::os::unix::fs::MetadataExt;

        let root = tempfile::tempdir().expect("tempdir");
        ensure_volume(root.path()).expect("bootstrap");

        let metadata = fs::metadata(root.path().join(DATA_SUBDIR)).expect("metadata");
        assert_eq!(metadata.uid(), MQ_UID);
        assert_eq!(metadata.gid(), MQ_GID);
    }
}
