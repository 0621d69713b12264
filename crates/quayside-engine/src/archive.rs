//! In-memory tar build contexts.
//!
//! Ad-hoc image builds (e.g. layering one configuration file onto a base
//! image) need a build context but no on-disk staging area. The context is
//! assembled entirely in memory and handed to the engine as a single blob.

use std::path::PathBuf;

use quayside_common::error::{QuaysideError, Result};

/// Mode recorded for every context entry.
const CONTEXT_FILE_MODE: u32 = 0o600;

/// Builds a tar archive from an ordered set of `(name, contents)` pairs.
///
/// The archive is a flat file set with no directory entries and no
/// symlinks. Each entry records its exact byte length and mode 0600.
///
/// # Errors
///
/// Returns [`QuaysideError::Io`] if an entry cannot be appended or the
/// archive cannot be finalized.
pub fn build_context(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(CONTEXT_FILE_MODE);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *contents)
            .map_err(|e| QuaysideError::Io {
                path: PathBuf::from(name),
                source: e,
            })?;
    }

    builder.into_inner().map_err(|e| QuaysideError::Io {
        path: PathBuf::from("<build context>"),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(archive: &[u8]) -> Vec<(String, u32, u64, Vec<u8>)> {
        use std::io::Read;

        let mut reader = tar::Archive::new(archive);
        reader
            .entries()
            .expect("entries")
            .map(|entry| {
                let mut entry = entry.expect("entry");
                let name = entry
                    .path()
                    .expect("path")
                    .to_string_lossy()
                    .into_owned();
                let mode = entry.header().mode().expect("mode");
                let size = entry.header().size().expect("size");
                let mut body = Vec::new();
                let _ = entry.read_to_end(&mut body).expect("read entry");
                (name, mode, size, body)
            })
            .collect()
    }

    #[test]
    fn context_preserves_names_contents_and_order() {
        let dockerfile = b"FROM qm-devserver:latest\nADD test.mqsc /etc/mqm/".as_slice();
        let mqsc = b"DEFINE QLOCAL(test)".as_slice();
        let archive = build_context(&[("Dockerfile", dockerfile), ("test.mqsc", mqsc)])
            .expect("build context");

        let entries = entries(&archive);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "Dockerfile");
        assert_eq!(entries[0].3, dockerfile);
        assert_eq!(entries[1].0, "test.mqsc");
        assert_eq!(entries[1].3, mqsc);
    }

    #[test]
    fn context_entries_record_mode_and_exact_length() {
        let body = b"DEFINE QLOCAL(orders)".as_slice();
        let archive = build_context(&[("config.mqsc", body)]).expect("build context");

        let entries = entries(&archive);
        assert_eq!(entries[0].1, CONTEXT_FILE_MODE);
        assert_eq!(entries[0].2, body.len() as u64);
    }

    #[test]
    fn empty_context_is_a_valid_archive() {
        let archive = build_context(&[]).expect("build context");
        assert!(entries(&archive).is_empty());
    }
}
