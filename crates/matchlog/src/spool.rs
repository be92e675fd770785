//! Spool of match segments that could not be flushed
//!
//! The retry queue lives in memory, so `matchlog ingest` writes the raw lines
//! of every segment still queued at exit to the spool file. `matchlog retry`
//! feeds the spool back through a fresh ingestor and replaces it with whatever
//! still fails. Replays are safe: an already stored match is detected as a
//! duplicate and skipped.
//!
//! Each segment is preceded by a `# match <id>` marker line. Marker lines are
//! outside the log grammar, so replaying them is a no-op.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::ingest::FailedSegment;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("failed to read spool {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write spool {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn render(segments: &[FailedSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push_str(&format!("# match {}\n", segment.match_id));
        for line in &segment.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Append segments to the spool, creating it if needed
///
/// Returns the number of segments written.
pub fn append(path: &Path, segments: &[FailedSegment]) -> Result<usize, SpoolError> {
    if segments.is_empty() {
        return Ok(0);
    }

    let write_err = |source| SpoolError::Write {
        path: path.display().to_string(),
        source,
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(render(segments).as_bytes())
        .map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    Ok(segments.len())
}

/// All spooled lines, markers included; a missing spool is empty
pub fn read(path: &Path) -> Result<Vec<String>, SpoolError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(SpoolError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Atomically replace the spool with `segments`; removes it when empty
pub fn replace(path: &Path, segments: &[FailedSegment]) -> Result<(), SpoolError> {
    let write_err = |source| SpoolError::Write {
        path: path.display().to_string(),
        source,
    };

    if segments.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(write_err(e)),
        };
    }

    // Same directory so the rename stays atomic
    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(render(segments).as_bytes())
        .map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    std::fs::rename(&temp_path, path).map_err(write_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchlog_storage::MatchId;

    fn segment(lines: &[&str]) -> FailedSegment {
        FailedSegment {
            match_id: MatchId::new(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_read_missing_spool_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&dir.path().join("spool.log")).unwrap().is_empty());
    }

    #[test]
    fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.log");

        let first = segment(&["L a", "L b"]);
        assert_eq!(append(&path, &[first.clone()]).unwrap(), 1);
        assert_eq!(append(&path, &[segment(&["L c"])]).unwrap(), 1);
        assert_eq!(append(&path, &[]).unwrap(), 0);

        let lines = read(&path).unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], format!("# match {}", first.match_id));
        assert_eq!(&lines[1..3], &["L a", "L b"]);
        assert_eq!(lines[4], "L c");
    }

    #[test]
    fn test_replace_overwrites_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.log");

        append(&path, &[segment(&["L old"])]).unwrap();
        replace(&path, &[segment(&["L new"])]).unwrap();
        let lines = read(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "L new");
        assert!(!path.with_extension("tmp").exists());

        replace(&path, &[]).unwrap();
        assert!(!path.exists());
        // Removing a missing spool is fine
        replace(&path, &[]).unwrap();
    }
}
