//! Per-sample archive on disk.
//!
//! One archive root per operator session:
//!
//! ```text
//! <root>/background/<sample>.png
//! <root>/objects/<sample>.png
//! <root>/coordinates/<sample>.txt
//! <root>/log/log_<YYYY-MM-DD_HH-MM>.csv
//! ```
//!
//! The log file is named after the session start and receives one row
//! per archived sample.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use zigscan_export::{RUN_LOG_HEADER, RunLogEntry, Timestamp, to_coordinate_text, to_csv_row};
use zigscan_pipeline::{Frame, RunConfig, WorldPoint};

use crate::frames::{FrameError, save_frame};

const BACKGROUND_DIR: &str = "background";
const OBJECT_DIR: &str = "objects";
const COORDINATE_DIR: &str = "coordinates";
const LOG_DIR: &str = "log";

/// Errors from writing the sample archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The sample name cannot be used as a file stem.
    #[error("sample name {0:?} is empty or contains a path separator")]
    InvalidSampleName(String),

    /// A directory or file could not be created or written.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A frame could not be written.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Paths written for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSample {
    pub background: PathBuf,
    pub object: PathBuf,
    pub coordinates: PathBuf,
}

/// An open archive with its session log.
#[derive(Debug)]
pub struct SampleArchive {
    root: PathBuf,
    log_path: PathBuf,
    log: File,
}

impl SampleArchive {
    /// Create the archive layout under `root` and open the log for a
    /// session started at `started`.
    ///
    /// An existing log for the same minute is appended to; a new one gets
    /// the header row first.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if a directory or the log file cannot
    /// be created.
    pub fn open(root: impl Into<PathBuf>, started: Timestamp) -> Result<Self, ArchiveError> {
        let root = root.into();
        for dir in [BACKGROUND_DIR, OBJECT_DIR, COORDINATE_DIR, LOG_DIR] {
            let path = root.join(dir);
            std::fs::create_dir_all(&path).map_err(|source| ArchiveError::Io { path, source })?;
        }

        let log_path = root
            .join(LOG_DIR)
            .join(format!("log_{}.csv", started.file_stamp()));
        let io_err = |source| ArchiveError::Io {
            path: log_path.clone(),
            source,
        };
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(io_err)?;
        if log.metadata().map_err(io_err)?.len() == 0 {
            writeln!(log, "{RUN_LOG_HEADER}").map_err(io_err)?;
        }

        tracing::info!(root = %root.display(), log = %log_path.display(), "opened sample archive");
        Ok(Self {
            root,
            log_path,
            log,
        })
    }

    /// Archive root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of this session's log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Write both frames and the coordinate file for `sample`, then append
    /// its log row.
    ///
    /// Files of an earlier sample with the same name are overwritten. The
    /// log row is written last, so a logged sample always has its files.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidSampleName`] before touching the
    /// disk if `sample` is not a plain file stem, and an I/O or frame error
    /// if a write fails.
    pub fn archive(
        &mut self,
        sample: &str,
        background: &Frame,
        object: &Frame,
        world_path: &[WorldPoint],
        config: &RunConfig,
        at: Timestamp,
    ) -> Result<ArchivedSample, ArchiveError> {
        validate_sample_name(sample)?;

        let files = ArchivedSample {
            background: self.root.join(BACKGROUND_DIR).join(format!("{sample}.png")),
            object: self.root.join(OBJECT_DIR).join(format!("{sample}.png")),
            coordinates: self.root.join(COORDINATE_DIR).join(format!("{sample}.txt")),
        };
        save_frame(&files.background, background)?;
        save_frame(&files.object, object)?;
        std::fs::write(&files.coordinates, to_coordinate_text(world_path)).map_err(|source| {
            ArchiveError::Io {
                path: files.coordinates.clone(),
                source,
            }
        })?;

        let row = to_csv_row(&RunLogEntry::new(sample, at, config));
        self.log
            .write_all(row.as_bytes())
            .and_then(|()| self.log.flush())
            .map_err(|source| ArchiveError::Io {
                path: self.log_path.clone(),
                source,
            })?;

        tracing::info!(sample, points = world_path.len(), "archived sample");
        Ok(files)
    }
}

fn validate_sample_name(sample: &str) -> Result<(), ArchiveError> {
    let usable = !sample.trim().is_empty()
        && sample != "."
        && sample != ".."
        && !sample.contains(['/', '\\'])
        && !sample.contains('\0');
    if usable {
        Ok(())
    } else {
        Err(ArchiveError::InvalidSampleName(sample.to_owned()))
    }
}

/// The current wall-clock time in UTC.
///
/// A clock set before 1970 reads as the epoch.
#[must_use]
pub fn now() -> Timestamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    Timestamp::from_unix_seconds(secs)
}
