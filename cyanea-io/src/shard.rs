//! Sharded Parquet output with completion markers.
//!
//! A result table is a directory of `part.NNNNN.parquet` files, each
//! holding at most `rows_per_shard` rows in one row group. The directory
//! also carries one of two markers:
//!
//! - `_INCOMPLETE`: written when the writer is created, left in place when
//!   a run is aborted or the writer is dropped without finishing;
//! - `_SUCCESS`: written by [`ShardedWriter::finish`], a JSON
//!   [`ShardManifest`] listing every shard. `_INCOMPLETE` is removed.
//!
//! [`read_shards`] refuses a directory without `_SUCCESS` unless
//! [`ReadOptions::allow_incomplete`] is set.

use std::fs;
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cyanea_core::{CyaneaError, Result};

use crate::parquet::{create_file, pq_err, read_table, writer_properties, ShardRecord};

/// Marker of a finished table.
pub const SUCCESS_MARKER: &str = "_SUCCESS";
/// Marker of a table still being written, or abandoned.
pub const INCOMPLETE_MARKER: &str = "_INCOMPLETE";

/// File name of shard `n`.
pub fn shard_file_name(n: usize) -> String {
    format!("part.{n:05}.parquet")
}

fn is_shard_file(name: &str) -> bool {
    name.starts_with("part.") && name.ends_with(".parquet")
}

fn io_err(e: std::io::Error, path: &Path) -> CyaneaError {
    CyaneaError::Io(std::io::Error::new(
        e.kind(),
        format!("{}: {}", path.display(), e),
    ))
}

/// Contents of the `_SUCCESS` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    /// Total rows across all shards.
    pub rows: u64,
    /// Shard file names, in write order.
    pub shards: Vec<String>,
}

/// How a finished writer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
    pub dir: PathBuf,
    pub rows: u64,
    pub shards: usize,
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Buffers rows and writes them out in fixed-size shards.
#[derive(Debug)]
pub struct ShardedWriter<T: ShardRecord> {
    dir: PathBuf,
    rows_per_shard: usize,
    buffer: Vec<T>,
    shards: Vec<String>,
    rows: u64,
}

impl<T: ShardRecord> ShardedWriter<T> {
    /// Start a table in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// A configuration error if `rows_per_shard` is zero or `dir` already
    /// holds shards or a `_SUCCESS` marker; an I/O error if the directory
    /// or the `_INCOMPLETE` marker cannot be created.
    pub fn create(dir: impl Into<PathBuf>, rows_per_shard: usize) -> Result<Self> {
        let dir = dir.into();
        if rows_per_shard == 0 {
            return Err(CyaneaError::Configuration(
                "rows_per_shard must be at least 1".into(),
            ));
        }
        fs::create_dir_all(&dir).map_err(|e| io_err(e, &dir))?;

        let stale = dir.join(SUCCESS_MARKER).exists() || !list_shards(&dir)?.is_empty();
        if stale {
            return Err(CyaneaError::Configuration(format!(
                "{}: output directory already holds a result table",
                dir.display()
            )));
        }
        let marker = dir.join(INCOMPLETE_MARKER);
        fs::write(&marker, b"").map_err(|e| io_err(e, &marker))?;

        debug!(dir = %dir.display(), rows_per_shard, "sharded writer created");
        Ok(Self {
            dir,
            rows_per_shard,
            buffer: Vec::new(),
            shards: Vec::new(),
            rows: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rows flushed to shards so far.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Shards written so far.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Append one row, flushing a shard when the buffer is full.
    pub fn push(&mut self, row: T) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.rows_per_shard {
            self.flush_full()?;
        }
        Ok(())
    }

    /// Append many rows, flushing every full shard.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, rows: I) -> Result<()> {
        for row in rows {
            self.buffer.push(row);
            if self.buffer.len() >= self.rows_per_shard {
                self.flush_full()?;
            }
        }
        Ok(())
    }

    fn flush_full(&mut self) -> Result<()> {
        while self.buffer.len() >= self.rows_per_shard {
            let rest = self.buffer.split_off(self.rows_per_shard);
            let full = std::mem::replace(&mut self.buffer, rest);
            self.write_shard(&full)?;
        }
        Ok(())
    }

    fn write_shard(&mut self, rows: &[T]) -> Result<()> {
        let name = shard_file_name(self.shards.len());
        let path = self.dir.join(&name);
        let batch = T::to_batch(rows)?;
        let file = create_file(&path)?;
        let props = writer_properties(self.rows_per_shard);
        let mut writer = ArrowWriter::try_new(file, T::schema(), Some(props))
            .map_err(|e| pq_err(e, &path))?;
        writer.write(&batch).map_err(|e| pq_err(e, &path))?;
        writer.close().map_err(|e| pq_err(e, &path))?;

        self.rows += rows.len() as u64;
        self.shards.push(name);
        debug!(shard = %path.display(), rows = rows.len(), "shard flushed");
        Ok(())
    }

    /// Flush the remaining rows and mark the table complete.
    pub fn finish(mut self) -> Result<ShardSummary> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.write_shard(&rest)?;
        }

        let manifest = ShardManifest {
            rows: self.rows,
            shards: self.shards.clone(),
        };
        let success = self.dir.join(SUCCESS_MARKER);
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| CyaneaError::Other(format!("manifest: {e}")))?;
        fs::write(&success, json).map_err(|e| io_err(e, &success))?;

        let marker = self.dir.join(INCOMPLETE_MARKER);
        if marker.exists() {
            fs::remove_file(&marker).map_err(|e| io_err(e, &marker))?;
        }

        info!(
            dir = %self.dir.display(),
            rows = self.rows,
            shards = self.shards.len(),
            "result table complete"
        );
        Ok(ShardSummary {
            dir: self.dir.clone(),
            rows: self.rows,
            shards: self.shards.len(),
            complete: true,
        })
    }

    /// Drop buffered rows and leave the table flagged incomplete.
    ///
    /// Shards already on disk stay where they are so a partial run can be
    /// inspected with [`ReadOptions::allow_incomplete`].
    pub fn abort(self) -> ShardSummary {
        warn!(
            dir = %self.dir.display(),
            rows = self.rows,
            discarded = self.buffer.len(),
            "result table left incomplete"
        );
        ShardSummary {
            dir: self.dir.clone(),
            rows: self.rows,
            shards: self.shards.len(),
            complete: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Options for [`read_shards`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Read a table that has no `_SUCCESS` marker.
    pub allow_incomplete: bool,
}

/// Whether `dir` holds a finished table.
pub fn is_complete(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    dir.join(SUCCESS_MARKER).is_file() && !dir.join(INCOMPLETE_MARKER).exists()
}

/// Parse the `_SUCCESS` manifest of a finished table.
pub fn read_manifest(dir: impl AsRef<Path>) -> Result<ShardManifest> {
    let path = dir.as_ref().join(SUCCESS_MARKER);
    let text = fs::read_to_string(&path).map_err(|e| io_err(e, &path))?;
    serde_json::from_str(&text).map_err(|e| pq_err(e, &path))
}

/// Shard files in `dir`, sorted by name.
pub fn list_shards(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(e, dir))? {
        let entry = entry.map_err(|e| io_err(e, dir))?;
        if entry.file_name().to_str().is_some_and(is_shard_file) {
            shards.push(entry.path());
        }
    }
    shards.sort();
    Ok(shards)
}

/// Read every row of a sharded table, shard by shard.
///
/// # Errors
///
/// An invalid-input error if the table is not complete and
/// `options.allow_incomplete` is not set; I/O and parse errors from the
/// shards themselves.
pub fn read_shards<T: ShardRecord>(dir: impl AsRef<Path>, options: ReadOptions) -> Result<Vec<T>> {
    let dir = dir.as_ref();
    let shards = if is_complete(dir) {
        read_manifest(dir)?
            .shards
            .iter()
            .map(|name| dir.join(name))
            .collect()
    } else if options.allow_incomplete {
        warn!(dir = %dir.display(), "reading incomplete result table");
        list_shards(dir)?
    } else {
        return Err(CyaneaError::InvalidInput(format!(
            "{}: result table is incomplete (no {SUCCESS_MARKER} marker)",
            dir.display()
        )));
    };

    let mut rows = Vec::new();
    for path in shards {
        rows.extend(read_table::<T>(&path)?);
    }
    Ok(rows)
}
