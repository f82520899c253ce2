//! Output shards: `{owner}_{name}_{index}.json`, never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use reviewminer_core::ShardError;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::record::HarvestRecord;
use crate::target::Target;

/// Writes shards into one output directory.
#[derive(Debug, Clone)]
pub struct ShardWriter {
    dir: PathBuf,
}

impl ShardWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of shard `index` for `target`
    pub fn shard_path(&self, target: &Target, index: u32) -> PathBuf {
        self.dir.join(format!("{}_{index}.json", target.shard_stem()))
    }

    /// Write `records` as the next free shard for `target`.
    ///
    /// The lowest unused index is claimed with an exclusive create, so two
    /// writers can never pick the same name and an existing shard is never
    /// touched. Content goes to a `.tmp` sibling first and is renamed over
    /// the claimed (empty) file once complete.
    pub fn write(
        &self,
        target: &Target,
        records: &[HarvestRecord],
    ) -> Result<PathBuf, ShardError> {
        fs::create_dir_all(&self.dir).map_err(|e| ShardError::io(&self.dir, e))?;
        let path = self.reserve(target)?;

        let tmp = tmp_path(&path);
        if let Err(e) = write_json(&tmp, records) {
            let _ = fs::remove_file(&tmp);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ShardError::io(&path, e)
        })?;

        log::debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Claim the first `index = 1, 2, ...` whose file does not exist yet
    fn reserve(&self, target: &Target) -> Result<PathBuf, ShardError> {
        let mut index = 1u32;
        loop {
            let path = self.shard_path(target, index);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    index = index
                        .checked_add(1)
                        .ok_or_else(|| ShardError::io(&path, ErrorKind::AlreadyExists.into()))?;
                }
                Err(e) => return Err(ShardError::io(&path, e)),
            }
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Pretty JSON array, 4-space indent
fn write_json(path: &Path, records: &[HarvestRecord]) -> Result<(), ShardError> {
    let file = File::create(path).map_err(|e| ShardError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut ser =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut ser)?;
    writer.flush().map_err(|e| ShardError::io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| ShardError::io(path, e))
}

/// Remove `*.tmp` leftovers from an interrupted run. Returns how many went.
pub fn cleanup_tmp_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") && path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Removed stale {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }
    removed
}
