//! Persistence of exhaust labels and the voyage lookup table.
//!
//! Every file is written to a temporary sibling and renamed into place, so
//! a reader sees either the previous file or the new one in full.

pub mod export;
pub mod key;
pub mod result_store;
pub mod voyage;

pub use export::{ExportAttributes, StoredLabel};
pub use key::ResultKey;
pub use result_store::{LoadOutcome, ResultSource, ResultStore};
pub use voyage::{VoyageIndex, VoyageRecord};

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::prelude::{ExhaustError, ExhaustResult};

/// Fully written and synced temporary file waiting to replace `path`.
pub(crate) struct StagedFile {
    temp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Writes the new contents next to `path` without touching `path`.
    pub(crate) fn stage<F>(path: &Path, write: F) -> ExhaustResult<Self>
    where
        F: FnOnce(&mut dyn Write) -> ExhaustResult<()>,
    {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(|err| {
            ExhaustError::Persistence(format!("creating temporary file in {}: {}", dir.display(), err))
        })?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write(&mut writer)?;
            writer
                .flush()
                .map_err(|err| ExhaustError::Persistence(format!("flushing {}: {}", path.display(), err)))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| ExhaustError::Persistence(format!("syncing {}: {}", path.display(), err)))?;
        Ok(Self {
            temp,
            path: path.to_path_buf(),
        })
    }

    /// Renames the staged file over its target.
    pub(crate) fn commit(self) -> ExhaustResult<()> {
        let path = self.path;
        self.temp.persist(&path).map_err(|err| {
            ExhaustError::Persistence(format!("replacing {}: {}", path.display(), err.error))
        })?;
        Ok(())
    }
}

pub(crate) fn write_atomically<F>(path: &Path, write: F) -> ExhaustResult<()>
where
    F: FnOnce(&mut dyn Write) -> ExhaustResult<()>,
{
    StagedFile::stage(path, write)?.commit()
}
