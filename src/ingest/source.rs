use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::email::RawMessage;
use crate::error::SourceError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Yields downloaded messages in on-screen order, newest first.
pub trait MessageSource {
    /// `Ok(None)` once the source is exhausted. May block for as long as the
    /// underlying download takes.
    fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError>;
}

/// One line of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    #[serde(default)]
    pub rendered_dates: Vec<String>,
}

/// A directory of `.eml` downloads plus a manifest of the dates the UI showed
/// for each of them.
pub struct EmlDirSource {
    dir: PathBuf,
    pending: VecDeque<ManifestEntry>,
    remove_consumed: bool,
}

impl EmlDirSource {
    /// Read `<dir>/manifest.json`. Without a manifest every `*.eml` file is
    /// queued in file-name order with no rendered dates.
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let manifest = dir.join(MANIFEST_FILE);
        let pending = if manifest.exists() {
            let s = fs::read_to_string(&manifest).map_err(|source| SourceError::Io {
                path: manifest.clone(),
                source,
            })?;
            serde_json::from_str::<Vec<ManifestEntry>>(&s).map_err(|source| {
                SourceError::Manifest {
                    path: manifest.clone(),
                    source,
                }
            })?
        } else {
            log::warn!(
                "no {} in {}; using file-name order without rendered dates",
                MANIFEST_FILE,
                dir.display()
            );
            list_eml_files(dir)?
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            pending: pending.into(),
            remove_consumed: false,
        })
    }

    /// Delete each file once it has been handed out.
    pub fn remove_consumed(mut self, yes: bool) -> Self {
        self.remove_consumed = yes;
        self
    }
}

fn list_eml_files(dir: &Path) -> Result<Vec<ManifestEntry>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("eml"))
            && let Some(name) = path.file_name()
        {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .map(|file| ManifestEntry {
            file,
            rendered_dates: Vec::new(),
        })
        .collect())
}

impl MessageSource for EmlDirSource {
    fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError> {
        let Some(entry) = self.pending.pop_front() else {
            return Ok(None);
        };
        let path = self.dir.join(&entry.file);
        let bytes = fs::read(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        if self.remove_consumed
            && let Err(e) = fs::remove_file(&path)
        {
            log::warn!("could not remove {}: {e}", path.display());
        }
        Ok(Some(
            RawMessage::new(bytes, entry.rendered_dates).with_label(entry.file),
        ))
    }
}
