use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::atomic_write::write_atomic;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game `{0}` not found")]
    NotFound(String),

    #[error("invalid game file name `{0}`")]
    InvalidFileName(String),

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

/// Resolves game names to story files the interpreter can load.
pub trait GameRepository {
    /// Game names (file stems), sorted.
    fn list_games(&self) -> Result<Vec<String>, GameError>;

    fn game_file(&self, name: &str) -> Result<PathBuf, GameError>;
}

/// Games stored as plain files in one directory. A game's name is its file name without the
/// extension.
#[derive(Debug, Clone)]
pub struct FsGameRepository {
    directory: PathBuf,
}

impl FsGameRepository {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn add_game(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf, GameError> {
        validate_file_name(file_name)?;
        let path = self.directory.join(file_name);
        info!(game = file_name, file = %path.display(), bytes = contents.len(), "adding game");
        write_atomic(&path, contents).map_err(|err| GameError::Write {
            path: path.clone(),
            reason: format!("{err:#}"),
        })?;
        Ok(path)
    }

    pub fn remove_game(&self, file_name: &str) -> Result<(), GameError> {
        validate_file_name(file_name)?;
        let path = self.directory.join(file_name);
        info!(game = file_name, file = %path.display(), "removing game");
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(GameError::NotFound(file_name.to_string()))
            }
            Err(source) => Err(GameError::Io {
                action: "remove",
                path,
                source,
            }),
        }
    }

    /// `(stem, file name)` for every visible regular file, sorted.
    fn entries(&self) -> Result<Vec<(String, String)>, GameError> {
        let read_dir = std::fs::read_dir(&self.directory).map_err(|source| GameError::Io {
            action: "read",
            path: self.directory.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| GameError::Io {
                action: "read",
                path: self.directory.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(std::ffi::OsStr::to_str) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(std::ffi::OsStr::to_str) else {
                continue;
            };
            entries.push((stem.to_string(), file_name.to_string()));
        }
        entries.sort();
        Ok(entries)
    }
}

impl GameRepository for FsGameRepository {
    fn list_games(&self) -> Result<Vec<String>, GameError> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .map(|(stem, _)| stem)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn game_file(&self, name: &str) -> Result<PathBuf, GameError> {
        self.entries()?
            .into_iter()
            .find(|(stem, _)| stem == name)
            .map(|(_, file_name)| self.directory.join(file_name))
            .ok_or_else(|| GameError::NotFound(name.to_string()))
    }
}

fn validate_file_name(file_name: &str) -> Result<(), GameError> {
    let invalid = file_name.is_empty()
        || file_name.starts_with('.')
        || file_name.contains(['/', '\\'])
        || file_name.contains("..");
    if invalid {
        return Err(GameError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}
