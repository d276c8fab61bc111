use std::path::Path;
use std::path::PathBuf;

use crate::path_utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterBinError {
    NotFoundInPath { command: String },
    InvalidPath { path: PathBuf, reason: String },
}

impl InterpreterBinError {
    pub fn render_ansi(&self) -> String {
        match self {
            InterpreterBinError::NotFoundInPath { command } => ansi_red(format!(
                "Failed to find `{command}` binary.\n\
                 xyzzy needs a remote-Glk interpreter (such as {}) on PATH,\n\
                 or set `[interpreter] program` in config.toml.\n",
                ansi_underline("fizmo-remglk"),
            )),
            InterpreterBinError::InvalidPath { path, reason } => ansi_red(format!(
                "Failed to use interpreter `{}` ({reason}).\n",
                path_utils::display_with_tilde(path)
            )),
        }
    }
}

/// Finds the interpreter executable, resolving relative paths against the current directory.
pub fn resolve_interpreter_bin(program: &str) -> Result<PathBuf, InterpreterBinError> {
    let cwd = std::env::current_dir().map_err(|err| InterpreterBinError::InvalidPath {
        path: PathBuf::from(program),
        reason: format!("cannot resolve current directory: {err}"),
    })?;
    resolve_interpreter_bin_in(program, &cwd)
}

/// Path-like values must name an executable file and come back absolute, since the interpreter
/// runs in its session directory. Bare names are looked up on `PATH`.
fn resolve_interpreter_bin_in(program: &str, base: &Path) -> Result<PathBuf, InterpreterBinError> {
    if path_utils::looks_like_path(program) {
        let path = path_utils::absolutize(base, Path::new(program));
        validate_executable_path(&path)?;
        return Ok(path);
    }

    which::which(program).map_err(|_| InterpreterBinError::NotFoundInPath {
        command: program.to_string(),
    })
}

fn validate_executable_path(path: &Path) -> Result<(), InterpreterBinError> {
    let meta = std::fs::metadata(path).map_err(|err| InterpreterBinError::InvalidPath {
        path: path.to_path_buf(),
        reason: describe_metadata_error(&err),
    })?;

    if !meta.is_file() {
        return Err(InterpreterBinError::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a file".to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(InterpreterBinError::InvalidPath {
                path: path.to_path_buf(),
                reason: "not executable".to_string(),
            });
        }
    }

    Ok(())
}

fn describe_metadata_error(err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::NotFound => "does not exist".to_string(),
        std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

fn ansi_red(text: String) -> String {
    format!("\u{1b}[31m{text}\u{1b}[0m")
}

fn ansi_underline(text: &str) -> String {
    format!("\u{1b}[4m{text}\u{1b}[24m")
}
