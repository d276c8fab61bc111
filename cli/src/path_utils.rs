use std::path::Path;
use std::path::PathBuf;

/// Expands a leading `~` or `~/` to the home directory. Other paths are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(path_str) = path.to_str() else {
        return path.to_path_buf();
    };
    let rest = match path_str {
        "~" => "",
        _ => match path_str.strip_prefix("~/") {
            Some(rest) => rest,
            None => return path.to_path_buf(),
        },
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolves `path` against `base` after tilde expansion, leaving absolute paths alone.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Whether `value` names a file rather than a command to look up on `PATH`.
pub fn looks_like_path(value: &str) -> bool {
    Path::new(value).is_absolute()
        || value.contains('/')
        || value.contains('\\')
        || value.starts_with('~')
}

pub fn display_with_tilde(path: &Path) -> String {
    let Some(home) = dirs::home_dir() else {
        return path.display().to_string();
    };
    match path.strip_prefix(&home) {
        Ok(stripped) if stripped.as_os_str().is_empty() => "~".to_string(),
        Ok(stripped) => format!("~/{}", stripped.display()),
        Err(_) => path.display().to_string(),
    }
}

/// Turns a session name into a single safe path component.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => ch,
            _ => '_',
        })
        .collect();
    match sanitized.trim_matches('.') {
        "" => "session".to_string(),
        trimmed => trimmed.to_string(),
    }
}
