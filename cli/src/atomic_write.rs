use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

/// Writes `contents` to a temp file beside `path`, then renames it into place so readers never
/// see a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for atomic write: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    use std::io::Write as _;
    tmp.write_all(contents).context("write temp file")?;
    tmp.flush().context("flush temp file")?;

    tmp.persist(path).map_err(|err| {
        anyhow::Error::new(err.error).context(format!("persist file to {}", path.display()))
    })?;

    Ok(())
}
