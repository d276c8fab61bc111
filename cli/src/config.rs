use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::TableLike;
use xyzzy_interpreter::DEFAULT_KILL_GRACE;
use xyzzy_interpreter::InterpreterConfig;
use xyzzy_interpreter::MissingInputPolicy;
use xyzzy_markup::MarkupDialect;

use crate::path_utils;

pub const DEFAULT_INTERPRETER: &str = "fizmo-remglk";

const DEFAULT_INTERPRETER_ARGS: [&str; 5] = ["-fixmetrics", "-width", "80", "-height", "50"];

/// How to launch the interpreter for a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSettings {
    pub program: String,
    /// Arguments placed before the game file.
    pub args: Vec<String>,
    pub kill_grace: Duration,
    pub missing_input: MissingInputPolicy,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_INTERPRETER.to_string(),
            args: DEFAULT_INTERPRETER_ARGS.iter().map(ToString::to_string).collect(),
            kill_grace: DEFAULT_KILL_GRACE,
            missing_input: MissingInputPolicy::default(),
        }
    }
}

/// Settings read from `config.toml`. Relative paths are resolved against the directory holding
/// the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub game_directory: PathBuf,
    pub working_root: PathBuf,
    pub interpreter: InterpreterSettings,
    /// `None` lets the frontend pick its own default.
    pub dialect: Option<MarkupDialect>,
}

impl BridgeConfig {
    /// Defaults for a config living in `base`: games in `base/games`, sessions in
    /// `base/sessions`.
    pub fn defaults_in(base: &Path) -> Self {
        Self {
            game_directory: base.join("games"),
            working_root: base.join("sessions"),
            interpreter: InterpreterSettings::default(),
            dialect: None,
        }
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .context("resolve current directory")?
                .join(path)
        };
        let base = path.parent().unwrap_or(Path::new("/")).to_path_buf();

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::defaults_in(&base));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("read {}", path.display())));
            }
        };

        let doc = contents
            .parse::<DocumentMut>()
            .with_context(|| format!("parse {}", path.display()))?;
        Self::from_document(&doc, &base).with_context(|| format!("invalid {}", path.display()))
    }

    pub fn from_document(doc: &DocumentMut, base: &Path) -> anyhow::Result<Self> {
        let mut config = Self::defaults_in(base);

        if let Some(dir) = read_string(doc.get("game_directory"), "game_directory")? {
            config.game_directory = path_utils::absolutize(base, Path::new(&dir));
        }
        if let Some(dir) = read_string(doc.get("working_root"), "working_root")? {
            config.working_root = path_utils::absolutize(base, Path::new(&dir));
        }

        if let Some(interpreter) = read_table(doc, "interpreter")? {
            let settings = &mut config.interpreter;
            if let Some(program) = read_string(interpreter.get("program"), "interpreter.program")? {
                settings.program = if path_utils::looks_like_path(&program) {
                    path_utils::absolutize(base, Path::new(&program))
                        .display()
                        .to_string()
                } else {
                    program
                };
            }
            if let Some(args) = read_string_array(interpreter.get("args"), "interpreter.args")? {
                settings.args = args;
            }
            if let Some(grace) = interpreter.get("kill_grace_ms") {
                let millis = grace
                    .as_integer()
                    .and_then(|millis| u64::try_from(millis).ok())
                    .context("`interpreter.kill_grace_ms` must be a non-negative integer")?;
                settings.kill_grace = Duration::from_millis(millis);
            }
            if let Some(policy) =
                read_string(interpreter.get("missing_input"), "interpreter.missing_input")?
            {
                settings.missing_input = MissingInputPolicy::from_name(&policy).with_context(
                    || format!("unknown `interpreter.missing_input` policy `{policy}`"),
                )?;
            }
        }

        if let Some(markup) = read_table(doc, "markup")?
            && let Some(dialect) = read_string(markup.get("dialect"), "markup.dialect")?
        {
            config.dialect = Some(
                MarkupDialect::from_name(&dialect)
                    .with_context(|| format!("unknown `markup.dialect` `{dialect}`"))?,
            );
        }

        Ok(config)
    }

    /// Launch settings for one session of `game_file`.
    pub fn interpreter_config(
        &self,
        program: PathBuf,
        game_file: &Path,
        working_dir: PathBuf,
    ) -> InterpreterConfig {
        let mut config = InterpreterConfig::new(program);
        config.args = self.interpreter.args.clone();
        config.args.push(game_file.display().to_string());
        config.working_dir = Some(working_dir);
        config.missing_input = self.interpreter.missing_input;
        config.kill_grace = self.interpreter.kill_grace;
        config
    }

    /// `<working_root>/<session>`, created if needed. Save files land here.
    pub fn working_dir_for(&self, session: &str) -> anyhow::Result<PathBuf> {
        let dir = self
            .working_root
            .join(path_utils::sanitize_component(session));
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(dir)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        anyhow::bail!("cannot determine home directory for config path");
    };
    Ok(config_path_in(&home))
}

fn config_path_in(home: &Path) -> PathBuf {
    home.join(".xyzzy").join("config.toml")
}

fn read_table<'a>(doc: &'a DocumentMut, key: &str) -> anyhow::Result<Option<&'a dyn TableLike>> {
    match doc.get(key) {
        None => Ok(None),
        Some(item) => item
            .as_table_like()
            .map(Some)
            .with_context(|| format!("`[{key}]` must be a table")),
    }
}

fn read_string(item: Option<&TomlItem>, key: &str) -> anyhow::Result<Option<String>> {
    match item {
        None => Ok(None),
        Some(item) => item
            .as_str()
            .map(|value| Some(value.to_string()))
            .with_context(|| format!("`{key}` must be a string")),
    }
}

fn read_string_array(item: Option<&TomlItem>, key: &str) -> anyhow::Result<Option<Vec<String>>> {
    let Some(item) = item else {
        return Ok(None);
    };
    let array = item
        .as_array()
        .with_context(|| format!("`{key}` must be an array of strings"))?;
    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(ToString::to_string)
                .with_context(|| format!("`{key}` must be an array of strings"))
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .map(Some)
}
