use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::ChildStdin;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::debug;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use xyzzy_protocol::InputFrame;
use xyzzy_protocol::InputKind;
use xyzzy_protocol::Output;

use crate::decoder::DecodeTask;
use crate::error::SendError;
use crate::error::SpawnError;
use crate::input_router::InputRouter;
use crate::input_router::InputTarget;
use crate::input_router::MissingInputPolicy;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::SessionState;
use crate::window_cache::WindowStateCache;

/// Capacity of the output channel handed to the consumer.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 5;

pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How to launch one interpreter process.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Save files and other incidental writes land here.
    pub working_dir: Option<PathBuf>,
    pub missing_input: MissingInputPolicy,
    /// How long `kill()` waits for the pipes to close before force-killing the child.
    pub kill_grace: Duration,
}

impl InterpreterConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            missing_input: MissingInputPolicy::default(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

#[derive(Default)]
struct Process {
    child: Option<Child>,
    pipe_tasks: Vec<JoinHandle<()>>,
}

/// Handle to a running interpreter. Reconciled frames arrive on the receiver returned by
/// [`Interpreter::start`]; its closure is the only end-of-session signal.
pub struct Interpreter {
    program: String,
    pid: Option<u32>,
    lifecycle: Lifecycle,
    router: InputRouter,
    killing: CancellationToken,
    kill_grace: Duration,
    stdin: Mutex<Option<ChildStdin>>,
    process: Mutex<Process>,
}

impl Interpreter {
    /// Spawns the interpreter and its decode and stderr-drain tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: InterpreterConfig) -> Result<(Self, mpsc::Receiver<Output>), SpawnError> {
        let InterpreterConfig {
            program,
            args,
            working_dir,
            missing_input,
            kill_grace,
        } = config;
        let program_name = program.display().to_string();

        let mut cmd = Command::new(&program);
        cmd.kill_on_drop(true);
        if let Some(working_dir) = working_dir.as_deref() {
            cmd.current_dir(working_dir);
        }

        let mut child = cmd
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SpawnError::Launch {
                program: program_name.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SpawnError::MissingPipe("stderr"))?;

        let pid = child.id();
        let span = info_span!("interpreter", pid, program = %program_name);
        let lifecycle = Lifecycle::new();
        let router = InputRouter::new(missing_input);
        let killing = CancellationToken::new();
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);

        let decode = DecodeTask {
            cache: WindowStateCache::new(),
            router: router.clone(),
            lifecycle: lifecycle.clone(),
            output_tx,
            killing: killing.clone(),
        };
        let decode_task = tokio::spawn(decode.run(stdout).instrument(span.clone()));
        let stderr_task = tokio::spawn(drain_stderr(stderr).instrument(span.clone()));

        lifecycle.set(SessionState::Started);
        span.in_scope(|| info!(args = ?args, "interpreter started"));

        let interpreter = Self {
            program: program_name,
            pid,
            lifecycle,
            router,
            killing,
            kill_grace,
            stdin: Mutex::new(Some(stdin)),
            process: Mutex::new(Process {
                child: Some(child),
                pipe_tasks: vec![decode_task, stderr_task],
            }),
        };
        Ok((interpreter, output_rx))
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.get()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The window and generation the next `send` will target.
    pub fn input_target(&self) -> InputTarget {
        self.router.current()
    }

    /// Writes one input frame addressed to the current input target.
    ///
    /// Calls are expected to be serialized by the caller; at most one turn is in flight.
    pub async fn send(&self, text: &str, kind: InputKind) -> Result<(), SendError> {
        let state = self.lifecycle.get();
        if state != SessionState::Running {
            return Err(SendError::NotRunning(state));
        }

        let target = self.router.current();
        let frame = InputFrame {
            kind,
            generation: target.generation,
            window: target.window,
            value: text.to_string(),
        };
        let mut json = serde_json::to_vec(&frame)?;
        json.push(b'\n');

        let mut stdin = self.stdin.lock().await;
        let stdin = stdin.as_mut().ok_or(SendError::StdinClosed)?;
        debug!(
            pid = self.pid,
            window = target.window,
            generation = target.generation,
            kind = %kind,
            "sending input"
        );
        tokio::select! {
            biased;
            _ = self.killing.cancelled() => Err(SendError::NotRunning(self.lifecycle.get())),
            written = write_frame(stdin, &json) => written,
        }
    }

    pub async fn send_line(&self, line: &str) -> Result<(), SendError> {
        self.send(line, InputKind::Line).await
    }

    pub async fn send_char(&self, ch: char) -> Result<(), SendError> {
        self.send(ch.encode_utf8(&mut [0u8; 4]), InputKind::Char)
            .await
    }

    /// Shuts the interpreter down: closes stdin, drains stdout and stderr to EOF, then reaps the
    /// process. A process that outlives the grace period at either step is force-killed. Safe to
    /// call more than once; later calls wait for the first to finish.
    pub async fn kill(&self) {
        let mut process = self.process.lock().await;
        let Some(mut child) = process.child.take() else {
            return;
        };

        self.lifecycle.set(SessionState::Killing);
        info!(pid = self.pid, program = %self.program, "killing interpreter");
        self.killing.cancel();

        if let Some(mut stdin) = self.stdin.lock().await.take()
            && let Err(err) = stdin.shutdown().await
        {
            debug!(pid = self.pid, error = %err, "closing interpreter stdin");
        }

        let mut pipe_tasks = std::mem::take(&mut process.pipe_tasks);
        if timeout(self.kill_grace, join_pipe_tasks(&mut pipe_tasks))
            .await
            .is_err()
        {
            warn!(
                pid = self.pid,
                grace_ms = self.kill_grace.as_millis() as u64,
                "interpreter did not close its pipes; force-killing"
            );
            if let Err(err) = child.start_kill() {
                warn!(pid = self.pid, error = %err, "failed to force-kill interpreter");
            }
            if timeout(self.kill_grace, join_pipe_tasks(&mut pipe_tasks))
                .await
                .is_err()
            {
                warn!(pid = self.pid, "abandoning interpreter pipe tasks");
                for task in pipe_tasks.drain(..) {
                    task.abort();
                }
            }
        }

        let waited = timeout(self.kill_grace, child.wait()).await;
        let exited = match waited {
            Ok(exited) => exited,
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_ms = self.kill_grace.as_millis() as u64,
                    "interpreter did not exit; force-killing"
                );
                if let Err(err) = child.start_kill() {
                    warn!(pid = self.pid, error = %err, "failed to force-kill interpreter");
                }
                child.wait().await
            }
        };
        match exited {
            Ok(status) if status.success() => info!(pid = self.pid, "interpreter exited"),
            Ok(status) => info!(pid = self.pid, %status, "interpreter exited after kill"),
            Err(err) => warn!(pid = self.pid, error = %err, "failed to reap interpreter"),
        }
        self.lifecycle.set(SessionState::Terminated);
    }
}

async fn write_frame(stdin: &mut ChildStdin, json: &[u8]) -> Result<(), SendError> {
    stdin.write_all(json).await?;
    stdin.flush().await?;
    Ok(())
}

async fn join_pipe_tasks(tasks: &mut Vec<JoinHandle<()>>) {
    while let Some(task) = tasks.first_mut() {
        if let Err(err) = task.await {
            warn!(error = %err, "interpreter pipe task failed");
        }
        tasks.remove(0);
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut stderr = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match stderr.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\n', '\r']);
                if !text.is_empty() {
                    debug!(stderr = text, "interpreter stderr");
                }
            }
            Err(err) => {
                debug!(error = %err, "reading interpreter stderr");
                break;
            }
        }
    }
}
