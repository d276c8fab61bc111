use std::io::Write;

use anyhow::Context;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;
use tracing::warn;
use xyzzy_interpreter::Interpreter;
use xyzzy_interpreter::SendError;
use xyzzy_markup::Formatter;
use xyzzy_markup::RenderedOutput;
use xyzzy_protocol::Output;

const STATUS_RULE_WIDTH: usize = 40;

const HELP: &str = "\
Anything you type is sent to the game as a line of input.
Meta commands start with `!`:
  !char [c]   send a single keypress (a space when omitted)
  !help       show this help
  !quit       end the session
";

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Line(String),
    Char(char),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_console_line(line: &str) -> ConsoleCommand {
    let line = line.trim_end_matches(['\n', '\r']);
    let Some(meta) = line.strip_prefix('!') else {
        return ConsoleCommand::Line(line.to_string());
    };

    let meta = meta.trim();
    let (command, argument) = match meta.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (meta, ""),
    };
    match command {
        "quit" | "q" => ConsoleCommand::Quit,
        "help" | "?" => ConsoleCommand::Help,
        "char" => ConsoleCommand::Char(argument.chars().next().unwrap_or(' ')),
        _ => ConsoleCommand::Unknown(command.to_string()),
    }
}

/// How a console session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The interpreter closed its output.
    GameOver,
    Quit,
    InputClosed,
}

/// Relays console input to the interpreter and prints every frame until the game ends or the
/// player quits. The interpreter is killed before returning.
pub async fn run_console<R, W>(
    interpreter: &Interpreter,
    mut output_rx: mpsc::Receiver<Output>,
    formatter: Formatter,
    input: R,
    out: &mut W,
) -> anyhow::Result<SessionEnd>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    debug!(
        program = interpreter.program(),
        pid = interpreter.pid(),
        "console attached to interpreter"
    );
    let mut lines = input.lines();
    let end = loop {
        tokio::select! {
            output = output_rx.recv() => {
                let Some(output) = output else {
                    writeln!(out, "\n*** The game has ended. ***")?;
                    break SessionEnd::GameOver;
                };
                trace!(frame = %formatter.debug_dump(&output), "received output");
                write_rendered(out, &formatter.render(&output))?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read console input")? else {
                    break SessionEnd::InputClosed;
                };
                let sent = match parse_console_line(&line) {
                    ConsoleCommand::Quit => break SessionEnd::Quit,
                    ConsoleCommand::Help => {
                        write!(out, "{HELP}")?;
                        continue;
                    }
                    ConsoleCommand::Unknown(command) => {
                        writeln!(out, "Unknown command `!{command}`; try `!help`.")?;
                        continue;
                    }
                    ConsoleCommand::Line(text) => interpreter.send_line(&text).await,
                    ConsoleCommand::Char(ch) => interpreter.send_char(ch).await,
                };
                match sent {
                    Ok(()) => {}
                    Err(SendError::NotRunning(state)) => {
                        debug!(%state, "input before the game was ready");
                        writeln!(out, "(The game is not ready for input yet.)")?;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to send input");
                        writeln!(out, "(Could not reach the game: {err})")?;
                    }
                }
            }
        }
        out.flush()?;
    };
    out.flush()?;

    interpreter.kill().await;
    Ok(end)
}

fn write_rendered<W: Write>(out: &mut W, rendered: &RenderedOutput) -> std::io::Result<()> {
    if !rendered.body.is_empty() {
        writeln!(out, "{}", rendered.body)?;
    }
    if !rendered.status.is_empty() {
        writeln!(out, "{}", "-".repeat(STATUS_RULE_WIDTH))?;
        writeln!(out, "{}", rendered.status)?;
    }
    Ok(())
}
