//! Speech collaborators: where utterances come from and where replies go.
//!
//! Recognition and synthesis engines are outside this crate. The console
//! implementations read typed lines and print replies, and
//! [`CommandSpeaker`] hands replies to an external TTS program such as
//! `espeak` or `say`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::error::{SpeechError, SpeechResult};

/// Source of user utterances.
pub trait SpeechInput {
    /// Block until an utterance is available. `Ok(None)` means nothing
    /// usable was heard and the cycle should be skipped.
    fn listen(&mut self) -> SpeechResult<Option<String>>;
}

/// Sink for assistant replies.
pub trait SpeechOutput {
    fn speak(&mut self, text: &str) -> SpeechResult<()>;
}

/// How often a waiting listener checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads one utterance per line from a buffered reader (stdin by default).
///
/// Lines are read on a background thread so that [`SpeechInput::listen`]
/// can return as soon as the shutdown flag is raised, even while the
/// reader is blocked. End of input raises the flag.
pub struct ConsoleListener {
    lines: Receiver<std::io::Result<String>>,
    prompt: bool,
    shutdown: Arc<AtomicBool>,
}

impl ConsoleListener {
    pub fn stdin(shutdown: Arc<AtomicBool>) -> SpeechResult<Self> {
        let mut listener = Self::new(BufReader::new(std::io::stdin()), shutdown)?;
        listener.prompt = true;
        Ok(listener)
    }

    pub fn new<R>(reader: R, shutdown: Arc<AtomicBool>) -> SpeechResult<Self>
    where
        R: BufRead + Send + 'static,
    {
        Ok(Self {
            lines: spawn_line_reader(reader)?,
            prompt: false,
            shutdown,
        })
    }
}

fn spawn_line_reader<R>(mut reader: R) -> SpeechResult<Receiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("voxa-input".into())
        .spawn(move || {
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })
        .map_err(|e| SpeechError::Input {
            message: format!("cannot start input thread: {e}"),
        })?;
    Ok(rx)
}

impl SpeechInput for ConsoleListener {
    fn listen(&mut self) -> SpeechResult<Option<String>> {
        if self.prompt {
            print!("you> ");
            std::io::stdout().flush().map_err(|e| SpeechError::Output {
                message: e.to_string(),
            })?;
        }

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match self.lines.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => {
                    let line = line.trim();
                    return Ok((!line.is_empty()).then(|| line.to_string()));
                }
                Ok(Err(e)) => {
                    return Err(SpeechError::Input {
                        message: e.to_string(),
                    });
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("end of input, requesting shutdown");
                    self.shutdown.store(true, Ordering::SeqCst);
                    return Ok(None);
                }
            }
        }
    }
}

/// Prints replies to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSpeaker;

impl SpeechOutput for ConsoleSpeaker {
    fn speak(&mut self, text: &str) -> SpeechResult<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "voxa> {text}").map_err(|e| SpeechError::Output {
            message: e.to_string(),
        })
    }
}

/// Prints replies and also speaks them through an external program.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Parse a command line such as `"espeak -s 180"`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl SpeechOutput for CommandSpeaker {
    fn speak(&mut self, text: &str) -> SpeechResult<()> {
        ConsoleSpeaker.speak(text)?;
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SpeechError::Output {
                message: format!("{}: {e}", self.program),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Output {
                message: format!("{} exited with {status}", self.program),
            })
        }
    }
}

/// Pick the output for an optional configured TTS command.
pub fn speaker_for(say_command: Option<&str>) -> Box<dyn SpeechOutput> {
    match say_command.and_then(CommandSpeaker::from_command_line) {
        Some(speaker) => Box::new(speaker),
        None => Box::new(ConsoleSpeaker),
    }
}
