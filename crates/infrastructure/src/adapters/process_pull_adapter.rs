//! Pull process adapter - Runs the model download command as a child process

use std::process::Stdio;

use application::{
    error::ApplicationError,
    ports::{ProcessExit, PullProcess, PullProcessPort},
};
use async_trait::async_trait;
use domain::ModelName;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, instrument, warn};

const LINE_BUFFER: usize = 256;
const READ_CHUNK: usize = 4096;
/// Longest unterminated output forwarded as a single line
const MAX_LINE: usize = 16 * 1024;

/// Launches `<command...> <model>` with stdout and stderr merged into lines
#[derive(Debug, Clone)]
pub struct ProcessPullAdapter {
    command: Vec<String>,
}

impl ProcessPullAdapter {
    /// Create an adapter for the given program and leading arguments
    ///
    /// # Errors
    ///
    /// Returns an error if `command` names no program.
    pub fn new(command: Vec<String>) -> Result<Self, ApplicationError> {
        if command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ApplicationError::Configuration(
                "pull command is empty".to_string(),
            ));
        }
        Ok(Self { command })
    }
}

#[async_trait]
impl PullProcessPort for ProcessPullAdapter {
    #[instrument(skip(self), fields(model = %model))]
    async fn spawn(&self, model: &ModelName) -> Result<Box<dyn PullProcess>, ApplicationError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(ApplicationError::Configuration(
                "pull command is empty".to_string(),
            ));
        };

        let mut child = Command::new(program)
            .args(args)
            .arg(model.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ApplicationError::Process(format!("{program}: {e}")))?;

        debug!(pid = ?child.id(), "Pull command started");

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx)));
        }

        Ok(Box::new(ChildPullProcess {
            child,
            lines,
            readers,
        }))
    }
}

/// A running pull command; dropping it kills the child
struct ChildPullProcess {
    child: Child,
    lines: mpsc::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

#[async_trait]
impl PullProcess for ChildPullProcess {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    async fn wait(&mut self) -> Result<ProcessExit, ApplicationError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ApplicationError::Process(e.to_string()))?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}

impl Drop for ChildPullProcess {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

/// Forward output split on `\n` and `\r`, so in-place progress redraws
/// arrive as separate lines. Output that runs past [`MAX_LINE`] without a
/// break is forwarded in pieces.
async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to read pull output");
                break;
            },
        };
        pending.extend_from_slice(&chunk[..read]);

        while let Some(pos) = pending.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]).into_owned();
            if !text.is_empty() && tx.send(text).await.is_err() {
                return;
            }
        }

        if pending.len() >= MAX_LINE {
            let text = String::from_utf8_lossy(&pending).into_owned();
            pending.clear();
            if tx.send(text).await.is_err() {
                return;
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
    }
}
