// Process supervision for the external tool
//
// One child per download. stdout and stderr are pumped by their own tasks
// into a single channel; a waiter task reaps the child after both streams
// hit EOF and sends the final `Exit` event.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, oneshot};

use super::errors::DownloadError;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One item of the supervised output sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Line { stream: StreamKind, text: String },
    /// Always last. `None` when the process was killed by a signal.
    Exit { code: Option<i32> },
}

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// yt-dlp redraws its progress bar with carriage returns when stdout is not
/// a terminal, and pipe reads can end anywhere (even inside a UTF-8 char).
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    /// Feed a chunk, get back every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Whatever is left after EOF
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Termination primitive for a running child.
///
/// Nothing in the pipeline calls `terminate` on its own; when to stop a
/// download is the caller's decision.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    pub(crate) fn new(pid: Option<u32>, kill_tx: oneshot::Sender<()>) -> Self {
        Self {
            pid,
            kill_tx: Some(kill_tx),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the waiter to kill the child. Returns false if already requested
    /// or the process is gone.
    pub fn terminate(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// A started process: its handle plus the lazy event sequence
#[derive(Debug)]
pub struct SupervisedProcess {
    handle: ProcessHandle,
    events: mpsc::Receiver<OutputEvent>,
}

impl SupervisedProcess {
    pub(crate) fn from_parts(handle: ProcessHandle, events: mpsc::Receiver<OutputEvent>) -> Self {
        Self { handle, events }
    }

    /// Next line or the final exit; `None` after `Exit` has been delivered
    pub async fn next_event(&mut self) -> Option<OutputEvent> {
        self.events.recv().await
    }

    pub fn handle_mut(&mut self) -> &mut ProcessHandle {
        &mut self.handle
    }

    pub fn into_parts(self) -> (ProcessHandle, mpsc::Receiver<OutputEvent>) {
        (self.handle, self.events)
    }
}

/// Start `program` with `args` and supervise it.
///
/// Must be called from within a Tokio runtime. Fails immediately (no retry)
/// when the OS cannot start the executable.
pub fn spawn(program: &Path, args: &[String]) -> Result<SupervisedProcess, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::SpawnFailure {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;

    let pid = child.id();
    log::debug!("[Supervisor] Started {} (pid {:?})", program.display(), pid);

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

    let stdout_task = child
        .stdout
        .take()
        .map(|out| tokio::spawn(pump(out, StreamKind::Stdout, tx.clone())));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(pump(err, StreamKind::Stderr, tx.clone())));

    let program_name = program.display().to_string();
    tokio::spawn(async move {
        let drain = async move {
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
        };
        tokio::pin!(drain);

        let killed = tokio::select! {
            _ = &mut drain => false,
            Ok(()) = &mut kill_rx => true,
        };

        if killed {
            log::warn!("[Supervisor] Terminating {} (pid {:?})", program_name, pid);
            if let Err(e) = child.start_kill() {
                log::warn!("[Supervisor] Kill failed: {}", e);
            }
            (&mut drain).await;
        }

        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                log::error!("[Supervisor] Failed to wait for {}: {}", program_name, e);
                None
            }
        };
        log::debug!("[Supervisor] {} exited with {:?}", program_name, code);
        let _ = tx.send(OutputEvent::Exit { code }).await;
    });

    Ok(SupervisedProcess::from_parts(ProcessHandle::new(pid, kill_tx), rx))
}

async fn pump<R>(mut reader: R, stream: StreamKind, tx: mpsc::Sender<OutputEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut assembler = LineAssembler::default();
    let mut buf = [0u8; 4096];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::warn!("[Supervisor] Failed to read {:?}: {}", stream, e);
                break;
            }
        };
        // keep draining even if nobody listens, or the child blocks on a full pipe
        for text in assembler.push(&buf[..n]) {
            let _ = tx.send(OutputEvent::Line { stream, text }).await;
        }
    }

    if let Some(text) = assembler.finish() {
        let _ = tx.send(OutputEvent::Line { stream, text }).await;
    }
}
