//! Blocking execution of external tools with a deadline.
//!
//! stdout and stderr are drained on reader threads so a chatty tool cannot
//! fill a pipe and stall while the caller waits on it.

use crossbeam_channel::{bounded, Receiver};
use log::debug;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

enum Stream {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Run `command`, feeding it `input` on stdin, and return its stdout.
///
/// Anything written to stderr, a non-zero exit status, or running past
/// `timeout` is an error; the tool is never retried.
pub fn run_tool(
    tool: &'static str,
    mut command: Command,
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    debug!("Running {:?}", command);

    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| Error::Engine {
        tool,
        message: format!("could not start: {}", e),
    })?;

    let writer = match (input, child.stdin.take()) {
        (Some(bytes), Some(mut stdin)) => Some(thread::spawn(move || {
            // A tool that exits early closes its stdin; its exit status reports why.
            let _ = stdin.write_all(&bytes);
        })),
        _ => None,
    };

    let (tx, rx) = bounded(2);
    if let Some(mut out) = child.stdout.take() {
        let tx = tx.clone();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            let _ = tx.send(Stream::Stdout(buf));
        });
    }
    if let Some(mut err) = child.stderr.take() {
        let tx = tx.clone();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            let _ = tx.send(Stream::Stderr(buf));
        });
    }
    drop(tx);

    let status = wait(tool, &mut child, timeout)?;
    if let Some(handle) = writer {
        let _ = handle.join();
    }
    let (stdout, stderr) = collect(rx);

    let diagnostic = String::from_utf8_lossy(&stderr);
    if !diagnostic.trim().is_empty() {
        return Err(Error::Engine {
            tool,
            message: diagnostic.trim().to_string(),
        });
    }
    if !status.success() {
        return Err(Error::Engine {
            tool,
            message: format!("exited with {}", status),
        });
    }

    Ok(stdout)
}

fn wait(tool: &'static str, child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus> {
    let limit = match timeout {
        Some(limit) => limit,
        None => return Ok(child.wait()?),
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout { tool, limit });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn collect(rx: Receiver<Stream>) -> (Vec<u8>, Vec<u8>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for stream in rx {
        match stream {
            Stream::Stdout(buf) => stdout = buf,
            Stream::Stderr(buf) => stderr = buf,
        }
    }
    (stdout, stderr)
}
