//! Per-runner capture of measure console output.
//!
//! Measures write through [`CaptureWriter`]s handed out by the runner.
//! While capture is active the text lands in buffers owned by the
//! [`OutputCapture`]; otherwise it passes straight through to the process
//! streams.

use std::io::{self, Write};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
pub struct OutputCapture {
    active: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    echo_on_release: bool,
}

impl OutputCapture {
    pub fn new(echo_on_release: bool) -> Self {
        Self {
            active: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
            echo_on_release,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_echo_on_release(&mut self, echo: bool) {
        self.echo_on_release = echo;
    }

    /// Begin buffering; false if already capturing
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.stdout.clear();
        self.stderr.clear();
        self.active = true;
        trace!("Output capture started");
        true
    }

    /// Stop capturing and hand back the buffered stdout and stderr text
    pub fn stop(&mut self) -> (String, String) {
        self.active = false;
        let stdout = String::from_utf8_lossy(&std::mem::take(&mut self.stdout)).into_owned();
        let stderr = String::from_utf8_lossy(&std::mem::take(&mut self.stderr)).into_owned();
        trace!(
            "Output capture stopped ({} stdout bytes, {} stderr bytes)",
            stdout.len(),
            stderr.len()
        );
        (stdout, stderr)
    }

    /// Stop capturing, echoing anything buffered to the process streams if configured
    pub fn release(&mut self) {
        if !self.active {
            return;
        }
        let (stdout, stderr) = self.stop();
        if self.echo_on_release {
            // Best effort: the process streams may already be closed
            let _ = io::stdout().write_all(stdout.as_bytes());
            let _ = io::stderr().write_all(stderr.as_bytes());
        }
    }

    pub fn writer(&mut self, stream: Stream) -> CaptureWriter<'_> {
        CaptureWriter {
            capture: self,
            stream,
        }
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Writer routed through an [`OutputCapture`]
pub struct CaptureWriter<'a> {
    capture: &'a mut OutputCapture,
    stream: Stream,
}

impl Write for CaptureWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match (self.capture.active, self.stream) {
            (true, Stream::Stdout) => self.capture.stdout.write(buf),
            (true, Stream::Stderr) => self.capture.stderr.write(buf),
            (false, Stream::Stdout) => io::stdout().write(buf),
            (false, Stream::Stderr) => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match (self.capture.active, self.stream) {
            (true, _) => Ok(()),
            (false, Stream::Stdout) => io::stdout().flush(),
            (false, Stream::Stderr) => io::stderr().flush(),
        }
    }
}
