//! Stream handles and IO wiring
//!
//! The entry point owns stdin/stdout/stderr and lends them to the resolved
//! command through the `*Setter` capabilities before calling it.

use crate::plugin::Plugin;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::trace;

pub type SharedReader = Arc<Mutex<dyn Read + Send>>;
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

// ============================================================================
// IoStreams
// ============================================================================

/// The three standard streams as shared handles
#[derive(Clone)]
pub struct IoStreams {
    pub stdin: SharedReader,
    pub stdout: SharedWriter,
    pub stderr: SharedWriter,
}

impl IoStreams {
    pub fn new(stdin: SharedReader, stdout: SharedWriter, stderr: SharedWriter) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    /// Process stdin/stdout/stderr
    pub fn std() -> Self {
        Self {
            stdin: std_reader(),
            stdout: std_writer(),
            stderr: std_error_writer(),
        }
    }

    /// Empty stdin with stdout and stderr captured in memory
    pub fn captured() -> (Self, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::new();
        let err = CaptureBuffer::new();
        let stdin: SharedReader = Arc::new(Mutex::new(std::io::empty()));
        let streams = Self {
            stdin,
            stdout: out.writer(),
            stderr: err.writer(),
        };
        (streams, out, err)
    }
}

pub fn std_reader() -> SharedReader {
    Arc::new(Mutex::new(std::io::stdin()))
}

pub fn std_writer() -> SharedWriter {
    Arc::new(Mutex::new(std::io::stdout()))
}

pub fn std_error_writer() -> SharedWriter {
    Arc::new(Mutex::new(std::io::stderr()))
}

/// Give `plugin` whichever of the streams it accepts.
///
/// Calling this again simply hands over the same handles.
pub fn wire_io(plugin: &dyn Plugin, streams: &IoStreams) {
    if let Some(setter) = plugin.as_stdin_setter() {
        trace!(plugin = plugin.name(), "Wiring stdin");
        setter.set_stdin(Arc::clone(&streams.stdin));
    }
    if let Some(setter) = plugin.as_stdout_setter() {
        trace!(plugin = plugin.name(), "Wiring stdout");
        setter.set_stdout(Arc::clone(&streams.stdout));
    }
    if let Some(setter) = plugin.as_stderr_setter() {
        trace!(plugin = plugin.name(), "Wiring stderr");
        setter.set_stderr(Arc::clone(&streams.stderr));
    }
}

// ============================================================================
// StreamSlots - per-plugin stream storage
// ============================================================================

/// Streams a plugin has been given, falling back to the process streams.
#[derive(Default)]
pub struct StreamSlots {
    stdin: Mutex<Option<SharedReader>>,
    stdout: Mutex<Option<SharedWriter>>,
    stderr: Mutex<Option<SharedWriter>>,
}

impl StreamSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stdin(&self, r: SharedReader) {
        *self.stdin.lock() = Some(r);
    }

    pub fn set_stdout(&self, w: SharedWriter) {
        *self.stdout.lock() = Some(w);
    }

    pub fn set_stderr(&self, w: SharedWriter) {
        *self.stderr.lock() = Some(w);
    }

    pub fn stdin(&self) -> SharedReader {
        self.stdin.lock().clone().unwrap_or_else(std_reader)
    }

    pub fn stdout(&self) -> SharedWriter {
        self.stdout.lock().clone().unwrap_or_else(std_writer)
    }

    pub fn stderr(&self) -> SharedWriter {
        self.stderr.lock().clone().unwrap_or_else(std_error_writer)
    }
}

// ============================================================================
// CaptureBuffer
// ============================================================================

/// In-memory writer whose contents can be read back
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writer(&self) -> SharedWriter {
        Arc::new(Mutex::new(self.clone()))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
