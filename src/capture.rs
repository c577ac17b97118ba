//! Capturing what the interpreter writes to the process standard output.
//!
//! The embedded interpreter prints with `puts` straight to file descriptor 1
//! rather than returning text, so the kernel redirects that descriptor to a
//! scratch file for the length of one evaluation and reads the file back once
//! the original target is restored.
//!
//! A capture window claims descriptor 1 exclusively. Nested windows, or
//! windows opened from two threads at once, are a precondition violation: the
//! inner window would save the outer scratch file as "the original" target.
//! Nothing checks for this at runtime.

use std::io::{Read, Seek, SeekFrom};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to create capture buffer: {0}")]
    Buffer(#[source] std::io::Error),

    #[error("{op} on standard output failed: {source}")]
    Descriptor {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read captured output: {0}")]
    Read(#[source] std::io::Error),
}

/// Output collected during one capture window, plus whatever the work unit returned.
#[derive(Debug)]
pub struct Captured<T> {
    pub text: String,
    pub value: T,
}

/// Runs a unit of work with the process standard output diverted into a buffer.
pub trait OutputCapture {
    /// Run `work`, returning every byte it wrote to standard output as text.
    ///
    /// The work unit's own failure is part of `T`, so partial output written
    /// before the failure is still handed back. `Err` is reserved for failures
    /// of the redirection itself; the original target has been restored by the
    /// time either is returned.
    fn run_capturing_output<T, F>(&mut self, work: F) -> Result<Captured<T>, CaptureError>
    where
        F: FnOnce() -> T;
}

#[cfg(unix)]
pub use self::unix::FdRedirect;

#[cfg(unix)]
pub type PlatformCapture = FdRedirect;

#[cfg(not(unix))]
pub type PlatformCapture = Passthrough;

/// The capture implementation for the platform this kernel was built for
pub fn default_capture() -> PlatformCapture {
    PlatformCapture::default()
}

/// Read the scratch buffer back from the start and decode it.
#[cfg_attr(not(unix), allow(dead_code))]
fn read_back(scratch: &mut std::fs::File) -> Result<String, CaptureError> {
    scratch.seek(SeekFrom::Start(0)).map_err(CaptureError::Read)?;
    let mut bytes = Vec::new();
    scratch.read_to_end(&mut bytes).map_err(CaptureError::Read)?;
    Ok(decode_output(&bytes))
}

/// Decode captured bytes, replacing invalid UTF-8 and folding CRLF to LF.
pub fn decode_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains("\r\n") {
        text.replace("\r\n", "\n")
    } else {
        text.into_owned()
    }
}

#[cfg(unix)]
mod unix {
    use super::{read_back, CaptureError, Captured, OutputCapture};
    use nix::unistd::{close, dup, dup2};
    use std::io::Write;
    use std::os::unix::io::{AsRawFd, RawFd};

    const STDOUT_FD: RawFd = libc::STDOUT_FILENO;

    /// Redirects descriptor 1 to an anonymous temporary file. Writes into the
    /// window never block, however much the script prints.
    #[derive(Debug, Default)]
    pub struct FdRedirect;

    impl OutputCapture for FdRedirect {
        fn run_capturing_output<T, F>(&mut self, work: F) -> Result<Captured<T>, CaptureError>
        where
            F: FnOnce() -> T,
        {
            let mut scratch = tempfile::tempfile().map_err(CaptureError::Buffer)?;

            let window = RedirectGuard::begin(scratch.as_raw_fd())?;
            let value = work();
            window.end()?;

            let text = read_back(&mut scratch)?;
            tracing::debug!(bytes = text.len(), "captured standard output");
            Ok(Captured { text, value })
        }
    }

    /// Holds the saved copy of the original stdout descriptor. Dropping the
    /// guard puts it back, which covers a panic unwinding out of the work unit.
    struct RedirectGuard {
        saved: Option<RawFd>,
    }

    impl RedirectGuard {
        fn begin(target: RawFd) -> Result<Self, CaptureError> {
            let saved = dup(STDOUT_FD).map_err(|e| descriptor_error("dup", e))?;
            flush_stdout();
            if let Err(e) = dup2(target, STDOUT_FD) {
                let _ = close(saved);
                return Err(descriptor_error("dup2", e));
            }
            Ok(Self { saved: Some(saved) })
        }

        fn end(mut self) -> Result<(), CaptureError> {
            self.restore()
        }

        fn restore(&mut self) -> Result<(), CaptureError> {
            let Some(saved) = self.saved.take() else {
                return Ok(());
            };
            flush_stdout();
            let restored = dup2(saved, STDOUT_FD);
            let _ = close(saved);
            restored
                .map(drop)
                .map_err(|e| descriptor_error("restoring dup2", e))
        }
    }

    impl Drop for RedirectGuard {
        fn drop(&mut self) {
            if let Err(e) = self.restore() {
                tracing::error!("failed to restore standard output: {}", e);
            }
        }
    }

    /// Push out bytes pending in Rust's stdout buffer and in every C stdio
    /// stream. `fflush(NULL)` covers the C side without naming the
    /// platform's `stdout` symbol.
    fn flush_stdout() {
        let _ = std::io::stdout().flush();
        // SAFETY: fflush with a null stream flushes all open output streams.
        unsafe {
            libc::fflush(std::ptr::null_mut());
        }
    }

    fn descriptor_error(op: &'static str, errno: nix::errno::Errno) -> CaptureError {
        CaptureError::Descriptor {
            op,
            source: std::io::Error::from(errno),
        }
    }
}

/// Fallback for platforms without descriptor redirection: runs the work
/// uncaptured, so interpreter output goes to the real console.
#[cfg(not(unix))]
#[derive(Debug, Default)]
pub struct Passthrough;

#[cfg(not(unix))]
impl OutputCapture for Passthrough {
    fn run_capturing_output<T, F>(&mut self, work: F) -> Result<Captured<T>, CaptureError>
    where
        F: FnOnce() -> T,
    {
        static WARN_ONCE: std::sync::Once = std::sync::Once::new();
        WARN_ONCE.call_once(|| {
            tracing::warn!("stdout capture is not supported on this platform; interpreter output will not reach the notebook");
        });
        Ok(Captured {
            text: String::new(),
            value: work(),
        })
    }
}
