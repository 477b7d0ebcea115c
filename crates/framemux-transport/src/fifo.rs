use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

/// A filesystem FIFO used as a producer or command source.
///
/// The pipe is opened read-write and non-blocking. Holding a write reference
/// ourselves means the read side never reports end-of-stream when the last
/// external writer goes away, so an idle producer does not make `poll(2)`
/// spin on hang-up.
pub struct NamedPipe {
    path: PathBuf,
    name: String,
    file: Option<File>,
    /// Whether a missing path is created with `mkfifo(3)` before opening.
    create: bool,
    mode: u32,
}

impl NamedPipe {
    /// Default permission mode for created FIFOs (any local writer may feed frames).
    pub const DEFAULT_FIFO_MODE: u32 = 0o666;

    /// A source at `path` that is created on first open if missing.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            file: None,
            create: true,
            mode: Self::DEFAULT_FIFO_MODE,
        }
    }

    /// Wait for an external party to create the FIFO instead of creating it.
    pub fn without_create(mut self) -> Self {
        self.create = false;
        self
    }

    /// Override the mode used when creating the FIFO.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// The path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a FIFO at `path` unless something already exists there.
    pub fn ensure_fifo(path: &Path, mode: u32) -> Result<()> {
        if std::fs::symlink_metadata(path).is_ok() {
            return Ok(());
        }

        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            TransportError::InvalidPath {
                path: path.to_path_buf(),
            }
        })?;

        // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            // Another process may have created it between the check and the call.
            if err.kind() != std::io::ErrorKind::AlreadyExists {
                return Err(TransportError::Create {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        }

        debug!(?path, "created fifo");
        Ok(())
    }

    /// Whether `path` currently names a FIFO.
    pub fn is_fifo(path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.file_type().is_fifo())
            .unwrap_or(false)
    }

    /// Open the write end of an existing FIFO without blocking.
    ///
    /// Fails with [`TransportError::NoReader`] when no process holds the
    /// read end.
    pub fn open_writer(path: impl AsRef<Path>) -> Result<File> {
        let path = path.as_ref();
        OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| match e.raw_os_error() {
                Some(libc::ENXIO) => TransportError::NoReader {
                    path: path.to_path_buf(),
                },
                _ => TransportError::Open {
                    path: path.to_path_buf(),
                    source: e,
                },
            })
    }
}

impl ByteSource for NamedPipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&mut self) -> Result<bool> {
        if self.file.is_some() {
            return Ok(true);
        }

        if self.create {
            Self::ensure_fifo(&self.path, self.mode)?;
        }

        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path);

        match opened {
            Ok(file) => {
                // A regular file would poll readable forever and hit EOF on
                // every drain.
                let is_fifo = file
                    .metadata()
                    .map(|m| m.file_type().is_fifo())
                    .map_err(|source| TransportError::Open {
                        path: self.path.clone(),
                        source,
                    })?;
                if !is_fifo {
                    return Err(TransportError::NotFifo {
                        path: self.path.clone(),
                    });
                }
                info!(path = ?self.path, "opened source");
                self.file = Some(file);
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(TransportError::Open {
                path: self.path.clone(),
                source: err,
            }),
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn poll_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "closed source");
        }
    }
}

impl Read for NamedPipe {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.file {
            Some(file) => file.read(buf),
            None => Err(std::io::Error::from(std::io::ErrorKind::NotConnected)),
        }
    }
}

impl std::fmt::Debug for NamedPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedPipe")
            .field("path", &self.path)
            .field("open", &self.file.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Write};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("framemux-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn ensure_open_creates_fifo_and_reads_written_bytes() {
        let dir = temp_dir("fifo-read");
        let path = dir.join("in-0.fifo");

        let mut pipe = NamedPipe::new(&path);
        assert!(pipe.ensure_open().unwrap());
        assert!(NamedPipe::is_fifo(&path));
        assert!(pipe.poll_fd().is_some());

        let mut writer = NamedPipe::open_writer(&path).unwrap();
        writer.write_all(b"frame-bytes").unwrap();

        let mut buf = [0u8; 32];
        let n = pipe.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"frame-bytes");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_fifo_reports_would_block() {
        let dir = temp_dir("fifo-empty");
        let mut pipe = NamedPipe::new(dir.join("empty.fifo"));
        assert!(pipe.ensure_open().unwrap());

        let mut buf = [0u8; 8];
        let err = pipe.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_path_without_create_is_not_available() {
        let dir = temp_dir("fifo-missing");
        let mut pipe = NamedPipe::new(dir.join("absent.fifo")).without_create();

        assert!(!pipe.ensure_open().unwrap());
        assert!(!pipe.is_open());
        assert!(pipe.poll_fd().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_parent_directory_is_a_create_error() {
        let mut pipe = NamedPipe::new("/nonexistent-framemux-dir/in.fifo");
        let err = pipe.ensure_open().unwrap_err();
        assert!(matches!(err, TransportError::Create { .. }));
    }

    #[test]
    fn close_then_reopen() {
        let dir = temp_dir("fifo-reopen");
        let mut pipe = NamedPipe::new(dir.join("reopen.fifo"));
        assert!(pipe.ensure_open().unwrap());

        pipe.close();
        assert!(!pipe.is_open());
        let mut buf = [0u8; 4];
        assert_eq!(
            pipe.read(&mut buf).unwrap_err().kind(),
            ErrorKind::NotConnected
        );

        assert!(pipe.ensure_open().unwrap());
        assert!(pipe.is_open());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_writer_without_reader_fails() {
        let dir = temp_dir("fifo-noreader");
        let path = dir.join("ctl.fifo");
        NamedPipe::ensure_fifo(&path, NamedPipe::DEFAULT_FIFO_MODE).unwrap();

        let err = NamedPipe::open_writer(&path).unwrap_err();
        assert!(matches!(err, TransportError::NoReader { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn regular_file_is_not_opened_as_source() {
        let dir = temp_dir("fifo-regular");
        let path = dir.join("in-0.fifo");
        std::fs::write(&path, [0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]).unwrap();

        let mut pipe = NamedPipe::new(&path);
        for _ in 0..3 {
            let err = pipe.ensure_open().unwrap_err();
            assert!(matches!(err, TransportError::NotFifo { .. }));
            assert!(!pipe.is_open());
            assert!(pipe.poll_fd().is_none());
        }
        assert_eq!(
            std::fs::read(&path).unwrap(),
            [0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_fifo_leaves_existing_file_alone() {
        let dir = temp_dir("fifo-existing");
        let path = dir.join("regular");
        std::fs::write(&path, b"data").unwrap();

        NamedPipe::ensure_fifo(&path, NamedPipe::DEFAULT_FIFO_MODE).unwrap();
        assert!(!NamedPipe::is_fifo(&path));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
