//! Host interface for the file and console builtins.
use std::{
    borrow::Cow,
    collections::HashMap,
    fs::File,
    io::{self, Read, Write},
};

use log::{debug, warn};

use crate::constants::{Word, FIRST_FD};

/// Hooks that provide files and console output to the virtual machine.
///
/// Descriptors and return values follow the C conventions: failures
/// return -1 and descriptor 0 is standard input.
pub trait Host {
    /// Open the file at `path` for reading.
    fn open(&mut self, path: &str, flags: Word) -> Word;

    /// Read up to `buf.len()` bytes. Returns the count read, 0 at end of file.
    fn read(&mut self, fd: Word, buf: &mut [u8]) -> Word;

    fn close(&mut self, fd: Word) -> Word;

    /// Write formatted program output to the console.
    fn print(&mut self, bytes: &[u8]);
}

/// Host backed by the real file system and standard streams.
pub struct StdHost {
    files: HashMap<Word, File>,
    next_fd: Word,
}

impl StdHost {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_fd: FIRST_FD,
        }
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for StdHost {
    fn open(&mut self, path: &str, _flags: Word) -> Word {
        match File::open(path) {
            Ok(file) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, file);
                debug!("open {path:?} as fd {fd}");
                fd
            }
            Err(err) => {
                debug!("open {path:?} failed: {err}");
                -1
            }
        }
    }

    fn read(&mut self, fd: Word, buf: &mut [u8]) -> Word {
        let result = match fd {
            0 => io::stdin().read(buf),
            _ => match self.files.get_mut(&fd) {
                Some(file) => file.read(buf),
                None => return -1,
            },
        };

        match result {
            Ok(count) => count as Word,
            Err(err) => {
                debug!("read fd {fd} failed: {err}");
                -1
            }
        }
    }

    fn close(&mut self, fd: Word) -> Word {
        match self.files.remove(&fd) {
            Some(_) => 0,
            None => -1,
        }
    }

    fn print(&mut self, bytes: &[u8]) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            warn!("failed to write program output: {err}");
        }
    }
}

/// In-memory host that captures output, for tests and embedding.
#[derive(Default)]
pub struct BufferHost {
    output: Vec<u8>,
    stdin: Vec<u8>,
    stdin_pos: usize,
    /// File contents by path.
    files: HashMap<String, Vec<u8>>,
    /// Open descriptors, mapped to the path and read position.
    open: HashMap<Word, (String, usize)>,
    next_fd: Word,
}

impl BufferHost {
    pub fn new() -> Self {
        Self {
            next_fd: FIRST_FD,
            ..Default::default()
        }
    }

    /// Make a file available to `open`.
    pub fn with_file(mut self, path: impl ToString, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), contents.into());
        self
    }

    /// Bytes returned by reads from descriptor 0.
    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = input.into();
        self.stdin_pos = 0;
        self
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Number of descriptors that were opened and not closed.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

fn read_from(source: &[u8], pos: &mut usize, buf: &mut [u8]) -> Word {
    let rest = source.get(*pos..).unwrap_or_default();
    let count = rest.len().min(buf.len());
    buf[..count].copy_from_slice(&rest[..count]);
    *pos += count;
    count as Word
}

impl Host for BufferHost {
    fn open(&mut self, path: &str, _flags: Word) -> Word {
        if !self.files.contains_key(path) {
            return -1;
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.open.insert(fd, (path.to_string(), 0));
        fd
    }

    fn read(&mut self, fd: Word, buf: &mut [u8]) -> Word {
        if fd == 0 {
            return read_from(&self.stdin, &mut self.stdin_pos, buf);
        }

        match self.open.get_mut(&fd) {
            Some((path, pos)) => match self.files.get(path.as_str()) {
                Some(contents) => read_from(contents, pos, buf),
                None => -1,
            },
            None => -1,
        }
    }

    fn close(&mut self, fd: Word) -> Word {
        match self.open.remove(&fd) {
            Some(_) => 0,
            None => -1,
        }
    }

    fn print(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }
}
