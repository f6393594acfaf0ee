//! Line-oriented output sinks shared by the console, executor and shell.

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

/// A cloneable handle to a text sink.
///
/// Write failures are dropped: a broken terminal must not take the session down.
#[derive(Clone)]
pub struct Output {
    sink: Rc<RefCell<Box<dyn Write>>>,
}

impl Output {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            sink: Rc::new(RefCell::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// An in-memory sink plus a handle for reading back what was written
    pub fn capture() -> (Self, Captured) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let writer = MemWriter {
            buffer: Rc::clone(&buffer),
        };
        (Self::new(writer), Captured { buffer })
    }

    /// Write text as-is (prompts, partial lines)
    pub fn write_str(&self, text: &str) {
        let mut sink = self.sink.borrow_mut();
        let _ = sink.write_all(text.as_bytes());
        let _ = sink.flush();
    }

    /// Write text followed by a newline
    pub fn line(&self, text: impl AsRef<str>) {
        let mut sink = self.sink.borrow_mut();
        let _ = sink.write_all(text.as_ref().as_bytes());
        let _ = sink.write_all(b"\n");
        let _ = sink.flush();
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Output")
    }
}

/// Output and error streams travelling together.
///
/// Clones share one count of reported failures, so a failure reported by the
/// resolver counts the same as one reported by the console.
#[derive(Clone, Debug)]
pub struct Streams {
    pub out: Output,
    pub err: Output,
    reported: Rc<Cell<usize>>,
}

impl Streams {
    pub fn new(out: Output, err: Output) -> Self {
        Self {
            out,
            err,
            reported: Rc::new(Cell::new(0)),
        }
    }

    /// Write a failure to the error stream and count it
    pub fn report(&self, text: impl AsRef<str>) {
        self.reported.set(self.reported.get() + 1);
        self.err.line(text);
    }

    /// How many failures have been reported through any clone
    pub fn reported(&self) -> usize {
        self.reported.get()
    }

    pub fn stdio() -> Self {
        Self::new(Output::stdout(), Output::stderr())
    }
}

struct MemWriter {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of [`Output::capture`]
#[derive(Clone)]
pub struct Captured {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }
}
