//! Host I/O handles used by the `print`, `println` and `readln` built-ins.

use std::io::{self, BufRead, Write as _};

/// Trait for handling output from the `print`/`println` built-ins.
///
/// Implement this to capture or redirect output from interpreted code. The
/// default implementation [`StdPrint`] writes to stdout.
pub trait PrintWriter {
    /// Called once for each rendered argument, without separators.
    fn stdout_write(&mut self, output: &str);

    /// Adds a single separator or terminator character.
    fn stdout_push(&mut self, end: char);
}

/// Default writer: line-buffered stdout.
#[derive(Debug, Default)]
pub struct StdPrint {
    buffer: String,
}

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: &str) {
        self.buffer.push_str(output);
    }

    fn stdout_push(&mut self, end: char) {
        self.buffer.push(end);
        if end == '\n' {
            let _ = io::stdout().write_all(self.buffer.as_bytes());
            let _ = io::stdout().flush();
            self.buffer.clear();
        }
    }
}

impl Drop for StdPrint {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let _ = io::stdout().write_all(self.buffer.as_bytes());
            let _ = io::stdout().flush();
        }
    }
}

/// Writer that collects all output into a shared string, for tests and
/// programmatic capture.
///
/// The buffer is `Rc`-shared: clone the writer before handing it to the
/// interpreter, then read [`Self::output`] from the clone afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectStringPrint {
    buffer: std::rc::Rc<std::cell::RefCell<String>>,
}

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected output so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.buffer.borrow().clone()
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: &str) {
        self.buffer.borrow_mut().push_str(output);
    }

    fn stdout_push(&mut self, end: char) {
        self.buffer.borrow_mut().push(end);
    }
}

/// Writer that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: &str) {}

    fn stdout_push(&mut self, _end: char) {}
}

/// Input source for the `readln` built-in.
pub trait ReadInput {
    /// Returns the next line without its trailing newline, or `None` at
    /// end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Default input: process stdin.
#[derive(Debug, Default)]
pub struct StdInput;

impl ReadInput for StdInput {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }
}

/// Canned input lines, for tests.
#[derive(Debug, Default)]
pub struct QueueInput {
    lines: Vec<String>,
}

impl QueueInput {
    #[must_use]
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReadInput for QueueInput {
    fn read_line(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.remove(0))
        }
    }
}

/// Input that is always exhausted.
#[derive(Debug, Default)]
pub struct NoInput;

impl ReadInput for NoInput {
    fn read_line(&mut self) -> Option<String> {
        None
    }
}
