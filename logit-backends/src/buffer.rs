use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use logit_core::LogitResult;

/// Line-oriented writer with an optional byte-threshold buffer.
///
/// With a capacity of zero every line is written and flushed immediately.
/// Otherwise lines accumulate until the pending text reaches the capacity,
/// at which point the whole batch is written in one call.
pub struct WriteBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    writer: Box<dyn Write + Send>,
    pending: String,
}

impl WriteBuffer {
    pub fn new(writer: Box<dyn Write + Send>, capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                writer,
                pending: String::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `line` plus a newline, draining when the threshold is hit.
    pub fn write_line(&self, line: &str) -> LogitResult<()> {
        let mut inner = self.lock();
        if self.capacity == 0 {
            inner.writer.write_all(line.as_bytes())?;
            inner.writer.write_all(b"\n")?;
            inner.writer.flush()?;
            return Ok(());
        }
        inner.pending.push_str(line);
        inner.pending.push('\n');
        if inner.pending.len() >= self.capacity {
            Self::drain(&mut inner)?;
        }
        Ok(())
    }

    /// Writes out any pending text and flushes the underlying writer.
    pub fn flush(&self) -> LogitResult<()> {
        let mut inner = self.lock();
        Self::drain(&mut inner)?;
        inner.writer.flush()?;
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn drain(inner: &mut Inner) -> LogitResult<()> {
        if inner.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut inner.pending);
        inner.writer.write_all(pending.as_bytes())?;
        inner.writer.flush()?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
