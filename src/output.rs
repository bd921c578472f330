use std::io::{self, Write};

use serde::Serialize;

/// JSON Lines sink: one object per line, no enclosing array, so a partial
/// dump is still readable line by line.
pub struct JsonlWriter<W: Write> {
    inner: W,
    lines: u64,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, lines: 0 }
    }

    pub fn write_line<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.inner, value).map_err(io::Error::from)?;
        self.inner.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Flushes and returns the sink with the number of lines written.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        self.inner.flush()?;
        Ok((self.inner, self.lines))
    }
}
