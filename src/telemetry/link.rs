//! Line-oriented byte streams to the anchors.
//!
//! The estimator never opens or configures a transport itself; it is handed
//! already-open links. [`StreamLink`] adapts any reader/writer pair (files,
//! pipes, in-memory buffers) and [`SerialLink`] wraps a serial port.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

pub trait AnchorLink: Send {
    /// Block until one full line (including its terminator) is available.
    /// `Ok(None)` means the stream has ended.
    ///
    /// An error of kind `TimedOut` or `WouldBlock` means no full line arrived
    /// in time. The link keeps any partial line and the caller may retry.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Drain whatever input has accumulated so far. Used by the handshake,
    /// which looks for tokens anywhere in the received bytes.
    fn read_pending(&mut self) -> io::Result<Vec<u8>>;
}

impl<L: AnchorLink + ?Sized> AnchorLink for Box<L> {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).read_line()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_pending()
    }
}

/// Link over an arbitrary buffered reader and writer
pub struct StreamLink<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead + Send, W: Write + Send> StreamLink<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead + Send> StreamLink<R, io::Sink> {
    /// Receive-only link, e.g. a recorded capture file
    pub fn read_only(reader: R) -> Self {
        Self::new(reader, io::sink())
    }
}

impl<R: BufRead + Send, W: Write + Send> AnchorLink for StreamLink<R, W> {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Takes the next buffered chunk. Blocks until the underlying reader
    /// yields data or reaches end of stream.
    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        let chunk = self.reader.fill_buf()?.to_vec();
        self.reader.consume(chunk.len());
        Ok(chunk)
    }
}

/// Link over an open serial port
///
/// Reads go through a cloned handle so writes for the handshake never
/// contend with a blocked reader.
pub struct SerialLink {
    name: String,
    reader: BufReader<Box<dyn SerialPort>>,
    writer: Box<dyn SerialPort>,
    /// Bytes of a line interrupted by a read timeout
    partial: Vec<u8>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;
        Self::from_port(port)
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> io::Result<Self> {
        let name = port.name().unwrap_or_else(|| "serial".to_string());
        let reader = port.try_clone().map_err(io::Error::from)?;
        log::info!("Opened {} at {} baud", name, port.baud_rate().unwrap_or(0));
        Ok(Self {
            name,
            reader: BufReader::new(reader),
            writer: port,
            partial: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AnchorLink for SerialLink {
    /// Returns `TimedOut` after each port timeout without a full line, so
    /// the reader thread can check for shutdown between attempts.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        // read_until leaves bytes read before a timeout in `partial`
        match self.reader.read_until(b'\n', &mut self.partial)? {
            0 if self.partial.is_empty() => Ok(None),
            _ => Ok(Some(std::mem::take(&mut self.partial))),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        let mut pending = self.reader.buffer().to_vec();
        self.reader.consume(pending.len());

        let waiting = self
            .reader
            .get_mut()
            .bytes_to_read()
            .map_err(io::Error::from)? as usize;
        if waiting > 0 {
            let start = pending.len();
            pending.resize(start + waiting, 0);
            self.reader.get_mut().read_exact(&mut pending[start..])?;
        }
        Ok(pending)
    }
}
