#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rssitrack::telemetry::AnchorLink;

/// What a [`ScriptedLink`] does once its scripted lines run out
#[derive(Debug, Clone)]
pub enum Tail {
    Eof,
    Error(io::ErrorKind),
    /// Keep returning the last scripted line, pausing between reads
    Repeat(Duration),
    /// Report a read timeout after each pause, like a quiet serial port
    Silent(Duration),
}

/// In-memory anchor whose input is fixed up front
pub struct ScriptedLink {
    lines: VecDeque<Vec<u8>>,
    last: Option<Vec<u8>>,
    tail: Tail,
    pending: VecDeque<Vec<u8>>,
    reply_after_start: Option<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    released: Arc<AtomicBool>,
}

impl ScriptedLink {
    pub fn new<S: AsRef<str>>(lines: &[S], tail: Tail) -> Self {
        Self {
            lines: lines.iter().map(|l| l.as_ref().as_bytes().to_vec()).collect(),
            last: None,
            tail,
            pending: VecDeque::new(),
            reply_after_start: None,
            written: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A link that reports the same RSSI forever
    pub fn steady(id: u8, rssi: f64, pause: Duration) -> Self {
        Self::new(&[format!("{}|{:.1}\r\n", id, rssi)], Tail::Repeat(pause))
    }

    /// Queue chunks returned by successive `read_pending` calls
    pub fn with_pending<S: AsRef<str>>(mut self, chunks: &[S]) -> Self {
        self.pending
            .extend(chunks.iter().map(|c| c.as_ref().as_bytes().to_vec()));
        self
    }

    /// Answer every write containing "start" with `reply`
    pub fn acking(mut self, reply: &str) -> Self {
        self.reply_after_start = Some(reply.as_bytes().to_vec());
        self
    }

    /// Handle to everything written to the link, usable after it is moved
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    /// Set once the link has been dropped by whoever owned it
    pub fn released(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl Drop for ScriptedLink {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

pub fn written_text(written: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&written.lock().unwrap()).into_owned()
}

impl AnchorLink for ScriptedLink {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.lines.pop_front() {
            self.last = Some(line.clone());
            return Ok(Some(line));
        }
        match &self.tail {
            Tail::Eof => Ok(None),
            Tail::Error(kind) => Err(io::Error::new(*kind, "scripted failure")),
            Tail::Repeat(pause) => {
                thread::sleep(*pause);
                Ok(self.last.clone())
            }
            Tail::Silent(pause) => {
                thread::sleep(*pause);
                Err(io::ErrorKind::TimedOut.into())
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(bytes);
        if let Some(reply) = &self.reply_after_start
            && bytes.windows(5).any(|w| w == b"start")
        {
            self.pending.push_back(reply.clone());
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}
