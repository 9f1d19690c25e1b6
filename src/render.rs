//! Periodic consumer of the shared estimate.
//!
//! Wakes on a fixed tick, reads whatever snapshot is current and writes one
//! formatted line. It never waits on the producer and may skip or repeat
//! snapshots.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, tick};

use crate::config::Viewport;
use crate::output::{EstimateOutput, Formatter};
use crate::shutdown::Shutdown;
use crate::state::EstimateReader;

pub struct Renderer {
    reader: EstimateReader,
    formatter: Box<dyn Formatter>,
    viewport: Option<Viewport>,
    interval: Duration,
}

impl Renderer {
    pub fn new(
        reader: EstimateReader,
        formatter: Box<dyn Formatter>,
        viewport: Option<Viewport>,
        interval: Duration,
    ) -> Self {
        Self {
            reader,
            formatter,
            viewport,
            interval,
        }
    }

    /// Format the current snapshot without waiting for a tick
    pub fn render_once(&self) -> String {
        let snapshot = self.reader.latest();
        let output = EstimateOutput::from_snapshot(snapshot.as_deref(), self.viewport.as_ref());
        self.formatter.format(&output)
    }

    /// Write one line per tick until shutdown; returns the number of ticks
    pub fn run<W: Write>(&self, out: &mut W, shutdown: &Shutdown) -> io::Result<u64> {
        let ticker = tick(self.interval);
        let mut ticks = 0u64;

        if let Some(header) = self.formatter.header() {
            writeln!(out, "{}", header)?;
        }

        loop {
            select! {
                recv(ticker) -> _ => {
                    writeln!(out, "{}", self.render_once())?;
                    out.flush()?;
                    ticks += 1;
                }
                recv(shutdown.receiver()) -> _ => break,
            }
        }

        log::debug!("Renderer stopped after {} ticks", ticks);
        Ok(ticks)
    }

    /// Run on a dedicated thread writing to stdout
    pub fn spawn(self, shutdown: Shutdown) -> io::Result<thread::JoinHandle<io::Result<u64>>> {
        thread::Builder::new()
            .name("renderer".to_string())
            .spawn(move || self.run(&mut io::stdout().lock(), &shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CsvFormatter, TextFormatter};
    use crate::state::estimate_channel;

    #[test]
    fn test_render_before_first_estimate() {
        let (_publisher, reader) = estimate_channel();
        let renderer = Renderer::new(
            reader,
            Box::new(TextFormatter::new(false)),
            None,
            Duration::from_millis(5),
        );
        assert!(renderer.render_once().contains("unavailable"));
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (_publisher, reader) = estimate_channel();
        let renderer = Renderer::new(reader, Box::new(CsvFormatter), None, Duration::from_millis(5));
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            remote.trigger();
        });

        let mut out = Vec::new();
        let ticks = renderer.run(&mut out, &shutdown).unwrap();
        stopper.join().unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("ts,"));
        assert_eq!(lines.len() as u64, ticks + 1);
        assert!(ticks >= 1);
    }
}
