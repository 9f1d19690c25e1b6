use std::io;
use std::thread;

use crossbeam_channel::{Receiver, bounded, select};

use super::{AnchorId, AnchorLink};
use crate::constants::ANCHOR_COUNT;
use crate::error::{LocatorError, Result};
use crate::shutdown::Shutdown;

type LineEvent = io::Result<Option<Vec<u8>>>;

/// One blocking reader thread per anchor, joined once per pipeline iteration
///
/// Reads on the three links overlap, but [`AnchorReaders::next_lines`] still
/// waits for a line from every anchor, so the iteration rate follows the
/// slowest-reporting anchor. Each reader holds at most one line ahead.
///
/// Reader threads stop retrying timed-out reads once shutdown fires or the
/// `AnchorReaders` is dropped, and release their link on exit.
pub struct AnchorReaders {
    rxs: [Receiver<LineEvent>; ANCHOR_COUNT],
    stop: Shutdown,
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl AnchorReaders {
    pub fn spawn<L: AnchorLink + 'static>(
        links: [L; ANCHOR_COUNT],
        shutdown: &Shutdown,
    ) -> Result<Self> {
        let stop = Shutdown::new();
        let mut rxs = Vec::with_capacity(ANCHOR_COUNT);

        for (anchor, mut link) in AnchorId::ALL.into_iter().zip(links) {
            let (tx, rx) = bounded::<LineEvent>(1);
            let shutdown = shutdown.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name(format!("anchor-{}", anchor))
                .spawn(move || {
                    while !shutdown.is_triggered() && !stop.is_triggered() {
                        let event = match link.read_line() {
                            Err(e) if is_retryable(&e) => continue,
                            event => event,
                        };
                        let last = !matches!(event, Ok(Some(_)));
                        // Receiver gone: the pipeline has stopped
                        if tx.send(event).is_err() || last {
                            break;
                        }
                    }
                    log::debug!("Reader for {} exiting", anchor);
                })
                .map_err(|source| LocatorError::Transport { anchor, source })?;
            rxs.push(rx);
        }

        let rxs: [Receiver<LineEvent>; ANCHOR_COUNT] = rxs
            .try_into()
            .map_err(|_| LocatorError::Config("reader count mismatch".to_string()))?;
        Ok(Self { rxs, stop })
    }

    /// Wait for one line from each anchor, in anchor order
    ///
    /// Returns `Ok(None)` when shutdown fires while waiting. A transport
    /// error or end of stream on any anchor is fatal.
    pub fn next_lines(&self, shutdown: &Shutdown) -> Result<Option<[Vec<u8>; ANCHOR_COUNT]>> {
        let mut lines: [Vec<u8>; ANCHOR_COUNT] = Default::default();

        for (anchor, rx) in AnchorId::ALL.into_iter().zip(&self.rxs) {
            select! {
                recv(rx) -> event => {
                    lines[anchor.index()] = match event {
                        Ok(Ok(Some(line))) => line,
                        // Reader threads end on shutdown; that is not a closed link
                        Err(_) if shutdown.is_triggered() => return Ok(None),
                        Ok(Ok(None)) | Err(_) => return Err(LocatorError::LinkClosed { anchor }),
                        Ok(Err(source)) => return Err(LocatorError::Transport { anchor, source }),
                    };
                }
                recv(shutdown.receiver()) -> _ => return Ok(None),
            }
        }

        Ok(Some(lines))
    }
}

impl Drop for AnchorReaders {
    fn drop(&mut self) {
        self.stop.trigger();
    }
}
