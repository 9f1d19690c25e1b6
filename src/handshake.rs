//! Bring all three anchors into a streaming state before telemetry is used.
//!
//! In [`HandshakeMode::Command`] the start command is sent to every anchor
//! that has not yet acknowledged, the configured interval is waited out, and
//! the accumulated input of each anchor is searched for the ack token. Rounds
//! repeat until every anchor has acknowledged or `max_attempts` rounds have
//! passed (0 means no limit).
//!
//! [`HandshakeMode::Passive`] sends nothing and waits until each anchor's
//! input contains a telemetry delimiter. The input it drains is live
//! telemetry, so the first line read afterwards is usually the tail of a
//! line and fails to parse; the pipeline treats it like any malformed line.

use crate::config::{HandshakeConfig, HandshakeMode};
use crate::constants::{ANCHOR_COUNT, TELEMETRY_DELIMITER};
use crate::error::{LocatorError, Result};
use crate::shutdown::Shutdown;
use crate::telemetry::{AnchorId, AnchorLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    /// Rounds it took for every anchor to respond
    pub attempts: u32,
}

/// Accumulates one anchor's input and looks for a token in it
struct Inbox {
    token: Vec<u8>,
    buffer: Vec<u8>,
    matched: bool,
}

impl Inbox {
    fn new(token: &[u8]) -> Self {
        Self {
            token: token.to_vec(),
            buffer: Vec::new(),
            matched: false,
        }
    }

    fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.matched {
            return true;
        }
        self.buffer.extend_from_slice(bytes);
        if self.buffer.windows(self.token.len()).any(|w| w == self.token) {
            self.matched = true;
            self.buffer.clear();
        } else {
            // Only a token split across reads can still match
            let keep = self.token.len().saturating_sub(1);
            let drop = self.buffer.len().saturating_sub(keep);
            self.buffer.drain(..drop);
        }
        self.matched
    }
}

pub fn synchronize<L: AnchorLink>(
    links: &mut [L; ANCHOR_COUNT],
    config: &HandshakeConfig,
    shutdown: &Shutdown,
) -> Result<HandshakeReport> {
    let token: &[u8] = match config.mode {
        HandshakeMode::Skip => return Ok(HandshakeReport { attempts: 0 }),
        HandshakeMode::Command => config.ack_token.as_bytes(),
        HandshakeMode::Passive => std::slice::from_ref(&TELEMETRY_DELIMITER),
    };
    if token.is_empty() {
        return Err(LocatorError::Config("ack token is empty".to_string()));
    }
    let mut inboxes: [Inbox; ANCHOR_COUNT] = std::array::from_fn(|_| Inbox::new(token));
    let mut attempts = 0u32;

    loop {
        if config.max_attempts != 0 && attempts >= config.max_attempts {
            return Err(LocatorError::HandshakeTimeout {
                attempts,
                pending: pending_anchors(&inboxes),
            });
        }
        attempts += 1;

        match config.mode {
            HandshakeMode::Command => {
                send_start(links, &inboxes, config.start_command.as_bytes())?;
                if shutdown.wait_timeout(config.interval()) {
                    return Err(LocatorError::Shutdown);
                }
                collect_replies(links, &mut inboxes)?;
            }
            _ => {
                collect_replies(links, &mut inboxes)?;
                if inboxes.iter().any(|i| !i.matched) && shutdown.wait_timeout(config.interval())
                {
                    return Err(LocatorError::Shutdown);
                }
            }
        }

        let pending = pending_anchors(&inboxes);
        if pending.is_empty() {
            log::info!("All anchors synchronized after {} round(s)", attempts);
            return Ok(HandshakeReport { attempts });
        }
        log::info!("Handshake round {}: waiting on {:?}", attempts, pending);
    }
}

fn pending_anchors(inboxes: &[Inbox; ANCHOR_COUNT]) -> Vec<AnchorId> {
    AnchorId::ALL
        .into_iter()
        .filter(|a| !inboxes[a.index()].matched)
        .collect()
}

fn send_start<L: AnchorLink>(
    links: &mut [L; ANCHOR_COUNT],
    inboxes: &[Inbox; ANCHOR_COUNT],
    command: &[u8],
) -> Result<()> {
    for anchor in AnchorId::ALL {
        if inboxes[anchor.index()].matched {
            continue;
        }
        let link = &mut links[anchor.index()];
        link.write_all(command)
            .and_then(|_| link.flush())
            .map_err(|source| LocatorError::Transport { anchor, source })?;
    }
    Ok(())
}

fn collect_replies<L: AnchorLink>(
    links: &mut [L; ANCHOR_COUNT],
    inboxes: &mut [Inbox; ANCHOR_COUNT],
) -> Result<()> {
    for anchor in AnchorId::ALL {
        let inbox = &mut inboxes[anchor.index()];
        if inbox.matched {
            continue;
        }
        let received = links[anchor.index()]
            .read_pending()
            .map_err(|source| LocatorError::Transport { anchor, source })?;
        if !received.is_empty() {
            log::debug!("{} sent {:?}", anchor, String::from_utf8_lossy(&received));
        }
        if inbox.feed(&received) {
            log::info!("{} acknowledged", anchor);
        }
    }
    Ok(())
}
