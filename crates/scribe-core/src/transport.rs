//! Remote fetch boundary and the capped payload buffer it fills.

use alloc::vec::Vec;
use core::fmt;

use embedded_io_async::Read;
use log::{debug, warn};

const READ_CHUNK_BYTES: usize = 256;

/// Body bytes of one fetch attempt, bounded by `cap`.
///
/// Owned by a single attempt and dropped with it, whatever the outcome.
#[derive(Debug)]
pub struct PayloadBuffer {
    bytes: Vec<u8>,
    cap: usize,
    capped: bool,
    truncated: bool,
}

impl PayloadBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
            capped: false,
            truncated: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Stopped early because the cap was reached.
    pub const fn is_capped(&self) -> bool {
        self.capped
    }

    /// The body ended (or failed) before the declared length.
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Streams `body` in, stopping at the cap, at `content_length`, or at
    /// end of stream. A read error ends the body like an early EOF; what
    /// arrived so far is kept.
    pub async fn fill_from<R: Read>(&mut self, body: &mut R, content_length: Option<usize>) {
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        loop {
            if self.bytes.len() >= self.cap {
                self.capped = true;
                debug!("payload: cap reached bytes={}", self.bytes.len());
                break;
            }
            if let Some(expected) = content_length
                && self.bytes.len() >= expected
            {
                break;
            }

            let mut want = chunk.len().min(self.cap - self.bytes.len());
            if let Some(expected) = content_length {
                want = want.min(expected - self.bytes.len());
            }
            match body.read(&mut chunk[..want]).await {
                Ok(0) => {
                    self.truncated =
                        content_length.is_some_and(|expected| self.bytes.len() < expected);
                    break;
                }
                Ok(read) => self.bytes.extend_from_slice(&chunk[..read]),
                Err(err) => {
                    warn!(
                        "payload: body read failed after bytes={} err={:?}",
                        self.bytes.len(),
                        err
                    );
                    self.truncated = true;
                    break;
                }
            }
        }

        if self.truncated {
            warn!(
                "payload: body shorter than declared bytes={} expected={:?}",
                self.bytes.len(),
                content_length
            );
        }
    }
}

impl Drop for PayloadBuffer {
    fn drop(&mut self) {
        debug!("payload: released bytes={}", self.bytes.len());
    }
}

/// Encrypted streaming HTTP client.
#[allow(async_fn_in_trait)]
pub trait ContentTransport {
    type Error: fmt::Debug;

    /// Issues one GET and returns the status code. The body is streamed into
    /// `payload` only for a `200` answer.
    async fn get(&mut self, url: &str, payload: &mut PayloadBuffer) -> Result<u16, Self::Error>;
}

/// Upstream reachability check (name resolution of a well-known host).
#[allow(async_fn_in_trait)]
pub trait ReachabilityProbe {
    async fn probe(&mut self) -> bool;
}
