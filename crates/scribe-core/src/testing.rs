//! In-memory fakes for the hardware and network boundaries.

use alloc::{
    collections::VecDeque,
    string::{String, ToString},
    vec::Vec,
};
use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read};

use crate::{
    connectivity::{PortalReply, ProvisioningPortal, Submission, WifiStation},
    render::ReceiptPrinter,
    settings::Credentials,
    storage::{BlobStore, MemoryBlobStore},
    transport::{ContentTransport, PayloadBuffer, ReachabilityProbe},
};

/// Completes every delay immediately and records it in milliseconds.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub sleeps_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.sleeps_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.sleeps_ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.sleeps_ms.push(ms);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PrintOp {
    Advance(u8),
    Inverse(bool),
    Line(String),
}

#[derive(Debug, Default)]
pub struct RecordingPrinter {
    pub ops: Vec<PrintOp>,
}

impl RecordingPrinter {
    pub fn lines(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PrintOp::Line(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ReceiptPrinter for RecordingPrinter {
    type Error = Infallible;

    async fn print_line(&mut self, line: &str) -> Result<(), Self::Error> {
        self.ops.push(PrintOp::Line(line.to_string()));
        Ok(())
    }

    async fn set_inverse(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.ops.push(PrintOp::Inverse(enabled));
        Ok(())
    }

    async fn advance_paper(&mut self, lines: u8) -> Result<(), Self::Error> {
        self.ops.push(PrintOp::Advance(lines));
        Ok(())
    }
}

/// Response body handed out `chunk` bytes per read.
pub struct ChunkedBody<'a> {
    remaining: &'a [u8],
    chunk: usize,
    reads_before_error: Option<usize>,
}

impl<'a> ChunkedBody<'a> {
    pub fn new(source: &'a [u8], chunk: usize) -> Self {
        Self {
            remaining: source,
            chunk,
            reads_before_error: None,
        }
    }

    /// Fails every read after the first `reads`.
    pub fn failing_after(mut self, reads: usize) -> Self {
        self.reads_before_error = Some(reads);
        self
    }
}

impl ErrorType for ChunkedBody<'_> {
    type Error = ErrorKind;
}

impl Read for ChunkedBody<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(left) = self.reads_before_error.as_mut() {
            if *left == 0 {
                return Err(ErrorKind::ConnectionReset);
            }
            *left -= 1;
        }
        let take = buf.len().min(self.chunk).min(self.remaining.len());
        buf[..take].copy_from_slice(&self.remaining[..take]);
        self.remaining = &self.remaining[take..];
        Ok(take)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportStep {
    Ok(Vec<u8>),
    Status(u16),
    Fail(&'static str),
    /// Accepts the request and never answers.
    Hang,
}

/// Plays back one step per `get`; an exhausted script fails every call.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub steps: VecDeque<TransportStep>,
    pub urls: Vec<String>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = TransportStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            urls: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.urls.len()
    }
}

impl ContentTransport for ScriptedTransport {
    type Error = &'static str;

    async fn get(&mut self, url: &str, payload: &mut PayloadBuffer) -> Result<u16, Self::Error> {
        self.urls.push(url.to_string());
        match self.steps.pop_front() {
            Some(TransportStep::Ok(body)) => {
                let mut reader = ChunkedBody::new(&body, 512);
                payload.fill_from(&mut reader, Some(body.len())).await;
                Ok(200)
            }
            Some(TransportStep::Status(status)) => Ok(status),
            Some(TransportStep::Fail(reason)) => Err(reason),
            Some(TransportStep::Hang) => core::future::pending().await,
            None => Err("script exhausted"),
        }
    }
}

/// Answers from `results` in order, then `fallback`.
#[derive(Debug)]
pub struct ScriptedProbe {
    pub results: VecDeque<bool>,
    pub fallback: bool,
    pub calls: usize,
}

impl ScriptedProbe {
    pub fn always(reachable: bool) -> Self {
        Self {
            results: VecDeque::new(),
            fallback: reachable,
            calls: 0,
        }
    }

    pub fn sequence(results: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            results: results.into_iter().collect(),
            fallback,
            calls: 0,
        }
    }
}

impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&mut self) -> bool {
        self.calls += 1;
        self.results.pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachStep {
    Succeed,
    Fail,
    /// Never completes; only a deadline ends it.
    Hang,
}

#[derive(Debug, Default)]
pub struct FakeStation {
    pub steps: VecDeque<AttachStep>,
    pub attached: bool,
    pub attempts: Vec<String>,
    pub detaches: usize,
}

impl FakeStation {
    pub fn new(steps: impl IntoIterator<Item = AttachStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl WifiStation for FakeStation {
    type Error = &'static str;

    async fn attach(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        self.attempts.push(credentials.ssid().to_string());
        match self.steps.pop_front().unwrap_or(AttachStep::Fail) {
            AttachStep::Succeed => {
                self.attached = true;
                Ok(())
            }
            AttachStep::Fail => Err("auth failed"),
            AttachStep::Hang => core::future::pending().await,
        }
    }

    async fn detach(&mut self) {
        self.attached = false;
        self.detaches += 1;
    }

    fn is_attached(&mut self) -> bool {
        self.attached
    }
}

/// Feeds queued submissions to the reviewer; stops when the queue runs dry.
#[derive(Debug, Default)]
pub struct FakePortal {
    pub fail_start: bool,
    pub submissions: VecDeque<Submission>,
    pub replies: Vec<PortalReply>,
    pub starts: usize,
    pub stops: usize,
}

impl FakePortal {
    pub fn with_submissions<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            submissions: pairs
                .into_iter()
                .map(|(ssid, password)| Submission {
                    ssid: ssid.to_string(),
                    password: password.to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }
}

impl ProvisioningPortal for FakePortal {
    type Error = &'static str;

    async fn start(&mut self) -> Result<(), Self::Error> {
        self.starts += 1;
        if self.fail_start {
            return Err("softap refused");
        }
        Ok(())
    }

    async fn next_submission<F>(&mut self, mut review: F) -> Option<Submission>
    where
        F: FnMut(&Submission) -> PortalReply,
    {
        while let Some(submission) = self.submissions.pop_front() {
            let reply = review(&submission);
            self.replies.push(reply);
            if reply == PortalReply::Accepted {
                return Some(submission);
            }
        }
        None
    }

    async fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Memory store whose writes can be switched off.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryBlobStore,
    pub fail_writes: bool,
}

impl BlobStore for FlakyStore {
    type Error = &'static str;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.inner.exists(name).unwrap_or(false))
    }

    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.inner.read(name).unwrap_or(None))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err("flash full");
        }
        let _ = self.inner.write(name, data);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        let _ = self.inner.remove(name);
        Ok(())
    }
}
