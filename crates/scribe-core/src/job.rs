//! Single-slot job mailboxes shared by the schedule, the operator and the
//! pipeline.

use alloc::string::String;
use chrono::NaiveDate;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobOrigin {
    Scheduled,
    Manual,
}

/// Pending render request. The first producer to raise it decides whether
/// the job counts as the scheduled one; later requests only keep it raised.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PendingJobRequest {
    wants_render: bool,
    is_scheduled: bool,
}

impl PendingJobRequest {
    pub const fn new() -> Self {
        Self {
            wants_render: false,
            is_scheduled: false,
        }
    }

    /// Returns `true` if this call raised the request.
    pub fn request(&mut self, origin: JobOrigin) -> bool {
        if self.wants_render {
            return false;
        }
        self.wants_render = true;
        self.is_scheduled = origin == JobOrigin::Scheduled;
        true
    }

    pub const fn wants_render(&self) -> bool {
        self.wants_render
    }

    pub const fn is_scheduled(&self) -> bool {
        self.wants_render && self.is_scheduled
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Operator-submitted free-text receipt. Without a custom date the header
/// shows the date it is printed on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReceiptJob {
    pub custom_date: Option<NaiveDate>,
    pub message: String,
}
