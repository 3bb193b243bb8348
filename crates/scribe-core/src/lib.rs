//! Board-independent logic for the scribe receipt printer.
//!
//! Everything here runs on the host as well as on the device: the two state
//! machines (network connectivity and the daily acquisition pipeline), the
//! durable records they share, and the pure codecs they lean on. Hardware is
//! reached only through the traits in [`storage`], [`transport`],
//! [`connectivity`] and [`render`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cache;
pub mod clock;
pub mod connectivity;
pub mod context;
pub mod dhcp;
pub mod error;
pub mod extract;
pub mod http;
pub mod job;
pub mod log_ring;
pub mod operator;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod settings;
pub mod storage;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
