//! ESP32-S3 implementations of the scribe-core hardware seams.

#![no_std]

extern crate alloc;

pub mod net;
pub mod printer;
pub mod storage;
