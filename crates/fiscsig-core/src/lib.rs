#![forbid(unsafe_code)]

//! Core types shared by every fiscsig crate.

pub mod algorithm;
pub mod clock;
pub mod error;
pub mod ns;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
