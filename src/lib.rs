//! Syndicate: publish content items to external platforms, one bounded run
//! at a time.
//!
//! Each platform has a queue of pending items and an archive of terminal
//! ones. A run drains the queue in order, paces successful submissions,
//! archives successes and permanent failures, and stops on back-pressure
//! with the head item still queued.
//!
//! See `DESIGN.md` for the module layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod credentials;
pub mod logging;

pub mod content;
pub mod store;
pub mod transform;

pub mod classify;
pub mod publisher;
pub mod run;
