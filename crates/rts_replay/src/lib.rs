//! # RTS Replay Runner
//!
//! Command-line support for recorded lockstep matches:
//! - Playing a replay file against the skirmish scenario
//! - Listing the commands a replay holds
//! - Writing a demo replay
//! - Validating config and tech data files

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod runner;
pub mod validate;
