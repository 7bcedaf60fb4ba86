//! Message types for the media sync channel.
//!
//! One conversion run drives a single sync worker over an in-process
//! channel. Every message keeps the tab-delimited line form of the
//! legacy coprocess protocol; that line form is what trace logs show
//! and what the grammar tests pin down.
//!
//! # Wire Grammar
//!
//! Fields are separated by a single tab:
//! ```text
//! INFO <file>                  -> THUMBS [<basename>...]
//! UPDATE <old> <new> <w> <h>   -> <post id> | ERROR <message>
//! FLUSH-REPLACE                -> REPLACED <content> <documents>
//! FLUSH-CACHE                  -> FLUSHED <cleared>
//! ```
//!
//! Paths are upload-relative (`2024/03/foo.jpg`) and must not contain
//! tabs. The typed enums in [`types`] are authoritative; the line form
//! is an encoding of them.

pub mod defaults;
pub mod paths;
pub mod types;

pub use types::{LineError, Reply, Request, FIELD_DELIMITER};
