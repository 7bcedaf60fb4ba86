//! Typed channel messages and their tab-delimited line form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field separator of the line form.
pub const FIELD_DELIMITER: &str = "\t";

/// Errors from parsing a protocol line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unrecognized reply '{0}'")]
    UnknownReply(String),

    #[error("{verb} expects {expected} field(s), got {got}")]
    FieldCount {
        verb: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid number '{value}' in {verb}")]
    BadNumber { verb: &'static str, value: String },
}

// ============================================================================
// Requests (orchestrator -> worker)
// ============================================================================

/// A command sent to the sync worker.
///
/// Paths are upload-relative (`2024/03/foo.jpg`), never absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Request {
    /// Look up an attachment and report its registered variant files.
    Info { file: String },
    /// Record a finished conversion: repoint the attachment row and its
    /// metadata from `old_file` to `new_file`, queueing URL replacements
    /// for the next flush.
    Update {
        old_file: String,
        new_file: String,
        width: u32,
        height: u32,
    },
    /// Apply every queued replacement pair to post content and builder
    /// documents.
    FlushReplace,
    /// Drop cached stylesheets and asset manifests that may still embed
    /// the old URLs.
    FlushCache,
}

impl Request {
    pub fn verb(&self) -> &'static str {
        match self {
            Request::Info { .. } => "INFO",
            Request::Update { .. } => "UPDATE",
            Request::FlushReplace => "FLUSH-REPLACE",
            Request::FlushCache => "FLUSH-CACHE",
        }
    }

    /// Render the tab-delimited line form.
    pub fn to_line(&self) -> String {
        match self {
            Request::Info { file } => join(&["INFO", file]),
            Request::Update {
                old_file,
                new_file,
                width,
                height,
            } => join(&[
                "UPDATE",
                old_file,
                new_file,
                &width.to_string(),
                &height.to_string(),
            ]),
            Request::FlushReplace => "FLUSH-REPLACE".to_string(),
            Request::FlushCache => "FLUSH-CACHE".to_string(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl FromStr for Request {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(FIELD_DELIMITER);
        let verb = fields
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(LineError::Empty)?;
        let rest: Vec<&str> = fields.collect();
        match verb {
            "INFO" => {
                expect_fields("INFO", &rest, 1)?;
                Ok(Request::Info {
                    file: rest[0].to_string(),
                })
            }
            "UPDATE" => {
                expect_fields("UPDATE", &rest, 4)?;
                Ok(Request::Update {
                    old_file: rest[0].to_string(),
                    new_file: rest[1].to_string(),
                    width: parse_number("UPDATE", rest[2])?,
                    height: parse_number("UPDATE", rest[3])?,
                })
            }
            "FLUSH-REPLACE" => {
                expect_fields("FLUSH-REPLACE", &rest, 0)?;
                Ok(Request::FlushReplace)
            }
            "FLUSH-CACHE" => {
                expect_fields("FLUSH-CACHE", &rest, 0)?;
                Ok(Request::FlushCache)
            }
            other => Err(LineError::UnknownCommand(other.to_string())),
        }
    }
}

// ============================================================================
// Replies (worker -> orchestrator)
// ============================================================================

/// The worker's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Reply {
    /// Variant basenames registered for the requested attachment.
    Thumbs { files: Vec<String> },
    /// The attachment row that was repointed. Line form is the bare id.
    Updated { post_id: i64 },
    /// Rows rewritten by the replacement flush, per column family.
    Replaced {
        content_rows: u64,
        document_rows: u64,
    },
    /// Cached artifacts cleared.
    Flushed { cleared: u64 },
    /// The request failed; the worker stays up for the next one.
    Error { message: String },
}

impl Reply {
    /// Render the tab-delimited line form.
    pub fn to_line(&self) -> String {
        match self {
            Reply::Thumbs { files } => {
                let mut fields = vec!["THUMBS"];
                fields.extend(files.iter().map(String::as_str));
                join(&fields)
            }
            Reply::Updated { post_id } => post_id.to_string(),
            Reply::Replaced {
                content_rows,
                document_rows,
            } => join(&[
                "REPLACED",
                &content_rows.to_string(),
                &document_rows.to_string(),
            ]),
            Reply::Flushed { cleared } => join(&["FLUSHED", &cleared.to_string()]),
            Reply::Error { message } => join(&["ERROR", message]),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl FromStr for Reply {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(FIELD_DELIMITER);
        let head = fields
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(LineError::Empty)?;
        let rest: Vec<&str> = fields.collect();
        match head {
            "THUMBS" => Ok(Reply::Thumbs {
                files: rest.iter().map(|s| s.to_string()).collect(),
            }),
            "REPLACED" => {
                expect_fields("REPLACED", &rest, 2)?;
                Ok(Reply::Replaced {
                    content_rows: parse_number("REPLACED", rest[0])?,
                    document_rows: parse_number("REPLACED", rest[1])?,
                })
            }
            "FLUSHED" => {
                expect_fields("FLUSHED", &rest, 1)?;
                Ok(Reply::Flushed {
                    cleared: parse_number("FLUSHED", rest[0])?,
                })
            }
            // The error message may itself contain tabs; keep them.
            "ERROR" => Ok(Reply::Error {
                message: rest.join(FIELD_DELIMITER),
            }),
            other => match other.parse::<i64>() {
                Ok(post_id) if rest.is_empty() => Ok(Reply::Updated { post_id }),
                _ => Err(LineError::UnknownReply(other.to_string())),
            },
        }
    }
}

fn join(fields: &[&str]) -> String {
    fields.join(FIELD_DELIMITER)
}

fn expect_fields(verb: &'static str, rest: &[&str], expected: usize) -> Result<(), LineError> {
    if rest.len() != expected {
        return Err(LineError::FieldCount {
            verb,
            expected,
            got: rest.len(),
        });
    }
    Ok(())
}

fn parse_number<N: FromStr>(verb: &'static str, value: &str) -> Result<N, LineError> {
    value.parse().map_err(|_| LineError::BadNumber {
        verb,
        value: value.to_string(),
    })
}
