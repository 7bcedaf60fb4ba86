//! External tool wrappers for image conversion.
//!
//! `cwebp` does the actual encoding and is required. `identify`
//! (ImageMagick) probes pixel dimensions and is optional; without it
//! the resize bounds are ignored and images keep their size. Both are
//! resolved from PATH once at startup so a missing encoder aborts the
//! run before anything on disk or in the database is touched.

use anyhow::Context;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from a single conversion attempt.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("cwebp exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("cwebp terminated by a signal")]
    Interrupted,
}

/// Locates and drives the external encoder.
pub struct Transcoder {
    cwebp: PathBuf,
    identify: Option<PathBuf>,
    quality: u8,
}

impl Transcoder {
    /// Resolve the external tools from PATH.
    pub fn locate(quality: u8) -> anyhow::Result<Self> {
        let cwebp = which::which("cwebp")
            .context("cwebp not found on PATH (install the webp encoder package)")?;
        debug!(path = %cwebp.display(), "found cwebp");

        let identify = match which::which("identify") {
            Ok(path) => {
                debug!(path = %path.display(), "found identify");
                Some(path)
            }
            Err(_) => None,
        };

        Ok(Self {
            cwebp,
            identify,
            quality,
        })
    }

    pub fn can_probe(&self) -> bool {
        self.identify.is_some()
    }

    /// Pixel dimensions of `source`, when `identify` is available and
    /// can read the file.
    pub async fn probe(&self, source: &Path) -> Option<(u32, u32)> {
        let identify = self.identify.as_ref()?;
        let output = match Command::new(identify)
            .arg("-format")
            .arg("%w %h")
            .arg(source)
            .output()
            .await
        {
            Ok(output) => output,
            Err(error) => {
                warn!(%error, "failed to run identify");
                return None;
            }
        };
        if !output.status.success() {
            warn!(source = %source.display(), "identify could not read the image");
            return None;
        }
        parse_dimensions(&String::from_utf8_lossy(&output.stdout))
    }

    /// Convert `source` into a `.webp` file next to it, optionally
    /// resizing. Returns the path of the produced file. The source is
    /// never modified; a partial output file is removed on failure.
    pub async fn convert(
        &self,
        source: &Path,
        resize: Option<(u32, u32)>,
    ) -> Result<PathBuf, TranscodeError> {
        let target = source.with_extension("webp");

        let mut command = Command::new(&self.cwebp);
        command.arg("-quiet").arg("-q").arg(self.quality.to_string());
        if let Some((width, height)) = resize {
            command
                .arg("-resize")
                .arg(width.to_string())
                .arg(height.to_string());
        }
        command.arg(source).arg("-o").arg(&target);

        let output = command
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                tool: "cwebp",
                source,
            })?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&target);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return match output.status.code() {
                Some(status) => Err(TranscodeError::Failed { status, stderr }),
                None => Err(TranscodeError::Interrupted),
            };
        }

        Ok(target)
    }
}

/// Largest size fitting the bounds without enlarging, keeping the
/// aspect ratio. `None` when the image already fits.
pub fn fit_within(
    (width, height): (u32, u32),
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let mut scale = 1.0_f64;
    if let Some(max) = max_width {
        if width > max {
            scale = scale.min(f64::from(max) / f64::from(width));
        }
    }
    if let Some(max) = max_height {
        if height > max {
            scale = scale.min(f64::from(max) / f64::from(height));
        }
    }
    if scale >= 1.0 {
        return None;
    }

    let scaled_width = ((f64::from(width) * scale).round() as u32).clamp(1, width);
    let scaled_height = ((f64::from(height) * scale).round() as u32).clamp(1, height);
    Some((scaled_width, scaled_height))
}

fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_shrinks_to_width_bound() {
        assert_eq!(
            fit_within((3000, 2000), Some(1500), None),
            Some((1500, 1000))
        );
    }

    #[test]
    fn test_fit_within_uses_tighter_bound() {
        assert_eq!(
            fit_within((3000, 2000), Some(1500), Some(500)),
            Some((750, 500))
        );
    }

    #[test]
    fn test_fit_within_never_enlarges() {
        assert_eq!(fit_within((800, 600), Some(1600), Some(1200)), None);
    }

    #[test]
    fn test_fit_within_exact_fit_is_untouched() {
        assert_eq!(fit_within((1500, 1000), Some(1500), None), None);
    }

    #[test]
    fn test_fit_within_without_bounds() {
        assert_eq!(fit_within((3000, 2000), None, None), None);
    }

    #[test]
    fn test_fit_within_degenerate_dimensions() {
        assert_eq!(fit_within((0, 0), Some(100), Some(100)), None);
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1920 1080\n"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("garbage"), None);
        assert_eq!(parse_dimensions(""), None);
    }
}
