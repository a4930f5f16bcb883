//! Utilities module for logging, errors, and helper functions
//!
//! This module provides:
//! - Structured logging with tracing
//! - Error handling types
//! - Name sanitizing and formatting helpers shared by the pipeline stages

pub mod error;
pub mod logging;

pub use error::{DatasetGenError, Result, ResultExt};
pub use logging::init_logging;

use std::path::Path;

/// Turn free text into a directory-safe name ("Orange Cats" -> "orange_cats")
pub fn sanitize_name(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "_")
}

/// Reject names that would not resolve to a single child directory
///
/// Empty names, `.`, `..` and anything containing a path separator would
/// point at the parent (or elsewhere) once joined onto a base directory.
pub fn check_dir_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(DatasetGenError::InvalidInput(format!(
            "{} {:?} is not usable as a directory name",
            what, name
        )));
    }
    Ok(())
}

/// Whether `path` has one of `extensions` (case-insensitive, without the dot)
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

/// Format a share of a total as a percentage, 0.0 when the total is empty
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
