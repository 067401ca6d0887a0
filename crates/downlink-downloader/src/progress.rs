//! Parses the external download tool's stdout contract (§4.4):
//! `[download]  56.0% of 50.00MiB at 1.20MiB/s ETA 00:18` style lines,
//! plus the two terminal-output markers the tool emits on success.

use once_cell::sync::Lazy;
use regex::Regex;

static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid progress regex"));

static MERGER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[Merger\] Merging formats into "([^"]+)""#).expect("valid merger regex"));

static ALREADY_DOWNLOADED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[download\] (.+) has already been downloaded").expect("valid already-downloaded regex"));

/// A single progress update parsed from a `[download]` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Percent complete, rounded to the nearest integer and clamped to `0..=100`.
    pub percent: u8,
}

/// Parses a `[download] N.N%` line into a rounded, clamped percentage.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let captures = PROGRESS_LINE.captures(line)?;
    let raw: f64 = captures.get(1)?.as_str().parse().ok()?;
    let rounded = raw.round().clamp(0.0, 100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(ProgressUpdate {
        percent: rounded as u8,
    })
}

/// Extracts the merged output path from a `[Merger] Merging formats into "..."` line.
#[must_use]
pub fn parse_merger_line(line: &str) -> Option<String> {
    MERGER_LINE.captures(line).map(|c| c[1].to_string())
}

/// Extracts the output path from a `[download] <path> has already been downloaded` line.
#[must_use]
pub fn parse_already_downloaded_line(line: &str) -> Option<String> {
    ALREADY_DOWNLOADED_LINE.captures(line).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_progress_line_rounds_and_matches() {
        let update = parse_progress_line("[download]  56.0% of 50.00MiB at 1.20MiB/s ETA 00:18").unwrap();
        assert_eq!(update.percent, 56);
    }

    #[test]
    fn parse_progress_line_ignores_unrelated_lines() {
        assert!(parse_progress_line("[info] Downloading webpage").is_none());
    }

    #[test]
    fn parse_merger_line_extracts_path() {
        let path = parse_merger_line(r#"[Merger] Merging formats into "/tmp/job/a.mkv""#).unwrap();
        assert_eq!(path, "/tmp/job/a.mkv");
    }

    #[test]
    fn parse_already_downloaded_line_extracts_path() {
        let path = parse_already_downloaded_line("[download] /tmp/job/a.mkv has already been downloaded").unwrap();
        assert_eq!(path, "/tmp/job/a.mkv");
    }
}
