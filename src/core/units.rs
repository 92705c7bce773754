//! Byte humanization, human-size parsing, and fixed-width truncation.
//!
//! `format_bytes` uses decimal (SI) bands. Reports produced by earlier tooling
//! used the same bands, so changing them would break report diffing.

use std::sync::OnceLock;

use regex::Regex;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;
const GB: u64 = 1_000_000_000;

/// Marker appended to names cut for terminal display.
pub const ELLIPSIS: &str = "..";

/// Render a byte count with one of four decimal unit bands.
///
/// `999 -> "999 B"`, `1000 -> "1.0 KB"`, `1_000_000 -> "1.0 MB"`,
/// `1_000_000_000 -> "1.0 GB"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Parse a size string into bytes.
///
/// Accepts plain integers (`"52428800"`) and the human forms emitted by
/// `du -h`/`ls -h` (`"1.2G"`, `"512K"`, `"3MiB"`) as well as SI forms
/// (`"1.5 GB"`). Bare unit letters and `iB` suffixes are binary (1024-based);
/// `KB`/`MB`/`GB`/`TB` are decimal. Returns `None` for anything else.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn parse_human_size(raw: &str) -> Option<u64> {
    static SIZE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = SIZE_RE
        .get_or_init(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*([kmgtp]?)(i?b?)\s*$").ok())
        .as_ref()?;

    let trimmed = raw.trim();
    if let Ok(exact) = trimmed.parse::<u64>() {
        return Some(exact);
    }

    let caps = re.captures(trimmed)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let suffix = caps.get(3).map_or("", |m| m.as_str()).to_ascii_lowercase();

    let exponent = match unit.as_str() {
        "" => 0,
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        _ => return None,
    };
    let base: f64 = if suffix == "b" && exponent > 0 {
        1000.0
    } else {
        1024.0
    };

    let bytes = (number * base.powi(exponent)).round();
    if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}

/// Cut `text` to at most `width` characters, marking the cut with [`ELLIPSIS`].
///
/// Operates on characters, not bytes, so multi-byte names never split
/// mid-codepoint. Widths smaller than the marker return the marker alone.
#[must_use]
pub fn truncate_display(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
