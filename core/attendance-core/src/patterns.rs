//! Compiled regex patterns, built once on first use.

use once_cell::sync::Lazy;
use regex::Regex;

/// Any line break flavour a configured prefix or suffix may carry.
pub static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\n\r|\r|\n").unwrap());

/// Splits `text` at every line break, whatever its flavour.
pub fn split_lines(text: &str) -> Vec<&str> {
    RE_LINE_BREAK.split(text).collect()
}
