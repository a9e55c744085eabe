//! Text clean-up shared by the filter and the segment builder.

use std::path::Path;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::error::Result;

/// Markdown entity Reddit emits for an intentionally empty paragraph.
pub const ZERO_WIDTH_ENTITY: &str = "&#x200B;";
const ZERO_WIDTH_SPACE: char = '\u{200B}';

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:https?://|ftp://|www\.)\S+|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|org|net|io|gov|edu|co|uk|ly|gg|tv|me|dev|app|rs|info|biz)(?:/\S*)?\b",
    )
    .expect("URL pattern is valid")
});

static SPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("space pattern is valid"));

/// Whether the text contains something that looks like a link.
#[must_use]
pub fn contains_url(text: &str) -> bool {
    URL_PATTERN.is_match(text)
}

/// Whether a character is a pictograph, dingbat or emoji joiner.
fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0xFE00..=0xFE0F
            | 0x200D
            | 0x20E3
    )
}

/// Remove emoji so narration engines don't read them out.
#[must_use]
pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

/// Remove the zero-width sentinel in both its entity and literal forms.
#[must_use]
pub fn strip_zero_width(text: &str) -> String {
    text.replace(ZERO_WIDTH_ENTITY, "")
        .chars()
        .filter(|c| *c != ZERO_WIDTH_SPACE)
        .collect()
}

/// Drop lines that are empty or whitespace only.
#[must_use]
pub fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode the handful of HTML entities that survive in thread JSON and
/// collapse runs of spaces.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    decoded
        .lines()
        .map(|line| SPACE_RUNS.replace_all(line.trim_end(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body of an accepted comment as it is shown and narrated.
#[must_use]
pub fn clean_comment_body(body: &str) -> String {
    strip_blank_lines(&strip_emoji(&strip_zero_width(body)))
}

/// Split free text into the lines that get narrated one by one.
///
/// Zero-width and whitespace-only lines are skipped.
#[must_use]
pub fn narration_lines(text: &str) -> Vec<String> {
    let cleaned = strip_emoji(&sanitize_text(text));
    cleaned
        .lines()
        .filter(|line| line.trim() != ZERO_WIDTH_ENTITY)
        .map(strip_zero_width)
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Pick `count` random non-empty lines from a text file.
pub fn random_lines<R: Rng + ?Sized>(path: &Path, count: usize, rng: &mut R) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    Ok(lines
        .choose_multiple(rng, count)
        .copied()
        .collect::<Vec<_>>()
        .join("\n"))
}
