//! Caption measurement, re-flow and image fitting
//!
//! Rendering happens in the compositor, so caption height is estimated from
//! font metrics: words are wrapped greedily at a fixed number of characters
//! per line, and every wrapped line costs `font_size * line_spacing` pixels.

use serde::{Deserialize, Serialize};

/// Width and height of a frame or picture in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Font metrics used to estimate caption height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub font_size: u32,
    /// Width of the caption box in pixels
    pub box_width: u32,
    /// Average glyph width as a fraction of the font size
    pub char_width_ratio: f64,
    /// Line height as a multiple of the font size
    pub line_spacing: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size: 60,
            box_width: 1820,
            char_width_ratio: 0.55,
            line_spacing: 1.2,
        }
    }
}

impl TextMetrics {
    /// Number of characters that fit on one wrapped line (at least one)
    #[must_use]
    pub fn chars_per_line(&self) -> usize {
        let glyph = f64::from(self.font_size) * self.char_width_ratio;
        if glyph <= 0.0 {
            return 1;
        }
        ((f64::from(self.box_width) / glyph).floor() as usize).max(1)
    }

    /// Height of one wrapped line in pixels
    #[must_use]
    pub fn line_height(&self) -> f64 {
        f64::from(self.font_size) * self.line_spacing
    }

    /// Estimated rendered height of `text` in pixels
    #[must_use]
    pub fn text_height(&self, text: &str) -> f64 {
        wrapped_line_count(text, self.chars_per_line()) as f64 * self.line_height()
    }

    /// Whether `text` renders within `max_height`
    #[must_use]
    pub fn fits(&self, text: &str, max_height: f64) -> bool {
        self.text_height(text) <= max_height
    }
}

/// Greedily wrap `text` at `width` characters per row.
///
/// Every source line takes at least one row; words longer than a row are
/// broken across as many rows as they need.
#[must_use]
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for line in text.split('\n') {
        let mut current = String::new();
        let mut used = 0;

        for word in line.split_whitespace() {
            let len = word.chars().count();

            if len > width {
                if used > 0 {
                    rows.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut pieces = chars.chunks(width).peekable();
                while let Some(piece) = pieces.next() {
                    let piece: String = piece.iter().collect();
                    if pieces.peek().is_some() {
                        rows.push(piece);
                    } else {
                        used = piece.chars().count();
                        current = piece;
                    }
                }
                continue;
            }

            if used == 0 {
                current.push_str(word);
                used = len;
            } else if used + 1 + len <= width {
                current.push(' ');
                current.push_str(word);
                used += 1 + len;
            } else {
                rows.push(std::mem::replace(&mut current, word.to_string()));
                used = len;
            }
        }

        rows.push(current);
    }

    rows
}

/// Number of rows `text` occupies when wrapped at `width` characters.
#[must_use]
pub fn wrapped_line_count(text: &str, width: usize) -> usize {
    wrap_lines(text, width).len()
}

/// Result of adding one line to the caption buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reflow {
    /// Buffer plus the new line fits; carries the combined text.
    Extended(String),
    /// Only the new line fits on its own; carries just that line.
    Reset(String),
    /// Not even the new line fits. The unit is dropped and the buffer is
    /// cleared.
    Overflow,
}

impl Reflow {
    /// Caption text to show, if the line survived.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Extended(text) | Self::Reset(text) => Some(text),
            Self::Overflow => None,
        }
    }

    /// Buffer to carry into the next line.
    #[must_use]
    pub fn into_buffer(self) -> String {
        match self {
            Self::Extended(text) | Self::Reset(text) => text,
            Self::Overflow => String::new(),
        }
    }
}

/// Decide how `new_line` joins the caption `buffer`.
///
/// ```rust
/// use threadreel::layout::{reflow, Reflow, TextMetrics};
///
/// let metrics = TextMetrics::default();
/// let line_height = metrics.line_height();
///
/// assert_eq!(
///     reflow("first", "second", &metrics, line_height * 2.0),
///     Reflow::Extended("first\nsecond".to_string())
/// );
/// assert_eq!(
///     reflow("first", "second", &metrics, line_height),
///     Reflow::Reset("second".to_string())
/// );
/// ```
#[must_use]
pub fn reflow(buffer: &str, new_line: &str, metrics: &TextMetrics, max_height: f64) -> Reflow {
    let candidate = if buffer.is_empty() {
        new_line.to_string()
    } else {
        format!("{buffer}\n{new_line}")
    };

    if metrics.fits(&candidate, max_height) {
        return Reflow::Extended(candidate);
    }

    if !buffer.is_empty() && metrics.fits(new_line, max_height) {
        return Reflow::Reset(new_line.to_string());
    }

    Reflow::Overflow
}

/// How an image is placed on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFit {
    /// Scaled size that fits the frame
    Fits(FrameSize),
    /// Scaled size that is still taller than the frame
    Overflow(FrameSize),
}

/// Scale an image to the frame, preserving its aspect ratio.
///
/// Landscape and square images (aspect ≥ 1) are bound by
/// `frame.width * width_fraction`; portrait images by 95% of the frame
/// height.
#[must_use]
pub fn fit_image(image: FrameSize, frame: FrameSize, width_fraction: f64) -> ImageFit {
    let aspect = image.aspect();
    if aspect <= 0.0 {
        return ImageFit::Overflow(image);
    }

    let (width, height) = if aspect >= 1.0 {
        let width = f64::from(frame.width) * width_fraction;
        (width, width / aspect)
    } else {
        let height = f64::from(frame.height) * 0.95;
        (height * aspect, height)
    };

    let scaled = FrameSize::new(width.round() as u32, height.round() as u32);
    if scaled.height > frame.height {
        ImageFit::Overflow(scaled)
    } else {
        ImageFit::Fits(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> TextMetrics {
        TextMetrics::default()
    }

    #[test]
    fn chars_per_line_uses_box_width() {
        // 1820 / (60 * 0.55) = 55.15
        assert_eq!(metrics().chars_per_line(), 55);

        let tiny = TextMetrics {
            box_width: 1,
            ..metrics()
        };
        assert_eq!(tiny.chars_per_line(), 1);
    }

    #[test]
    fn wraps_words_greedily() {
        assert_eq!(wrapped_line_count("", 10), 1);
        assert_eq!(wrapped_line_count("one two", 10), 1);
        assert_eq!(wrapped_line_count("one two three", 10), 2);
        assert_eq!(wrapped_line_count("a\nb\n\nc", 10), 4);
    }

    #[test]
    fn breaks_long_words() {
        assert_eq!(wrapped_line_count("abcdefghij", 5), 2);
        assert_eq!(wrapped_line_count("ab abcdefghijk", 5), 4);
    }

    #[test]
    fn wrap_lines_keeps_words_whole() {
        assert_eq!(
            wrap_lines("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap_lines("ab abcdefghijk", 5), vec!["ab", "abcde", "fghij", "k"]);
    }

    #[test]
    fn height_is_lines_times_line_height() {
        let m = metrics();
        assert!((m.text_height("hello\nworld") - 2.0 * 72.0).abs() < 1e-9);
    }

    #[test]
    fn reflow_extends_until_full() {
        let m = metrics();
        let max = m.line_height() * 3.0;

        let first = reflow("", "one", &m, max);
        assert_eq!(first, Reflow::Extended("one".to_string()));

        let second = reflow("one\ntwo", "three", &m, max);
        assert_eq!(second, Reflow::Extended("one\ntwo\nthree".to_string()));

        let third = reflow("one\ntwo\nthree", "four", &m, max);
        assert_eq!(third, Reflow::Reset("four".to_string()));
    }

    #[test]
    fn reflow_overflows_when_line_alone_is_too_tall() {
        let m = metrics();
        let long_line = "word ".repeat(200);

        let outcome = reflow("existing", &long_line, &m, m.line_height() * 2.0);
        assert_eq!(outcome, Reflow::Overflow);
        assert_eq!(outcome.into_buffer(), "");
    }

    #[test]
    fn reflow_on_empty_buffer_never_resets() {
        let m = metrics();
        let long_line = "word ".repeat(200);
        assert_eq!(reflow("", &long_line, &m, m.line_height()), Reflow::Overflow);
    }

    #[test]
    fn landscape_images_are_width_bound() {
        let frame = FrameSize::new(1920, 1080);
        let fit = fit_image(FrameSize::new(800, 200), frame, 0.9);
        assert_eq!(fit, ImageFit::Fits(FrameSize::new(1728, 432)));
    }

    #[test]
    fn portrait_images_are_height_bound() {
        let frame = FrameSize::new(1920, 1080);
        let fit = fit_image(FrameSize::new(500, 1000), frame, 0.9);
        assert_eq!(fit, ImageFit::Fits(FrameSize::new(513, 1026)));
    }

    #[test]
    fn tall_landscape_image_overflows_wide_fraction() {
        let frame = FrameSize::new(1000, 500);
        let ImageFit::Overflow(size) = fit_image(FrameSize::new(1000, 900), frame, 0.9) else {
            panic!("expected overflow");
        };
        assert_eq!(size, FrameSize::new(900, 810));
    }

    #[test]
    fn degenerate_image_overflows() {
        let frame = FrameSize::new(1920, 1080);
        assert!(matches!(
            fit_image(FrameSize::new(0, 0), frame, 0.9),
            ImageFit::Overflow(_)
        ));
    }
}
