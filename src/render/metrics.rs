//! Font metrics and line wrapping for the standard Helvetica faces.
//!
//! The PDF uses the base-14 Type1 fonts, which every viewer provides, so no
//! font program is embedded. Widths are the Adobe AFM advance widths in
//! 1/1000 em for the printable ASCII range; anything else falls back to the
//! width of a digit.

/// Font face used in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    /// PDF `BaseFont` name.
    pub fn base_name(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
        }
    }

    /// Resource key used in page content streams.
    pub fn resource_key(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            Font::Regular => &HELVETICA,
            Font::Bold => &HELVETICA_BOLD,
        }
    }

    /// Advance width of `c` in 1/1000 em.
    pub fn char_width(self, c: char) -> u16 {
        let code = c as u32;
        if (32..=126).contains(&code) {
            self.widths()[(code - 32) as usize]
        } else {
            FALLBACK_WIDTH
        }
    }
}

const FALLBACK_WIDTH: u16 = 556;

/// Millimetres per PostScript point.
pub const MM_PER_PT: f32 = 25.4 / 72.0;

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // : ; < = > ? @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [ \ ] ^ _ `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // { | } ~
    334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Rendered width of `text` in millimetres.
pub fn text_width_mm(text: &str, font: Font, size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(font.char_width(c))).sum();
    units as f32 / 1000.0 * size_pt * MM_PER_PT
}

/// Greedy word wrap to `max_width_mm`.
///
/// Explicit newlines are kept; blank lines come out as empty strings. A word
/// wider than the whole line is broken between characters.
pub fn wrap_text(text: &str, font: Font, size_pt: f32, max_width_mm: f32) -> Vec<String> {
    let fits = |s: &str| text_width_mm(s, font, size_pt) <= max_width_mm;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fits(word) {
                current = word.to_string();
                continue;
            }
            // Overlong word: hard-break it.
            for c in word.chars() {
                current.push(c);
                if !fits(&current) && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }

        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(Font::Regular.char_width('i'), 222);
        assert_eq!(Font::Bold.char_width('i'), 278);
        assert_eq!(Font::Regular.char_width('W'), 944);
        assert_eq!(Font::Regular.char_width('é'), FALLBACK_WIDTH);
    }

    #[test]
    fn test_width_scales_with_size() {
        let w10 = text_width_mm("Hello", Font::Regular, 10.0);
        let w20 = text_width_mm("Hello", Font::Regular, 20.0);
        assert!((w20 - 2.0 * w10).abs() < 1e-4);
        assert!(text_width_mm("Hello", Font::Bold, 10.0) > w10);
    }

    #[test]
    fn test_wraps_within_width() {
        let text = "lorem ipsum dolor sit amet ".repeat(40);
        let lines = wrap_text(&text, Font::Regular, 10.0, 180.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, Font::Regular, 10.0) <= 180.0);
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), text.split_whitespace().count());
    }

    #[test]
    fn test_keeps_blank_lines() {
        let lines = wrap_text("one\n\ntwo", Font::Regular, 10.0, 180.0);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn test_breaks_overlong_words() {
        let word = "x".repeat(500);
        let lines = wrap_text(&word, Font::Regular, 10.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(text_width_mm(line, Font::Regular, 10.0) <= 50.0);
        }
    }

    #[test]
    fn test_empty_text_is_one_empty_line() {
        assert_eq!(wrap_text("", Font::Regular, 10.0, 100.0), vec![String::new()]);
    }
}
