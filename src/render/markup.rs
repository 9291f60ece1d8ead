//! Rich text: backend result text parsed into styled spans.
//!
//! Analysis results arrive as loosely formatted text: Markdown emphasis
//! (`**bold**`, `__bold__`, `*italic*`, `_italic_`, `***both***`), stray inline HTML tags and a few
//! HTML entities. [`RichText::parse`] turns that into a flat list of
//! [`Span`]s. No markup ever survives into a span's text, so consumers can
//! style spans however they like (ANSI in the terminal, plain Helvetica in
//! the PDF) without sanitising anything themselves.
//!
//! ## Pass Order
//!
//! Line breaks from `<br>` first, then tag stripping, then entity decoding,
//! then emphasis. Decoding entities before emphasis means `&lt;b&gt;` stays
//! literal text instead of being stripped as a tag.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Visual emphasis of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
}

impl SpanStyle {
    pub const PLAIN: SpanStyle = SpanStyle {
        bold: false,
        italic: false,
    };

    fn with_bold(self) -> Self {
        Self { bold: true, ..self }
    }

    fn with_italic(self) -> Self {
        Self {
            italic: true,
            ..self
        }
    }
}

/// A run of text with one style. Never contains markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

/// Sanitised, styled text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RichText {
    pub spans: Vec<Span>,
}

impl RichText {
    /// Parse backend text into spans.
    pub fn parse(input: &str) -> Self {
        let text = RE_BREAK.replace_all(input, "\n");
        let text = RE_TAG.replace_all(&text, "");
        let text = decode_entities(&text);

        let mut out = RichText::default();
        parse_bold(&text, SpanStyle::PLAIN, &mut out);
        out
    }

    /// Concatenated span text.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    fn push(&mut self, text: &str, style: SpanStyle) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.style == style {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Span {
            text: text.to_string(),
            style,
        });
    }
}

/// Strip all presentation markup, keeping only the text.
pub fn strip_markup(input: &str) -> String {
    RichText::parse(input).plain_text()
}

// ── Tags and entities ────────────────────────────────────────────────────────

static RE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|nbsp|#39|#x27);").unwrap());

/// Single pass, so `&amp;lt;` decodes to `&lt;` and not `<`.
fn decode_entities(input: &str) -> String {
    RE_ENTITY
        .replace_all(input, |caps: &regex::Captures<'_>| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "nbsp" => " ",
            _ => "'",
        })
        .into_owned()
}

// ── Emphasis ─────────────────────────────────────────────────────────────────

// `***x***` is tried first so it is not read as `**` + `*x` + `**`.
static RE_BOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*([^\n]+?)\*\*\*|\*\*([^\n]+?)\*\*|__([^\n_][^\n]*?)__").unwrap()
});

// Opening marker must be followed and closing marker preceded by non-space,
// so a list bullet like `* item` is left alone. `_x_` also needs a non-word
// character (or nothing) outside each marker, so `snake_case` is kept.
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*([^\s*](?:[^*\n]*[^\s*])?)\*|\b_([^\s_](?:[^_\n]*[^\s_])?)_\b").unwrap()
});

fn parse_bold(text: &str, style: SpanStyle, out: &mut RichText) {
    let mut last = 0;
    let mut after_bold = false;
    for caps in RE_BOLD.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let (inner, inner_style) = match (caps.get(1), caps.get(2).or_else(|| caps.get(3))) {
            (Some(both), _) => (both.as_str(), style.with_bold().with_italic()),
            (None, Some(bold)) => (trim_uneven_star(bold.as_str()), style.with_bold()),
            (None, None) => continue,
        };
        let before = trim_adjacent_stars(&text[last..whole.start()], after_bold, true);
        parse_italic(before, style, out);
        parse_italic(inner, inner_style, out);
        last = whole.end();
        after_bold = true;
    }
    parse_italic(trim_adjacent_stars(&text[last..], after_bold, false), style, out);
}

/// Drop single `*` touching a bold span, left over from uneven runs like
/// `**a***`.
fn trim_adjacent_stars(segment: &str, follows_bold: bool, precedes_bold: bool) -> &str {
    let mut segment = segment;
    if follows_bold {
        segment = segment.strip_prefix('*').unwrap_or(segment);
    }
    if precedes_bold {
        segment = segment.strip_suffix('*').unwrap_or(segment);
    }
    segment
}

/// `*b` inside `***b**`: one side only, so not italic.
fn trim_uneven_star(inner: &str) -> &str {
    match (inner.starts_with('*'), inner.ends_with('*')) {
        (true, false) => &inner[1..],
        (false, true) => &inner[..inner.len() - 1],
        _ => inner,
    }
}

fn parse_italic(text: &str, style: SpanStyle, out: &mut RichText) {
    let mut last = 0;
    for caps in RE_ITALIC.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)))
        else {
            continue;
        };
        out.push(&drop_stray_markers(&text[last..whole.start()]), style);
        out.push(&drop_stray_markers(inner.as_str()), style.with_italic());
        last = whole.end();
    }
    out.push(&drop_stray_markers(&text[last..]), style);
}

/// Unpaired `**` left over after matching.
fn drop_stray_markers(text: &str) -> String {
    text.replace("**", "")
}
