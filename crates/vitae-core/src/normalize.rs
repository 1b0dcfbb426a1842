//! Text normalization for ORCID free-text fields.
//!
//! ORCID text arrives HTML-escaped (`&amp;`), HTML-tagged (`<i>`, `<sub>`,
//! `<mml:math>`, `<jats:p>`) or carrying raw Unicode. Two targets:
//!
//! - [`to_markup_text`]: typeset-safe LaTeX. Entities are decoded, a small set
//!   of inline tags is translated to LaTeX commands, and reserved characters are
//!   escaped last and only inside text runs, so translated commands are never
//!   re-escaped.
//! - [`to_plain_text`]: decoded, untagged, whitespace-collapsed text for JSON
//!   and BibTeX. It also unwraps the LaTeX produced by [`to_markup_text`], so
//!   `to_plain_text(to_markup_text(s))` carries no escaping artifacts.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)(?:[A-Za-z][A-Za-z0-9]*:)?([A-Za-z][A-Za-z0-9]*)[^<>]*>")
        .expect("valid regex")
});
static MATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$([^$]+)\$\$|\$([^$]+)\$").expect("valid regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SUB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:sub|inf)>(.*?)</(?:sub|inf)>").expect("valid regex"));
static SUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<sup>(.*?)</sup>").expect("valid regex"));
static MARKUP_CMD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:textit|textbf|textsubscript|textsuperscript|textsc)\{((?:\\[A-Za-z]+\{\}|\\.|[^{}\\])*)\}",
    )
    .expect("valid regex")
});
static MARKUP_ESCAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\textbackslash\{\}|\\textasciitilde\{\}|\\textasciicircum\{\}|\\ldots\{\}|\\newline|\\par\b|\\([&%$#_{}])|\$",
    )
    .expect("valid regex")
});

/// Inline HTML tags with a LaTeX equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkupTag {
    Italic,
    Bold,
    Subscript,
    Superscript,
    SmallCaps,
}

impl MarkupTag {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "i" | "em" | "italic" => Some(Self::Italic),
            "b" | "strong" | "bold" => Some(Self::Bold),
            "sub" | "inf" => Some(Self::Subscript),
            "sup" => Some(Self::Superscript),
            "scp" | "sc" => Some(Self::SmallCaps),
            _ => None,
        }
    }

    fn open(self) -> &'static str {
        match self {
            Self::Italic => r"\textit{",
            Self::Bold => r"\textbf{",
            Self::Subscript => r"\textsubscript{",
            Self::Superscript => r"\textsuperscript{",
            Self::SmallCaps => r"\textsc{",
        }
    }
}

// ─── Entities ───────────────────────────────────────────────

/// Decode HTML5 character references (named, decimal and hex) in a single
/// pass, so `&amp;lt;` becomes `&lt;`. Unknown names are left untouched.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}

// ─── Typeset output ─────────────────────────────────────────

/// Normalize raw ORCID text into LaTeX-safe text.
pub fn to_markup_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let mut out = String::with_capacity(decoded.len() + 16);
    let mut open: Vec<MarkupTag> = Vec::new();
    let mut last = 0;

    for caps in TAG_RE.captures_iter(&decoded) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_text_run(&decoded[last..whole.start()]));
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        match MarkupTag::from_name(&name) {
            Some(tag) if !closing => {
                out.push_str(tag.open());
                open.push(tag);
            }
            Some(tag) => {
                // close the matching tag and anything left open inside it
                if let Some(pos) = open.iter().rposition(|t| *t == tag) {
                    out.extend(std::iter::repeat_n('}', open.len() - pos));
                    open.truncate(pos);
                }
            }
            None => {
                let has_text = !out.trim().is_empty();
                match name.as_str() {
                    "br" if has_text => out.push_str(r" \newline "),
                    "p" | "div" if !closing && has_text => out.push_str(r" \par "),
                    _ => {}
                }
            }
        }
    }
    out.push_str(&escape_text_run(&decoded[last..]));
    out.extend(std::iter::repeat_n('}', open.len()));

    let collapsed = WS_RE.replace_all(&out, " ");
    let mut result = collapsed.trim();
    loop {
        let stripped = result
            .strip_suffix(r"\newline")
            .or_else(|| result.strip_suffix(r"\par"))
            .map(str::trim_end);
        match stripped {
            Some(s) => result = s,
            None => break,
        }
    }
    result.to_string()
}

/// Escape one text run, leaving balanced `$...$` math untouched.
/// `$$...$$` display math is folded to inline math.
fn escape_text_run(text: &str) -> String {
    if !text.contains('$') {
        return escape_markup(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in MATH_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_markup(&text[last..whole.start()]));
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        out.push('$');
        out.extend(inner.chars().filter(|c| is_latin1(*c)));
        out.push('$');
        last = whole.end();
    }
    out.push_str(&escape_markup(&text[last..]));
    out
}

/// Escape LaTeX reserved characters in text that carries no markup.
///
/// Typographic punctuation is mapped to LaTeX ligatures; anything else outside
/// Latin-1 is dropped because pdflatex cannot render it without extra packages.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '−' => out.push('-'),
            '–' => out.push_str("--"),
            '—' => out.push_str("---"),
            '‘' => out.push('`'),
            '’' => out.push('\''),
            '“' => out.push_str("``"),
            '”' => out.push_str("''"),
            '…' => out.push_str(r"\ldots{}"),
            c if is_latin1(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_latin1(c: char) -> bool {
    (c as u32) <= 0xFF
}

// ─── Plain output ───────────────────────────────────────────

/// Normalize raw ORCID text (or text produced by [`to_markup_text`]) into
/// plain text: entities decoded, `<sub>`/`<sup>` mapped to Unicode where a
/// glyph exists, tags removed, LaTeX commands unwrapped, whitespace collapsed.
pub fn to_plain_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let subscripted = SUB_RE.replace_all(&decoded, |caps: &Captures| {
        translate_script(&caps[1], subscript_char)
    });
    let scripted = SUP_RE.replace_all(&subscripted, |caps: &Captures| {
        translate_script(&caps[1], superscript_char)
    });
    let untagged = TAG_RE.replace_all(&scripted, |caps: &Captures| {
        match caps[2].to_ascii_lowercase().as_str() {
            "p" | "br" | "div" | "li" | "title" => " ",
            _ => "",
        }
    });

    let mut unwrapped = untagged.into_owned();
    for _ in 0..8 {
        let next = MARKUP_CMD_RE.replace_all(&unwrapped, "$1");
        if next == unwrapped {
            break;
        }
        unwrapped = next.into_owned();
    }

    let unescaped = MARKUP_ESCAPE_RE.replace_all(&unwrapped, |caps: &Captures| {
        match &caps[0] {
            r"\textbackslash{}" => "\\".to_string(),
            r"\textasciitilde{}" => "~".to_string(),
            r"\textasciicircum{}" => "^".to_string(),
            r"\ldots{}" => "…".to_string(),
            r"\newline" | r"\par" => " ".to_string(),
            "$" => String::new(),
            _ => caps.get(1).map_or_else(String::new, |m| m.as_str().to_string()),
        }
    });

    WS_RE.replace_all(&unescaped, " ").trim().to_string()
}

fn translate_script(content: &str, map: fn(char) -> Option<char>) -> String {
    if content.contains('<') {
        return content.to_string();
    }
    content.chars().map(|c| map(c).unwrap_or(c)).collect()
}

fn subscript_char(c: char) -> Option<char> {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    let mapped = match c {
        '0'..='9' => DIGITS[(c as u8 - b'0') as usize],
        '+' => '₊',
        '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'h' => 'ₕ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'p' => 'ₚ',
        'r' => 'ᵣ',
        's' => 'ₛ',
        't' => 'ₜ',
        'u' => 'ᵤ',
        'v' => 'ᵥ',
        'x' => 'ₓ',
        _ => return None,
    };
    Some(mapped)
}

fn superscript_char(c: char) -> Option<char> {
    const DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
    let mapped = match c {
        '0'..='9' => DIGITS[(c as u8 - b'0') as usize],
        '+' => '⁺',
        '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        _ => return None,
    };
    Some(mapped)
}

// ─── Identifiers ────────────────────────────────────────────

/// Canonical DOI form: resolver prefix and trailing slash removed, lower-cased.
/// Does not validate; a malformed DOI from ORCID is kept as-is otherwise.
pub fn normalize_doi(raw: &str) -> String {
    let s = raw.trim();
    let lower = s.to_ascii_lowercase();
    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi.org/",
        "doi:",
    ];
    let stripped = prefixes
        .iter()
        .find(|p| lower.starts_with(*p))
        .map_or(lower.as_str(), |p| lower[p.len()..].trim_start());
    stripped.trim_end_matches('/').to_string()
}

/// Plain-text normalization of an optional field; `None` when nothing remains.
pub fn plain_field(raw: &str) -> Option<String> {
    let text = to_plain_text(raw);
    (!text.is_empty()).then_some(text)
}
