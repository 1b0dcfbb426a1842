use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::SecondsFormat;

use super::{CategoryGroup, RenderContext, total_count};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Render every publication as one BibTeX record. Empty input renders as an
/// empty string.
pub fn render_publications(groups: &[CategoryGroup<'_>], ctx: &RenderContext<'_>) -> String {
    let total = total_count(groups);
    if total == 0 {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "% BibTeX export from ORCID record: {}", ctx.orcid);
    let _ = writeln!(
        out,
        "% Generated: {}",
        ctx.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "% Source: {}", ctx.orcid.profile_url());
    let _ = writeln!(out, "% Entries: {total}");
    out.push_str("%\n");

    let mut keys = CiteKeys::default();
    for assembled in groups.iter().flat_map(|g| &g.entries) {
        let e = assembled.entry;
        let key = keys.next(e.authors.first().map(String::as_str), e.year);

        let mut fields: Vec<(&str, String)> = Vec::new();
        if !e.authors.is_empty() {
            let authors: Vec<String> = e.authors.iter().map(|a| bibtex_name(a)).collect();
            fields.push(("author", braced(&escape_bibtex(&authors.join(" and ")))));
        }
        fields.push(("title", format!("{{{{{}}}}}", escape_bibtex(&e.title.plain))));
        if let Some(venue) = &e.venue {
            fields.push((assembled.venue_field, braced(&escape_bibtex(venue))));
        }
        if let Some(year) = e.year {
            fields.push(("year", braced(&year.to_string())));
        }
        if let Some(month) = e.month.and_then(|m| MONTHS.get(usize::from(m).checked_sub(1)?)) {
            fields.push(("month", (*month).to_string()));
        }
        for (name, value) in [
            ("volume", &e.volume),
            ("number", &e.issue),
            ("pages", &e.pages),
            ("publisher", &e.publisher),
        ] {
            if let Some(value) = value {
                fields.push((name, braced(&escape_bibtex(value))));
            }
        }
        if let Some(doi) = &e.doi {
            fields.push(("doi", braced(doi)));
        }
        if let Some(url) = &e.url {
            fields.push(("url", braced(url)));
        }
        for id_type in ["isbn", "issn"] {
            if let Some(value) = e.external_ids.get(id_type) {
                fields.push((id_type, braced(value)));
            }
        }
        if let Some(abstract_text) = &e.abstract_text {
            fields.push(("abstract", braced(&escape_bibtex(abstract_text))));
        }

        let body: Vec<String> = fields
            .into_iter()
            .map(|(name, value)| format!("  {name} = {value}"))
            .collect();
        let _ = write!(out, "\n@{}{{{key},\n{}\n}}\n", assembled.record_type, body.join(",\n"));
    }
    out
}

fn braced(value: &str) -> String {
    format!("{{{value}}}")
}

/// Escape LaTeX specials in plain text and drop braces, which would
/// unbalance the field delimiters.
pub fn escape_bibtex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' | '}' => {}
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// `"Ada King Lovelace"` → `"Lovelace, Ada King"`.
fn bibtex_name(name: &str) -> String {
    if name.contains(',') {
        return name.trim().to_string();
    }
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.split_last() {
        Some((last, given)) if !given.is_empty() => format!("{last}, {}", given.join(" ")),
        _ => name.trim().to_string(),
    }
}

fn last_name(name: &str) -> &str {
    match name.split_once(',') {
        Some((last, _)) => last.trim(),
        None => name.split_whitespace().last().unwrap_or(""),
    }
}

/// Issues `LastnameYear` keys, suffixing repeats with `a`, `b`, ...
#[derive(Default)]
struct CiteKeys {
    seen: HashMap<String, usize>,
}

impl CiteKeys {
    fn next(&mut self, first_author: Option<&str>, year: Option<i32>) -> String {
        let mut name: String = first_author
            .map(last_name)
            .unwrap_or("")
            .chars()
            .filter_map(ascii_fold)
            .filter(char::is_ascii_alphabetic)
            .collect();
        if name.is_empty() {
            name = "Unknown".to_string();
        }
        let base = match year {
            Some(year) => format!("{name}{year}"),
            None => format!("{name}NoYear"),
        };

        let repeats = self.seen.entry(base.clone()).or_insert(0);
        let key = match *repeats {
            0 => base,
            n => format!("{base}{}", alpha_suffix(n - 1)),
        };
        *repeats += 1;
        key
    }
}

/// `0` → `a`, `25` → `z`, `26` → `aa`.
fn alpha_suffix(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn ascii_fold(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let folded = match c {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'Ç' | 'Ć' | 'Č' => 'C',
        'ç' | 'ć' | 'č' => 'c',
        'Ď' | 'Đ' => 'D',
        'ď' | 'đ' => 'd',
        'È'..='Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'è'..='ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'Ğ' => 'G',
        'ğ' => 'g',
        'Ì'..='Ï' | 'Ī' | 'İ' => 'I',
        'ì'..='ï' | 'ī' | 'ı' => 'i',
        'Ł' => 'L',
        'ł' => 'l',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ő' => 'O',
        'ò'..='ö' | 'ø' | 'ō' | 'ő' => 'o',
        'Ř' => 'R',
        'ř' => 'r',
        'Ś' | 'Š' | 'Ş' => 'S',
        'ś' | 'š' | 'ş' | 'ß' => 's',
        'Ť' | 'Ţ' => 'T',
        'ť' | 'ţ' => 't',
        'Ù'..='Ü' | 'Ū' | 'Ů' | 'Ű' => 'U',
        'ù'..='ü' | 'ū' | 'ů' | 'ű' => 'u',
        'Ý' | 'Ÿ' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        'ź' | 'ż' | 'ž' => 'z',
        _ => return None,
    };
    Some(folded)
}
