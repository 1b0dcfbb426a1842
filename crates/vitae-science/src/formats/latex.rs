//! LaTeX fragments meant to be `\input` into a CV document.

use std::fmt::Write as _;

use vitae_core::normalize::escape_markup;
use vitae_core::{DataEntry, DataGroup, DataSection, OrcidId};

use super::{AssembledEntry, CategoryGroup, RenderContext, total_count};

/// Publications grouped under one `\subsection` per non-empty category.
/// Empty input renders as an empty string.
pub fn render_publications(groups: &[CategoryGroup<'_>], ctx: &RenderContext<'_>) -> String {
    if total_count(groups) == 0 {
        return String::new();
    }

    let mut out = String::new();
    out.push_str("\\section{ORCID Publications}\n\n");
    push_orcid_line(&mut out, ctx.orcid);

    let counts: Vec<String> = groups
        .iter()
        .filter(|g| !g.entries.is_empty())
        .map(|g| format!("{} {} for the period considered", g.entries.len(), g.category.heading()))
        .collect();
    out.push_str("\\vspace{0.5em}\n\\noindent\n");
    out.push_str(&counts.join("\\\\\n"));
    out.push_str("\n\n");

    for group in groups.iter().filter(|g| !g.entries.is_empty()) {
        let _ = writeln!(out, "\\subsection{{{}}}", group.category.heading());
        out.push_str("\\begin{raggedright}\n\\begin{itemize}\n");
        for assembled in &group.entries {
            let _ = writeln!(out, "  \\item {}", publication_item(assembled));
        }
        out.push_str("\\end{itemize}\n\\end{raggedright}\n\n");
    }
    out
}

fn publication_item(assembled: &AssembledEntry<'_>) -> String {
    let e = assembled.entry;
    let mut item = String::new();

    if let Some(year) = e.year {
        let _ = write!(item, "{year}: ");
    }
    if let Some(authors) = &assembled.authors_short {
        let _ = write!(item, "{}, ", escape_markup(authors));
    }
    let title = e.title.markup.trim_end();
    if title.ends_with(['.', '?', '!']) {
        let _ = write!(item, "``{title}''");
    } else {
        let _ = write!(item, "``{title}.''");
    }

    let venue = e.venue.as_deref().map(|v| format!("\\textit{{{}}}", escape_markup(v)));
    let volume_issue = match (e.volume.as_deref(), e.issue.as_deref()) {
        (Some(volume), Some(issue)) => Some(format!("{}({})", escape_markup(volume), escape_markup(issue))),
        (Some(volume), None) => Some(escape_markup(volume)),
        (None, Some(issue)) => Some(format!("({})", escape_markup(issue))),
        (None, None) => None,
    };
    let source = match (venue, volume_issue) {
        (Some(venue), Some(vi)) => Some(format!("{venue} {vi}")),
        (Some(venue), None) => Some(venue),
        (None, Some(vi)) => Some(format!("Vol.~{vi}")),
        (None, None) => None,
    };
    let details: Vec<String> = source
        .into_iter()
        .chain(e.pages.as_deref().map(escape_markup))
        .collect();
    if !details.is_empty() {
        let _ = write!(item, " {}.", details.join(", "));
    }

    match (&e.doi, &assembled.doi_url) {
        (Some(doi), Some(url)) => {
            let _ = write!(
                item,
                "\\\\ \\href{{{}}}{{DOI:{}}}",
                sanitize_url(url),
                escape_markup(doi)
            );
        }
        _ => {
            if let Some(url) = e.url.as_deref().map(sanitize_url).filter(|u| !u.is_empty()) {
                let _ = write!(item, "\\\\ \\url{{{url}}}");
            }
        }
    }
    item
}

/// Biography, affiliations, fundings and identifiers, one `\subsection`
/// per non-empty section. Empty input renders as an empty string.
pub fn render_data(groups: &[DataGroup], ctx: &RenderContext<'_>) -> String {
    if groups.iter().all(|g| g.entries.is_empty()) {
        return String::new();
    }

    let mut out = String::new();
    out.push_str("\\section{ORCID Data}\n\n");
    push_orcid_line(&mut out, ctx.orcid);

    for group in groups.iter().filter(|g| !g.entries.is_empty()) {
        let _ = writeln!(out, "\\subsection{{{}}}", group.section.heading());

        if group.section == DataSection::Biography {
            for entry in &group.entries {
                if let Some(text) = &entry.text {
                    let _ = writeln!(out, "{}\n", text.markup);
                }
            }
            continue;
        }

        out.push_str("\\begin{itemize}\n");
        for entry in &group.entries {
            let _ = writeln!(out, "  \\item {}", data_item(group.section, entry));
        }
        out.push_str("\\end{itemize}\n\n");
    }
    out
}

fn data_item(section: DataSection, entry: &DataEntry) -> String {
    let esc = |field: &Option<String>| field.as_deref().map(escape_markup);
    let mut parts: Vec<String> = Vec::new();

    match section {
        DataSection::Funding => {
            if let Some(title) = &entry.text {
                parts.push(format!("``{}''", title.markup));
            }
            match (esc(&entry.organization), esc(&entry.kind)) {
                (Some(org), Some(kind)) => parts.push(format!("{org} ({kind})")),
                (Some(org), None) => parts.push(org),
                (None, Some(kind)) => parts.push(format!("({kind})")),
                (None, None) => {}
            }
        }
        DataSection::ExternalIdentifiers => {
            let kind = esc(&entry.kind).unwrap_or_default();
            let value = esc(&entry.value).unwrap_or_default();
            let link = entry.url.as_deref().map(sanitize_url).filter(|u| !u.is_empty());
            return match link {
                Some(url) => format!("{kind}: \\href{{{url}}}{{{value}}}"),
                None => format!("{kind}: {value}"),
            };
        }
        DataSection::Education => {
            match (esc(&entry.role), esc(&entry.department)) {
                (Some(role), Some(dept)) => parts.push(format!("{role} in {dept}")),
                (Some(one), None) | (None, Some(one)) => parts.push(one),
                (None, None) => {}
            }
            push_organization(&mut parts, entry);
        }
        _ => {
            parts.extend(esc(&entry.role));
            parts.extend(esc(&entry.department));
            push_organization(&mut parts, entry);
        }
    }

    parts.extend(entry.year_span());
    parts.join(", ")
}

fn push_organization(parts: &mut Vec<String>, entry: &DataEntry) {
    let org = entry.organization.as_deref().map(escape_markup);
    let location = entry.location.as_deref().map(escape_markup);
    match (org, location) {
        (Some(org), Some(loc)) => parts.push(format!("{org} ({loc})")),
        (Some(org), None) => parts.push(org),
        (None, Some(loc)) => parts.push(format!("({loc})")),
        (None, None) => {}
    }
}

fn push_orcid_line(out: &mut String, orcid: &OrcidId) {
    let _ = write!(
        out,
        "\\noindent\nORCID: \\href{{{}}}{{{orcid}}}\n\n",
        sanitize_url(&orcid.profile_url())
    );
}

/// Keep only http(s) URLs, with the characters that break `\href` removed.
pub fn sanitize_url(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("https://") || lower.starts_with("http://")) {
        return String::new();
    }
    url.chars().filter(|c| !matches!(c, '\\' | '{' | '}')).collect()
}
