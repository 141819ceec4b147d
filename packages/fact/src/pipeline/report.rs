//! Report pre-processing: formatting cleanup and reference-list parsing.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::types::claim::Source;

fn line_number_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*\d+→").expect("line number pattern is valid"))
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^<>]*)?/?>").expect("html tag pattern is valid")
    })
}

/// Emphasis markers, or a URL that must pass through untouched.
fn emphasis_or_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+|\*\*|__").expect("emphasis pattern is valid"))
}

fn strip_emphasis(caps: &Captures<'_>) -> String {
    let matched = &caps[0];
    if matched.starts_with("http") {
        // Closing bold around a URL is not part of it.
        matched.trim_end_matches('*').to_string()
    } else {
        String::new()
    }
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}").expect("blank line pattern is valid"))
}

/// Strip formatting artifacts before the report goes to the oracle:
/// line-number prefixes (`12→`), HTML tags, bold/underline emphasis and runs
/// of blank lines.
pub fn clean_report(body: &str) -> String {
    let text = body.replace("\r\n", "\n");
    let text = line_number_prefix().replace_all(&text, "");
    let text = html_tag().replace_all(&text, "");
    let text = emphasis_or_url().replace_all(&text, strip_emphasis);
    let text = blank_runs().replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn bracketed_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*]\s*)?(?:\[\^?(\d+)\]|【(\d+)】)\s*:?\s*(.*)$")
            .expect("reference entry pattern is valid")
    })
}

fn numbered_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)[.)]\s+(.*)$").expect("numbered entry pattern is valid"))
}

fn reference_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:#+\s*)?(?:references|sources|bibliography|citations|works cited|参考文献|参考资料|引用|来源)\s*:?\s*$")
            .expect("reference heading pattern is valid")
    })
}

fn markdown_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]*)\]\((https?://[^\s)]+(?:\([^\s)]*\))?[^\s)]*)\)")
            .expect("markdown link pattern is valid")
    })
}

fn bare_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'）】]+"#).expect("bare URL pattern is valid"))
}

/// Parse the report's own reference list into a marker→source table.
///
/// Recognised anywhere in the report: `[1] Title https://…`, `[1]: https://…`,
/// `【1】 https://…`. After a heading such as "References" or "参考文献",
/// plain numbered entries (`1. [Title](https://…)`) are recognised too. The
/// first definition of a marker wins.
pub fn parse_references(body: &str) -> BTreeMap<String, Source> {
    let mut references = BTreeMap::new();
    let mut in_reference_section = false;

    for line in body.lines() {
        if reference_heading().is_match(line) {
            in_reference_section = true;
            continue;
        }

        let entry = if let Some(caps) = bracketed_entry().captures(line) {
            let marker = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            marker.zip(caps.get(3).map(|m| m.as_str()))
        } else if in_reference_section {
            numbered_entry()
                .captures(line)
                .and_then(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        } else {
            None
        };

        let Some((marker, rest)) = entry else {
            continue;
        };
        let Some(source) = parse_entry(rest) else {
            continue;
        };
        let marker = marker.trim_start_matches('0');
        let marker = if marker.is_empty() { "0" } else { marker };
        references.entry(marker.to_string()).or_insert(source);
    }

    references
}

fn parse_entry(rest: &str) -> Option<Source> {
    if let Some(caps) = markdown_link().captures(rest) {
        let url = caps.get(2)?.as_str().to_string();
        let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let source = Source::new(url);
        return Some(if title.is_empty() {
            source
        } else {
            source.with_title(title)
        });
    }

    let found = bare_url().find(rest)?;
    let url = found
        .as_str()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | ')'))
        .to_string();

    let title = rest[..found.start()]
        .trim()
        .trim_end_matches(|c: char| matches!(c, '-' | '–' | ':' | ',' | '.' | '(' | '<'))
        .trim()
        .trim_matches('"');
    let source = Source::new(url);
    Some(if title.is_empty() {
        source
    } else {
        source.with_title(title)
    })
}
