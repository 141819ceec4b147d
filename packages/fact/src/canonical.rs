//! Canonical forms for source URLs, claim text and citation markers.
//!
//! Every function here is a fixed point: applying it to its own output
//! returns the same value. Deduplication keys are built from these forms,
//! so the Deduplicator is idempotent only as long as that holds.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Query parameters that identify a campaign or referrer, not content.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src", "spm", "_ga",
];

/// Ranges wider than this are treated as text, not expanded.
const MAX_RANGE_SPAN: u32 = 50;

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Passes after which a URL that still changes is returned as-is.
const MAX_CANONICAL_PASSES: usize = 8;

/// Canonical source URL, or `None` when `raw` is not a usable web address.
///
/// Scheme forced to https, host lower-cased, default port and fragment
/// dropped, tracking parameters removed, remaining parameters sorted,
/// trailing path slash removed.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut current = canonical_pass(raw)?;
    // Sorting the query or dropping a trailing slash can leave punctuation at
    // the end that the next pass would trim.
    for _ in 0..MAX_CANONICAL_PASSES {
        match canonical_pass(&current) {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    Some(current)
}

fn canonical_pass(raw: &str) -> Option<String> {
    let trimmed = trim_url_punctuation(raw);
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).ok()?;
    match url.scheme() {
        "https" => {}
        "http" => url.set_scheme("https").ok()?,
        _ => return None,
    }
    if url.host_str().map_or(true, str::is_empty)
        || !url.username().is_empty()
        || url.password().is_some()
    {
        return None;
    }
    if url.port() == Some(443) {
        url.set_port(None).ok()?;
    }
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed_path = path.trim_end_matches('/');
        url.set_path(if trimmed_path.is_empty() { "/" } else { trimmed_path });
    }

    let mut canonical = url.to_string();
    if url.path() == "/" && url.query().is_none() && canonical.ends_with('/') {
        canonical.pop();
    }
    Some(canonical)
}

/// Strip wrapping brackets, quotes and sentence punctuation around a URL.
/// A closing parenthesis is kept when it balances one inside the URL.
fn trim_url_punctuation(raw: &str) -> &str {
    let mut s = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, '<' | '"' | '\'' | '('));
    loop {
        let before = s.len();
        s = s.trim_end_matches(|c: char| matches!(c, '>' | '"' | '\'' | '.' | ',' | ';' | ':'));
        if s.ends_with(')') && s.matches(')').count() > s.matches('(').count() {
            s = &s[..s.len() - 1];
        }
        if s.len() == before {
            return s;
        }
    }
}

fn inline_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\s*\^?\d+(?:\s*[,，;\-–]\s*\d+)*\s*\]|【\s*\d+(?:\s*[,，\-–]\s*\d+)*\s*】")
            .expect("inline marker pattern is valid")
    })
}

/// Canonical claim text.
///
/// Unicode whitespace collapsed, curly quotes straightened, inline citation
/// markers removed, trailing sentence punctuation stripped.
pub fn canonicalize_claim(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            c if c.is_whitespace() => ' ',
            c => c,
        })
        .collect();

    // Removing one marker can expose another ("[[1]2]").
    while inline_marker().is_match(&text) {
        text = inline_marker().replace_all(&text, " ").into_owned();
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| {
            c == ' ' || matches!(c, '.' | '。' | '!' | '！' | ';' | '；' | ',' | '，' | ':' | '：')
        })
        .to_string()
}

/// A citation marker after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerRef {
    /// Numbered entry in the report's reference list
    Reference(String),
    /// The marker is a URL and is its own source
    Url(String),
    /// Nothing we can resolve
    Unparseable(String),
}

fn embedded_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s<>"'\]\)）】，。]+"#).expect("embedded URL pattern is valid")
    })
}

/// Parse a raw marker into the references it names.
///
/// `[1]`, `1`, `[ 1 ]`, `【1】` and `^1` all name reference `1`; `[1, 3]`
/// names two references and `[2-4]` names three. A marker containing a URL
/// names that URL.
pub fn parse_marker(raw: &str) -> Vec<MarkerRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(found) = embedded_url().find(trimmed) {
        return vec![MarkerRef::Url(found.as_str().to_string())];
    }

    let inner: String = trimmed
        .chars()
        .filter(|&c| !matches!(c, '[' | ']' | '【' | '】' | '(' | ')' | '^' | '#'))
        .collect();

    let mut refs = Vec::new();
    for part in inner.split(|c: char| matches!(c, ',' | '，' | ';' | '；')) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.chars().all(|c| c.is_ascii_digit()) {
            refs.push(MarkerRef::Reference(normalize_number(part)));
            continue;
        }
        match expand_range(part) {
            Some(range) => refs.extend(range.into_iter().map(MarkerRef::Reference)),
            None => refs.push(MarkerRef::Unparseable(part.to_string())),
        }
    }
    refs
}

fn normalize_number(digits: &str) -> String {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

fn expand_range(part: &str) -> Option<Vec<String>> {
    let (start, end) = part.split_once(|c: char| matches!(c, '-' | '–' | '—' | '~'))?;
    let start: u32 = start.trim().parse().ok()?;
    let end: u32 = end.trim().parse().ok()?;
    if end < start || end - start > MAX_RANGE_SPAN {
        return None;
    }
    Some((start..=end).map(|n| n.to_string()).collect())
}
