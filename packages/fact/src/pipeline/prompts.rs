//! Oracle prompts and reply parsing.
//!
//! The exact wording is not part of any contract; the reply shapes are.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{OracleError, OracleResult};
use crate::traits::ai::{ExtractedClaim, Judgment, Support};

/// System prompt for claim extraction.
pub const EXTRACT_CLAIMS_SYSTEM: &str = r#"You extract checkable factual claims from research reports.

A claim is a single statement that could be verified against a source: a number, a date, an event, a quoted finding, an attribution. Split compound sentences into separate claims. Skip opinions, recommendations and transitions.

For every claim, list the citation markers attached to it exactly as they appear in the report (for example "[3]", "[1, 4]" or an inline URL). A claim without markers gets an empty list.

Output JSON only:
{
    "claims": [
        {"statement": "claim text without markers", "citations": ["[1]"]}
    ]
}"#;

/// User prompt for claim extraction.
pub const EXTRACT_CLAIMS_PROMPT: &str = r#"Report language: {language}

Research question:
{query}

Report:
{report}"#;

/// System prompt for judging a claim against evidence.
pub const JUDGE_SYSTEM: &str = r#"You check whether a source substantiates a claim.

Answer "supported" only if the source text states the claim or something that directly entails it. Answer "unsupported" if the source contradicts the claim, does not mention it, or only covers part of it.

Output JSON only:
{"verdict": "supported" | "unsupported", "reason": "one sentence"}"#;

/// User prompt for judging a claim against evidence.
pub const JUDGE_PROMPT: &str = r#"Claim:
{claim}

Source text:
{evidence}"#;

/// Format the extraction prompt for one report.
pub fn format_extract_prompt(query: &str, report: &str, language: &str) -> String {
    let query = if query.trim().is_empty() {
        "(not provided)"
    } else {
        query
    };
    EXTRACT_CLAIMS_PROMPT
        .replace("{language}", language)
        .replace("{query}", query)
        .replace("{report}", report)
}

/// Format the judging prompt for one pair.
pub fn format_judge_prompt(claim: &str, evidence: &str) -> String {
    JUDGE_PROMPT
        .replace("{claim}", claim)
        .replace("{evidence}", evidence)
}

/// Parse JSON from a reply that may wrap it in a code fence or prose.
fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, String> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let start = unfenced.find(|c: char| c == '{' || c == '[');
    let end = unfenced.rfind(|c: char| c == '}' || c == ']');
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str(&unfenced[start..=end]).map_err(|e| e.to_string())
        }
        _ => Err("no JSON object in reply".to_string()),
    }
}

/// Parse the claim-extraction reply: `{"claims": [...]}` or a bare array.
pub fn parse_claims_reply(reply: &str) -> OracleResult<Vec<ExtractedClaim>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ClaimsReply {
        Wrapped {
            #[serde(alias = "facts", alias = "statements")]
            claims: Vec<ExtractedClaim>,
        },
        Bare(Vec<ExtractedClaim>),
    }

    let parsed: ClaimsReply = parse_json_reply(reply).map_err(OracleError::Parse)?;
    let claims = match parsed {
        ClaimsReply::Wrapped { claims } | ClaimsReply::Bare(claims) => claims,
    };

    Ok(claims
        .into_iter()
        .filter(|c| !c.statement.trim().is_empty())
        .collect())
}

fn parse_support(word: &str) -> Option<Support> {
    let normalized = word
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
        .replace(|c: char| c == ' ' || c == '-', "_");
    match normalized.as_str() {
        "supported" | "support" | "supports" | "yes" | "true" => Some(Support::Supported),
        "unsupported" | "not_supported" | "contradicted" | "refuted" | "no" | "false" => {
            Some(Support::Unsupported)
        }
        _ => None,
    }
}

/// Parse the judging reply: `{"verdict": ..., "reason": ...}`, or a bare verdict word.
pub fn parse_judgment_reply(reply: &str) -> OracleResult<Judgment> {
    #[derive(Deserialize)]
    struct JudgmentReply {
        #[serde(alias = "result", alias = "label", alias = "answer")]
        verdict: serde_json::Value,
        #[serde(default, alias = "explanation", alias = "reasoning")]
        reason: String,
    }

    match parse_json_reply::<JudgmentReply>(reply) {
        Ok(parsed) => {
            let support = match &parsed.verdict {
                serde_json::Value::String(s) => parse_support(s),
                serde_json::Value::Bool(true) => Some(Support::Supported),
                serde_json::Value::Bool(false) => Some(Support::Unsupported),
                _ => None,
            }
            .ok_or_else(|| OracleError::Parse(format!("unknown verdict: {}", parsed.verdict)))?;
            Ok(Judgment {
                support,
                reason: parsed.reason.trim().to_string(),
            })
        }
        Err(json_error) => parse_support(reply)
            .map(|support| Judgment {
                support,
                reason: String::new(),
            })
            .ok_or(OracleError::Parse(json_error)),
    }
}
