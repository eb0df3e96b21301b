//! Parsers for free text returned by text-generation collaborators.
//!
//! Every parser has a strict `parse` that reports failure, and can be wrapped
//! in [`WithFallback`] to get the fixed-safe default instead of an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Decision, TroupeError};

pub const UNPARSEABLE_FEEDBACK: &str = "unparseable review";
pub const FALLBACK_SCORE: f64 = 5.0;

pub trait OutputParser<T>: Send + Sync {
    fn parse(&self, text: &str) -> Result<T, TroupeError>;

    fn with_fallback(self, fallback: T) -> WithFallback<Self, T>
    where
        Self: Sized,
    {
        WithFallback {
            parser: self,
            fallback,
        }
    }
}

/// Returns `fallback` whenever the wrapped parser fails.
#[derive(Clone, Debug)]
pub struct WithFallback<P, T> {
    parser: P,
    fallback: T,
}

impl<P, T> WithFallback<P, T>
where
    P: OutputParser<T>,
    T: Clone,
{
    pub fn parse(&self, text: &str) -> T {
        match self.parser.parse(text) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "collaborator output not parseable, using fallback");
                self.fallback.clone()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    #[default]
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScoredReview {
    pub score: f64,
    pub feedback: String,
}

impl ScoredReview {
    pub fn fallback() -> Self {
        Self {
            score: FALLBACK_SCORE,
            feedback: UNPARSEABLE_FEEDBACK.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StatusReview {
    pub verdict: Verdict,
    pub critique: String,
}

impl StatusReview {
    pub fn fallback() -> Self {
        Self {
            verdict: Verdict::Fail,
            critique: UNPARSEABLE_FEEDBACK.to_string(),
        }
    }
}

fn parse_failed(output: &str, reason: impl Into<String>) -> TroupeError {
    TroupeError::ParseFailed {
        output: output.to_string(),
        reason: reason.into(),
    }
}

/// Parses `"<score>/<feedback>"`. The score may carry a unit suffix such as
/// `"7점"` or `"7 points"`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreFeedbackParser;

impl OutputParser<ScoredReview> for ScoreFeedbackParser {
    fn parse(&self, text: &str) -> Result<ScoredReview, TroupeError> {
        let (raw_score, feedback) = text
            .split_once('/')
            .ok_or_else(|| parse_failed(text, "missing '/' separator"))?;
        let numeric: String = raw_score
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        let score: f64 = numeric
            .parse()
            .map_err(|_| parse_failed(text, format!("score '{}' is not a number", raw_score.trim())))?;
        if !score.is_finite() {
            return Err(parse_failed(text, "score is not finite"));
        }
        Ok(ScoredReview {
            score,
            feedback: feedback.trim().to_string(),
        })
    }
}

/// First line carries the verdict (`PASS` anywhere in it means pass); the
/// critique is the whole text.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusLineParser;

impl OutputParser<StatusReview> for StatusLineParser {
    fn parse(&self, text: &str) -> Result<StatusReview, TroupeError> {
        let trimmed = text.trim();
        let first_line = trimmed
            .lines()
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or_else(|| parse_failed(text, "empty review"))?;
        let verdict = if first_line.contains("PASS") {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        Ok(StatusReview {
            verdict,
            critique: trimmed.to_string(),
        })
    }
}

/// `PASS` anywhere in the text means pass; anything else fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordVerdictParser;

impl OutputParser<Verdict> for KeywordVerdictParser {
    fn parse(&self, text: &str) -> Result<Verdict, TroupeError> {
        Ok(if text.contains("PASS") {
            Verdict::Pass
        } else {
            Verdict::Fail
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let cleaned = text.trim();
    if cleaned.starts_with("```json") {
        cleaned
            .trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
    } else if cleaned.starts_with("```") {
        cleaned
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        cleaned
    }
}

/// Parses a JSON payload, tolerating a surrounding markdown code fence.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonOutputParser;

impl<T: DeserializeOwned> OutputParser<T> for JsonOutputParser {
    fn parse(&self, text: &str) -> Result<T, TroupeError> {
        serde_json::from_str(strip_code_fence(text)).map_err(|err| parse_failed(text, err.to_string()))
    }
}

/// Parses `{"next": [...], "reasoning": "..."}` into a [`Decision`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DecisionParser;

impl OutputParser<Decision> for DecisionParser {
    fn parse(&self, text: &str) -> Result<Decision, TroupeError> {
        let decision: Decision = JsonOutputParser.parse(text)?;
        if decision.targets.is_empty() {
            return Err(parse_failed(text, "decision names no target"));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_feedback_parses_unit_suffix() {
        let review = ScoreFeedbackParser.parse("6.5점/examples are thin").unwrap();
        assert_eq!(review.score, 6.5);
        assert_eq!(review.feedback, "examples are thin");
    }

    #[test]
    fn score_feedback_keeps_slashes_in_feedback() {
        let review = ScoreFeedbackParser.parse("9/use a/b testing").unwrap();
        assert_eq!(review.score, 9.0);
        assert_eq!(review.feedback, "use a/b testing");
    }

    #[test]
    fn score_feedback_falls_back_on_garbage() {
        let parser = ScoreFeedbackParser.with_fallback(ScoredReview::fallback());
        assert_eq!(parser.parse("looks great"), ScoredReview::fallback());
        assert_eq!(parser.parse("great/but no score"), ScoredReview::fallback());
    }

    #[test]
    fn status_line_reads_first_line_only() {
        let review = StatusLineParser
            .parse("status: FAIL\nfeedback: PASS the linter first")
            .unwrap();
        assert_eq!(review.verdict, Verdict::Fail);
        assert!(review.critique.contains("linter"));

        let review = StatusLineParser.parse("status: PASS\nfeedback: fine").unwrap();
        assert!(review.verdict.is_pass());
    }

    #[test]
    fn status_line_empty_text_uses_fallback() {
        let parser = StatusLineParser.with_fallback(StatusReview::fallback());
        let review = parser.parse("   ");
        assert_eq!(review.verdict, Verdict::Fail);
        assert_eq!(review.critique, UNPARSEABLE_FEEDBACK);
    }

    #[test]
    fn keyword_verdict() {
        assert_eq!(KeywordVerdictParser.parse("PASS").unwrap(), Verdict::Pass);
        assert_eq!(KeywordVerdictParser.parse("fail, thin").unwrap(), Verdict::Fail);
    }

    #[test]
    fn decision_parser_accepts_fenced_json() {
        let text = "```json\n{\"next\": [\"research_subgraph\", \"code_subgraph\"], \"reasoning\": \"both needed\"}\n```";
        let decision = DecisionParser.parse(text).unwrap();
        assert_eq!(decision.targets, vec!["research_subgraph", "code_subgraph"]);
        assert_eq!(decision.rationale, "both needed");
    }

    #[test]
    fn decision_parser_rejects_empty_and_malformed() {
        assert!(matches!(
            DecisionParser.parse(r#"{"next": []}"#),
            Err(TroupeError::ParseFailed { .. })
        ));
        assert!(DecisionParser.parse("call the writer").is_err());
    }
}
