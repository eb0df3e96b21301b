//! Pipeline tuning knobs.
//!
//! Defaults reproduce the bounds the pipelines were designed around. Every
//! value can be overridden from the environment:
//!
//! - `TROUPE_RESEARCH_RETRY_BOUND`: follow-up searches before summarising
//! - `TROUPE_WRITER_PASS_SCORE`: score at which a draft is accepted
//! - `TROUPE_WRITER_REVISION_BOUND`: drafts written before giving up
//! - `TROUPE_REVIEW_RETRY_BOUND`: code/design revisions before giving up
//! - `TROUPE_FALLBACK_SCORE`: score assumed when a review cannot be parsed
//! - `TROUPE_ARTIFACT_DIR`: where step artifacts are written

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub research_retry_bound: u32,
    pub writer_pass_score: f64,
    pub writer_revision_bound: u32,
    pub review_retry_bound: u32,
    pub fallback_score: f64,
    pub artifact_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            research_retry_bound: 1,
            writer_pass_score: 8.5,
            writer_revision_bound: 3,
            review_retry_bound: 3,
            fallback_score: troupe_core::output_parsers::FALLBACK_SCORE,
            artifact_dir: None,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| PipelineError::InvalidSetting {
            key,
            value,
            reason: err.to_string(),
        })
}

impl PipelineConfig {
    /// Defaults overlaid with `TROUPE_*` environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TROUPE_RESEARCH_RETRY_BOUND") {
            self.research_retry_bound = parse("TROUPE_RESEARCH_RETRY_BOUND", value)?;
        }
        if let Some(value) = lookup("TROUPE_WRITER_PASS_SCORE") {
            self.writer_pass_score = parse("TROUPE_WRITER_PASS_SCORE", value)?;
        }
        if let Some(value) = lookup("TROUPE_WRITER_REVISION_BOUND") {
            self.writer_revision_bound = parse("TROUPE_WRITER_REVISION_BOUND", value)?;
        }
        if let Some(value) = lookup("TROUPE_REVIEW_RETRY_BOUND") {
            self.review_retry_bound = parse("TROUPE_REVIEW_RETRY_BOUND", value)?;
        }
        if let Some(value) = lookup("TROUPE_FALLBACK_SCORE") {
            self.fallback_score = parse("TROUPE_FALLBACK_SCORE", value)?;
        }
        if let Some(value) = lookup("TROUPE_ARTIFACT_DIR") {
            if !value.trim().is_empty() {
                self.artifact_dir = Some(PathBuf::from(value.trim()));
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (key, score) in [
            ("TROUPE_WRITER_PASS_SCORE", self.writer_pass_score),
            ("TROUPE_FALLBACK_SCORE", self.fallback_score),
        ] {
            if !score.is_finite() {
                return Err(PipelineError::InvalidSetting {
                    key,
                    value: score.to_string(),
                    reason: "score must be finite".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_designed_bounds() {
        let config = PipelineConfig::default();
        assert_eq!(config.research_retry_bound, 1);
        assert_eq!(config.writer_pass_score, 8.5);
        assert_eq!(config.writer_revision_bound, 3);
        assert_eq!(config.review_retry_bound, 3);
        assert_eq!(config.fallback_score, 5.0);
        assert!(config.artifact_dir.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(lookup(&[
                ("TROUPE_WRITER_PASS_SCORE", "9"),
                ("TROUPE_REVIEW_RETRY_BOUND", " 5 "),
                ("TROUPE_ARTIFACT_DIR", "runs"),
            ]))
            .unwrap();
        assert_eq!(config.writer_pass_score, 9.0);
        assert_eq!(config.review_retry_bound, 5);
        assert_eq!(config.artifact_dir, Some(PathBuf::from("runs")));
        assert_eq!(config.research_retry_bound, 1);
    }

    #[test]
    fn unparseable_override_names_the_variable() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(lookup(&[("TROUPE_WRITER_REVISION_BOUND", "three")]))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidSetting { key: "TROUPE_WRITER_REVISION_BOUND", .. }
        ));
    }

    #[test]
    fn non_finite_score_is_rejected() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(lookup(&[("TROUPE_FALLBACK_SCORE", "NaN")]))
            .unwrap_err();
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"writer_revision_bound": 1}"#).unwrap();
        assert_eq!(config.writer_revision_bound, 1);
        assert_eq!(config.writer_pass_score, 8.5);
    }
}
