//! Selection Policy
//!
//! The externally managed document that maps use cases to backend model
//! identifiers. A policy is an immutable snapshot: refreshes replace it
//! wholesale, they never mutate a loaded one.
//!
//! # Wire Schema
//!
//! ```json
//! {
//!   "primary_model": "eu.amazon.nova-lite-v1:0",
//!   "fallback_models": ["eu.amazon.nova-micro-v1:0"],
//!   "use_case_models": {
//!     "cost_optimized": "eu.amazon.nova-micro-v1:0",
//!     "accuracy_optimized": "eu.amazon.nova-pro-v1:0"
//!   }
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/// Use case applied when a request does not name one
pub const DEFAULT_USE_CASE: &str = "general";

/// Model selection policy snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Model used whenever no use-case mapping applies
    #[serde(default)]
    pub primary_model: String,

    /// Ranked alternates. Carried as configuration data only.
    #[serde(default)]
    pub fallback_models: Vec<String>,

    /// Use-case label to model identifier
    #[serde(default)]
    pub use_case_models: HashMap<String, String>,

    /// Evaluation scores that produced this policy, if it was generated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_scores: Vec<ModelScore>,
}

/// Aggregated evaluation scores for one model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_id: String,
    /// Mean latency in seconds
    pub latency: f64,
    /// Mean cosine similarity against the ground truth
    pub similarity_score: f64,
    /// Mean cost per request in USD
    pub cost: f64,
    pub latency_score: f64,
    pub similarity_score_normalized: f64,
    pub cost_score: f64,
    pub performance_score: f64,
    pub accuracy_score: f64,
    pub overall_score: f64,
    pub cost_score_weighted: f64,
}

impl SelectionPolicy {
    /// Create a policy with only a primary model
    pub fn new(primary_model: impl Into<String>) -> Self {
        Self {
            primary_model: primary_model.into(),
            ..Default::default()
        }
    }

    /// Add a use-case mapping
    #[must_use]
    pub fn with_use_case(mut self, use_case: impl Into<String>, model: impl Into<String>) -> Self {
        self.use_case_models.insert(use_case.into(), model.into());
        self
    }

    /// Set the ranked fallback list
    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_models = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a policy document
    ///
    /// # Errors
    ///
    /// Returns `RouterError::ConfigMalformed` if the bytes are not a JSON
    /// object of the policy schema or if `primary_model` is empty.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RouterError> {
        let policy: Self = serde_json::from_slice(bytes)
            .map_err(|e| RouterError::ConfigMalformed(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check the loaded-policy invariants
    ///
    /// # Errors
    ///
    /// Returns `RouterError::ConfigMalformed` if `primary_model` is blank.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.primary_model.trim().is_empty() {
            return Err(RouterError::ConfigMalformed(
                "primary_model must be a non-empty model identifier".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let doc = br#"{
            "primary_model": "m-default",
            "fallback_models": ["m-a", "m-b"],
            "use_case_models": {"cost_optimized": "m-cheap"}
        }"#;

        let policy = SelectionPolicy::from_json(doc).unwrap();
        assert_eq!(policy.primary_model, "m-default");
        assert_eq!(policy.fallback_models, vec!["m-a", "m-b"]);
        assert_eq!(
            policy.use_case_models.get("cost_optimized").map(String::as_str),
            Some("m-cheap")
        );
        assert!(policy.model_scores.is_empty());
    }

    #[test]
    fn test_optional_sections_default_to_empty() {
        let policy = SelectionPolicy::from_json(br#"{"primary_model": "m"}"#).unwrap();
        assert!(policy.fallback_models.is_empty());
        assert!(policy.use_case_models.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let doc = br#"{"primary_model": "m", "owner": "ml-platform", "version": 3}"#;
        assert!(SelectionPolicy::from_json(doc).is_ok());
    }

    #[test]
    fn test_missing_primary_is_malformed() {
        let err = SelectionPolicy::from_json(br#"{"use_case_models": {}}"#).unwrap_err();
        assert!(matches!(err, RouterError::ConfigMalformed(_)));

        let err = SelectionPolicy::from_json(br#"{"primary_model": "  "}"#).unwrap_err();
        assert!(matches!(err, RouterError::ConfigMalformed(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        for doc in [&b"not json"[..], b"[1,2,3]", b"", b"{\"primary_model\": 42}"] {
            let err = SelectionPolicy::from_json(doc).unwrap_err();
            assert_eq!(err.kind(), "config_malformed", "input: {doc:?}");
        }
    }

    #[test]
    fn test_scores_survive_serialization() {
        let mut policy = SelectionPolicy::new("m");
        policy.model_scores.push(ModelScore {
            model_id: "m".into(),
            latency: 1.5,
            similarity_score: 0.9,
            cost: 0.0001,
            latency_score: 1.0,
            similarity_score_normalized: 1.0,
            cost_score: 1.0,
            performance_score: 1.0,
            accuracy_score: 1.0,
            overall_score: 1.0,
            cost_score_weighted: 1.0,
        });

        let json = serde_json::to_vec(&policy).unwrap();
        assert_eq!(SelectionPolicy::from_json(&json).unwrap(), policy);
    }
}
