//! Model Selector
//!
//! Maps a use-case label to a model identifier. Exact, case-sensitive match
//! against `use_case_models`; anything else lands on `primary_model`.
//! Unknown labels are not an error.

use super::policy::SelectionPolicy;

/// Select the model that should serve `use_case`
#[must_use]
pub fn select_model<'a>(policy: &'a SelectionPolicy, use_case: &str) -> &'a str {
    policy
        .use_case_models
        .get(use_case)
        .map_or(policy.primary_model.as_str(), String::as_str)
}
