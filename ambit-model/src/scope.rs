use serde::{Deserialize, Serialize};

/// How a scope pattern is interpreted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Exact hostname or `*.suffix` wildcard-prefix match.
    Domain,
    /// Glob-style pattern over the hostname (`*` expands to `.*`).
    Wildcard,
    /// Regular expression over the raw target string.
    Regex,
    /// Network range. Carried for storage compatibility; never matches in
    /// string-based checks.
    Cidr,
}

/// Whether matching a rule pulls a target in or pushes it out of scope.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopeAction {
    Include,
    Exclude,
}

/// A single pattern from a program's scope definition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeRule {
    pub rule_type: RuleType,
    pub pattern: String,
    pub action: ScopeAction,
}

impl ScopeRule {
    pub fn include(rule_type: RuleType, pattern: impl Into<String>) -> Self {
        Self {
            rule_type,
            pattern: pattern.into(),
            action: ScopeAction::Include,
        }
    }

    pub fn exclude(rule_type: RuleType, pattern: impl Into<String>) -> Self {
        Self {
            rule_type,
            pattern: pattern.into(),
            action: ScopeAction::Exclude,
        }
    }
}

/// Emission-time filtering mode applied by the pipeline context.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// No scope checking at all.
    #[default]
    None,
    /// Publish only the in-scope subset.
    Strict,
    /// Boost in-scope targets; let high-confidence emissions through
    /// unfiltered when nothing matches scope.
    Confidence,
}
