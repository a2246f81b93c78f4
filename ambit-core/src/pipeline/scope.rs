//! Pure scope classification against a program's rule list.
//!
//! Exclude rules veto first. If the rule set has no include rules, every
//! non-excluded target passes; otherwise a target must match at least one
//! include rule. An empty rule set means everything is in scope.

use regex::Regex;
use tracing::debug;
use url::Url;

use ambit_model::{RuleType, ScopeAction, ScopeRule};

/// Partition `targets` into `(in_scope, out_of_scope)`, preserving order.
pub fn filter_in_scope(targets: &[String], rules: &[ScopeRule]) -> (Vec<String>, Vec<String>) {
    let mut in_scope = Vec::new();
    let mut out_of_scope = Vec::new();

    for target in targets {
        if is_in_scope(target, rules) {
            in_scope.push(target.clone());
        } else {
            out_of_scope.push(target.clone());
        }
    }

    (in_scope, out_of_scope)
}

pub fn is_in_scope(target: &str, rules: &[ScopeRule]) -> bool {
    if rules.is_empty() {
        return true;
    }

    let Some(domain) = hostname(target) else {
        debug!(target, "target has no parseable hostname; out of scope");
        return false;
    };

    for rule in rules {
        if rule.action == ScopeAction::Exclude && matches_rule(target, &domain, rule) {
            return false;
        }
    }

    let has_includes = rules.iter().any(|r| r.action == ScopeAction::Include);
    if !has_includes {
        return true;
    }

    rules
        .iter()
        .filter(|r| r.action == ScopeAction::Include)
        .any(|rule| matches_rule(target, &domain, rule))
}

/// Hostname of a target that may or may not carry a scheme.
fn hostname(target: &str) -> Option<String> {
    let candidate = if target.starts_with("http://") || target.starts_with("https://") {
        target.to_owned()
    } else {
        format!("http://{target}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
}

fn matches_rule(target: &str, domain: &str, rule: &ScopeRule) -> bool {
    match rule.rule_type {
        RuleType::Domain => {
            if let Some(base) = rule.pattern.strip_prefix("*.") {
                domain == base || domain.ends_with(&format!(".{base}"))
            } else {
                domain == rule.pattern
            }
        }
        RuleType::Wildcard => {
            let pattern = rule.pattern.replace('.', r"\.").replace('*', ".*");
            match Regex::new(&format!("^{pattern}$")) {
                Ok(re) => re.is_match(domain),
                Err(_) => false,
            }
        }
        RuleType::Regex => match Regex::new(&rule.pattern) {
            Ok(re) => re.is_match(target),
            // A bad pattern is a data problem, not a matching result.
            Err(_) => false,
        },
        RuleType::Cidr => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn include_domain(pattern: &str) -> ScopeRule {
        ScopeRule::include(RuleType::Domain, pattern)
    }

    #[test]
    fn empty_rule_set_passes_everything() {
        assert!(is_in_scope("anything.example.com", &[]));
    }

    #[test]
    fn domain_rule_matches_exact_and_wildcard_prefix() {
        let rules = [include_domain("*.example.com")];
        assert!(is_in_scope("example.com", &rules));
        assert!(is_in_scope("api.example.com", &rules));
        assert!(is_in_scope("deep.api.example.com", &rules));
        assert!(!is_in_scope("example.org", &rules));
        assert!(!is_in_scope("notexample.com", &rules));

        let exact = [include_domain("example.com")];
        assert!(is_in_scope("example.com", &exact));
        assert!(!is_in_scope("api.example.com", &exact));
    }

    #[test]
    fn url_targets_are_matched_by_hostname() {
        let rules = [include_domain("*.example.com")];
        assert!(is_in_scope("https://api.example.com/v1/users", &rules));
        assert!(!is_in_scope("https://evil.com/?q=example.com", &rules));
    }

    #[test]
    fn exclude_rules_veto_before_includes() {
        let rules = [
            include_domain("*.example.com"),
            ScopeRule::exclude(RuleType::Domain, "internal.example.com"),
        ];
        assert!(is_in_scope("api.example.com", &rules));
        assert!(!is_in_scope("internal.example.com", &rules));
    }

    #[test]
    fn exclude_only_rule_sets_pass_everything_else() {
        let rules = [ScopeRule::exclude(RuleType::Domain, "blocked.net")];
        assert!(is_in_scope("anything.example.com", &rules));
        assert!(!is_in_scope("blocked.net", &rules));
    }

    #[test]
    fn wildcard_rule_globs_over_the_hostname() {
        let rules = [ScopeRule::include(RuleType::Wildcard, "dev-*.example.com")];
        assert!(is_in_scope("dev-01.example.com", &rules));
        assert!(!is_in_scope("prod.example.com", &rules));
    }

    #[test]
    fn regex_rule_matches_the_raw_target() {
        let rules = [ScopeRule::include(RuleType::Regex, r"example\.(com|io)")];
        assert!(is_in_scope("a.example.io", &rules));
        assert!(!is_in_scope("a.example.net", &rules));
    }

    #[test]
    fn invalid_regex_never_matches_and_never_errors() {
        let rules = [ScopeRule::include(RuleType::Regex, "([unclosed")];
        assert!(!is_in_scope("a.example.com", &rules));
    }

    #[test]
    fn cidr_rules_never_match() {
        let rules = [ScopeRule::include(RuleType::Cidr, "10.0.0.0/8")];
        assert!(!is_in_scope("10.1.2.3", &rules));
    }

    #[test]
    fn filter_preserves_order_in_both_partitions() {
        let rules = [include_domain("*.example.com")];
        let targets = vec![
            "a.example.com".to_string(),
            "x.evil.com".to_string(),
            "b.example.com".to_string(),
            "y.evil.com".to_string(),
        ];
        let (inside, outside) = filter_in_scope(&targets, &rules);
        assert_eq!(inside, ["a.example.com", "b.example.com"]);
        assert_eq!(outside, ["x.evil.com", "y.evil.com"]);
    }
}
