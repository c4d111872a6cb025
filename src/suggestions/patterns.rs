//! Deterministic pattern matcher (C5): regex- and HTTP-code-driven suggestions with no
//! network call. Grounded on the status→category instinct in
//! `src/core/providers/openai/error.rs`'s `openai_category()`, generalized here from a
//! single provider's error codes to a configurable, priority-ordered pattern table.

use regex::Regex;

use super::model::{Confidence, ErrorContext, Fix, RetryFix, Source, Suggestion, SuggestionCategory, SuggestionType};

/// A single rule: some combination of message regexes and HTTP status codes that, when
/// matched, produces a templated [`Suggestion`].
pub struct BuiltinPattern {
    pub name: &'static str,
    pub category: SuggestionCategory,
    pub regexes: Vec<Regex>,
    pub http_codes: Vec<u16>,
    pub node_type_allowlist: Option<Vec<&'static str>>,
    pub suggestion_type: SuggestionType,
    pub title: &'static str,
    pub description: &'static str,
    pub fix: Option<Fix>,
    pub priority: i32,
}

impl BuiltinPattern {
    fn matches(&self, context: &ErrorContext) -> bool {
        if let Some(allowlist) = &self.node_type_allowlist {
            if !allowlist.contains(&context.node_type.as_str()) {
                return false;
            }
        }

        let code_matches =
            context.http_status.is_some_and(|status| self.http_codes.contains(&status));
        let regex_matches = self.regexes.iter().any(|re| re.is_match(&context.error_message));

        code_matches || regex_matches
    }

    fn to_suggestion(&self, context: &ErrorContext) -> Suggestion {
        let suggestion = Suggestion::new(
            context.tenant_id.clone(),
            context.execution_id.clone(),
            context.node_id.clone(),
            self.category,
            self.suggestion_type,
            Confidence::High,
            self.title,
            self.description,
            Source::Pattern,
        );
        match &self.fix {
            Some(fix) => suggestion.with_fix(fix.clone()),
            None => suggestion,
        }
    }
}

fn ci(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("builtin pattern regex must compile")
}

/// The patterns every installation gets by default, in the priority order documented
/// alongside each rule.
pub fn default_patterns() -> Vec<BuiltinPattern> {
    vec![
        BuiltinPattern {
            name: "connection_refused",
            category: SuggestionCategory::Network,
            regexes: vec![
                ci("connection refused"),
                ci("ECONNREFUSED"),
                ci("dial tcp.*connection refused"),
            ],
            http_codes: vec![],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::Retry,
            title: "Retry the request",
            description: "The connection to the upstream service was refused. This is often transient.",
            fix: Some(Fix {
                action_type: "retry".into(),
                config_path: None,
                old_value: None,
                new_value: None,
                retry: Some(RetryFix { max_retries: 5, backoff_ms: 2000, backoff_factor: 2.0 }),
            }),
            priority: 100,
        },
        BuiltinPattern {
            name: "dns_resolution",
            category: SuggestionCategory::Network,
            regexes: vec![
                ci("no such host"),
                ci("DNS resolution failed"),
                ci("getaddrinfo ENOTFOUND"),
            ],
            http_codes: vec![],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::ConfigChange,
            title: "Check the configured URL",
            description: "The host name could not be resolved. Verify the URL is correct and reachable.",
            fix: Some(Fix {
                action_type: "config_change".into(),
                config_path: Some("url".into()),
                old_value: None,
                new_value: None,
                retry: None,
            }),
            priority: 100,
        },
        BuiltinPattern {
            name: "auth_401",
            category: SuggestionCategory::Auth,
            regexes: vec![],
            http_codes: vec![401],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::CredentialUpdate,
            title: "Update credentials",
            description: "The request was unauthenticated. The configured credentials may be missing or invalid.",
            fix: None,
            priority: 100,
        },
        BuiltinPattern {
            name: "auth_403",
            category: SuggestionCategory::Auth,
            regexes: vec![],
            http_codes: vec![403],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::CredentialUpdate,
            title: "Update permissions",
            description: "The request was rejected as forbidden. The credentials may lack the required permissions.",
            fix: None,
            priority: 100,
        },
        BuiltinPattern {
            name: "rate_limit",
            category: SuggestionCategory::RateLimit,
            regexes: vec![ci("rate limit"), ci("too many requests"), ci("throttle"), ci("exceeded.*limit")],
            http_codes: vec![429],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::ConfigChange,
            title: "Reduce request rate",
            description: "The upstream service is rate-limiting this workflow. Slow down and reduce concurrency.",
            fix: Some(Fix {
                action_type: "config_change".into(),
                config_path: Some("rate_limit".into()),
                old_value: None,
                new_value: Some(serde_json::json!({ "delay_ms": 1000, "max_concurrent": 1 })),
                retry: None,
            }),
            priority: 100,
        },
        BuiltinPattern {
            name: "timeout",
            category: SuggestionCategory::Timeout,
            regexes: vec![
                ci("timeout"),
                ci("timed out"),
                ci("deadline exceeded"),
                ci("context deadline exceeded"),
            ],
            http_codes: vec![408, 504],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::ConfigChange,
            title: "Increase the timeout",
            description: "The operation did not complete before its timeout elapsed.",
            fix: Some(Fix {
                action_type: "config_change".into(),
                config_path: Some("timeout".into()),
                old_value: None,
                new_value: Some(serde_json::json!(60)),
                retry: None,
            }),
            priority: 100,
        },
        BuiltinPattern {
            name: "json_parse",
            category: SuggestionCategory::Data,
            regexes: vec![
                ci("invalid json"),
                ci("json.*parse error"),
                ci("unexpected token"),
                ci("syntax error.*json"),
                ci("invalid character"),
            ],
            http_codes: vec![],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::DataFix,
            title: "Fix malformed JSON input",
            description: "The node received data that could not be parsed as JSON.",
            fix: None,
            priority: 90,
        },
        BuiltinPattern {
            name: "validation",
            category: SuggestionCategory::Data,
            regexes: vec![
                ci("validation.*failed"),
                ci("required field"),
                ci("invalid.*format"),
                ci("must be.*type"),
            ],
            http_codes: vec![400, 422],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::DataFix,
            title: "Fix invalid input data",
            description: "The upstream service rejected the request body as invalid.",
            fix: None,
            priority: 90,
        },
        BuiltinPattern {
            name: "server_5xx",
            category: SuggestionCategory::ExternalService,
            regexes: vec![],
            http_codes: vec![500],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::Retry,
            title: "Retry after a server error",
            description: "The upstream service returned an internal server error.",
            fix: Some(Fix {
                action_type: "retry".into(),
                config_path: None,
                old_value: None,
                new_value: None,
                retry: Some(RetryFix { max_retries: 3, backoff_ms: 5000, backoff_factor: 2.0 }),
            }),
            priority: 80,
        },
        BuiltinPattern {
            name: "server_502_503",
            category: SuggestionCategory::ExternalService,
            regexes: vec![],
            http_codes: vec![502, 503],
            node_type_allowlist: None,
            suggestion_type: SuggestionType::Retry,
            title: "Retry after a gateway error",
            description: "The upstream service is temporarily unavailable.",
            fix: Some(Fix {
                action_type: "retry".into(),
                config_path: None,
                old_value: None,
                new_value: None,
                retry: Some(RetryFix { max_retries: 5, backoff_ms: 3000, backoff_factor: 2.0 }),
            }),
            priority: 80,
        },
    ]
}

/// Classify an HTTP status into a [`SuggestionCategory`], used by callers that want the
/// category without running the full pattern match (e.g. dashboards).
pub fn category_from_http_status(status: u16) -> SuggestionCategory {
    match status {
        401 | 403 => SuggestionCategory::Auth,
        429 => SuggestionCategory::RateLimit,
        408 | 504 => SuggestionCategory::Timeout,
        s if s >= 500 => SuggestionCategory::ExternalService,
        s if s >= 400 => SuggestionCategory::Data,
        _ => SuggestionCategory::Unknown,
    }
}

/// Whether a category is, in general, worth an automatic retry.
pub fn is_retryable_category(category: SuggestionCategory) -> bool {
    matches!(
        category,
        SuggestionCategory::Network
            | SuggestionCategory::Timeout
            | SuggestionCategory::ExternalService
            | SuggestionCategory::RateLimit
    )
}

/// Exponential backoff recommendation: a per-category base delay, doubling per
/// attempt, capped at 60 seconds.
pub fn recommended_retry_delay_ms(category: SuggestionCategory, attempt: u32) -> u64 {
    let base = match category {
        SuggestionCategory::RateLimit => 1000,
        SuggestionCategory::Timeout => 2000,
        SuggestionCategory::ExternalService => 3000,
        SuggestionCategory::Network => 2000,
        _ => 1000,
    };
    let delay = base * 2u64.saturating_pow(attempt);
    delay.min(60_000)
}

/// Matches [`ErrorContext`]s against a priority-sorted set of [`BuiltinPattern`]s.
pub struct PatternMatcher {
    patterns: Vec<BuiltinPattern>,
}

impl PatternMatcher {
    pub fn new(mut patterns: Vec<BuiltinPattern>) -> Self {
        patterns.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { patterns }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_patterns())
    }

    pub fn can_handle(&self, context: &ErrorContext) -> bool {
        self.patterns.iter().any(|p| p.matches(context))
    }

    /// Match all patterns against `context`, keeping only the first (highest-priority)
    /// match per category.
    pub fn match_all(&self, context: &ErrorContext) -> Vec<Suggestion> {
        let mut seen_categories = std::collections::HashSet::new();
        let mut suggestions = Vec::new();
        for pattern in &self.patterns {
            if !pattern.matches(context) {
                continue;
            }
            if !seen_categories.insert(pattern.category) {
                continue;
            }
            suggestions.push(pattern.to_suggestion(context));
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(message: &str, http_status: Option<u16>) -> ErrorContext {
        ErrorContext {
            tenant_id: "tenant-1".into(),
            execution_id: "exec-1".into(),
            workflow_id: "wf-1".into(),
            node_id: "node-1".into(),
            node_type: "action:http".into(),
            error_message: message.into(),
            error_code: None,
            http_status,
            retry_count: 0,
            input_data: None,
            node_config: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn matches_connection_refused_by_message() {
        let matcher = PatternMatcher::with_defaults();
        let ctx = context("dial tcp 10.0.0.1:443: connection refused", None);
        let matches = matcher.match_all(&ctx);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, SuggestionCategory::Network);
    }

    #[test]
    fn matches_rate_limit_by_status_and_message() {
        let matcher = PatternMatcher::with_defaults();
        let ctx = context("Too Many Requests", Some(429));
        let matches = matcher.match_all(&ctx);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, SuggestionCategory::RateLimit);
    }

    #[test]
    fn dedups_by_category_keeping_highest_priority() {
        let matcher = PatternMatcher::with_defaults();
        // "connection refused" only trips the network/connection_refused pattern, but
        // exercise the dedup path directly via a context matching two network patterns.
        let ctx = context("connection refused: no such host", None);
        let matches = matcher.match_all(&ctx);
        let network_matches = matches.iter().filter(|s| s.category == SuggestionCategory::Network).count();
        assert_eq!(network_matches, 1);
    }

    #[test]
    fn node_type_allowlist_filters_out_non_matching_nodes() {
        let mut patterns = default_patterns();
        patterns.retain(|p| p.name == "connection_refused");
        patterns[0].node_type_allowlist = Some(vec!["action:http"]);
        let matcher = PatternMatcher::new(patterns);

        let mut ctx = context("connection refused", None);
        ctx.node_type = "action:code".into();
        assert!(matcher.match_all(&ctx).is_empty());
    }

    #[test]
    fn no_match_returns_empty() {
        let matcher = PatternMatcher::with_defaults();
        let ctx = context("completely unrelated failure", None);
        assert!(matcher.match_all(&ctx).is_empty());
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        assert_eq!(recommended_retry_delay_ms(SuggestionCategory::RateLimit, 0), 1000);
        assert_eq!(recommended_retry_delay_ms(SuggestionCategory::RateLimit, 2), 4000);
        assert_eq!(recommended_retry_delay_ms(SuggestionCategory::RateLimit, 20), 60_000);
    }
}
