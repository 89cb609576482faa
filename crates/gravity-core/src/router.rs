//! Model routing: maps client-supplied model names onto upstream models,
//! and steers detected background tasks to a low-cost model.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use gravity_types::models::RouteRule;
use gravity_types::protocol::{ChatMessage, MessageContent};

/// Phrases that identify short background tasks (title generation and the
/// like). Matched case-insensitively against the last message's text.
const BACKGROUND_PATTERNS: &[&str] = &[
    "generate a title",
    "summarize",
    "create a headline",
    "generate title",
];

struct CompiledRoute {
    pattern: String,
    regex: Regex,
    target: String,
}

#[derive(Default)]
struct RouteTable {
    exact: HashMap<String, String>,
    globs: Vec<CompiledRoute>,
}

/// Resolves client model names through exact and glob rules. Exact matches
/// outrank patterns; patterns apply in insertion order.
pub struct ModelRouter {
    table: RwLock<RouteTable>,
    light_model: String,
}

impl ModelRouter {
    pub fn new(rules: &[RouteRule], light_model: impl Into<String>) -> Self {
        let router = Self {
            table: RwLock::new(RouteTable::default()),
            light_model: light_model.into(),
        };
        router.set_routes(rules);
        router
    }

    /// Replace the whole rule set, preserving order.
    pub fn set_routes(&self, rules: &[RouteRule]) {
        let mut table = RouteTable::default();
        for rule in rules {
            if rule.pattern.contains('*') {
                match compile_glob(&rule.pattern) {
                    Some(regex) => table.globs.push(CompiledRoute {
                        pattern: rule.pattern.clone(),
                        regex,
                        target: rule.target.clone(),
                    }),
                    None => {
                        tracing::warn!("skipping uncompilable route pattern {:?}", rule.pattern)
                    }
                }
            } else {
                table.exact.insert(rule.pattern.clone(), rule.target.clone());
            }
        }
        let mut guard = self.table.write().unwrap_or_else(|p| p.into_inner());
        *guard = table;
    }

    /// The current rule set: exact rules first (sorted), then globs in
    /// their configured order.
    pub fn routes(&self) -> Vec<RouteRule> {
        let table = self.table.read().unwrap_or_else(|p| p.into_inner());
        let mut rules: Vec<RouteRule> = table
            .exact
            .iter()
            .map(|(pattern, target)| RouteRule::new(pattern.clone(), target.clone()))
            .collect();
        rules.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        rules.extend(
            table
                .globs
                .iter()
                .map(|g| RouteRule::new(g.pattern.clone(), g.target.clone())),
        );
        rules
    }

    /// Resolve `model` to its upstream target; unmatched names pass through.
    pub fn route(&self, model: &str) -> String {
        let table = self.table.read().unwrap_or_else(|p| p.into_inner());
        if let Some(target) = table.exact.get(model) {
            return target.clone();
        }
        for glob in &table.globs {
            if glob.regex.is_match(model) {
                return glob.target.clone();
            }
        }
        model.to_string()
    }

    /// Whether the last message marks this as a background task. Only plain
    /// string content is inspected; array content never triggers.
    pub fn is_background(&self, messages: &[ChatMessage]) -> bool {
        let Some(last) = messages.last() else {
            return false;
        };
        let Some(MessageContent::Text(content)) = &last.content else {
            return false;
        };
        let lowered = content.to_lowercase();
        BACKGROUND_PATTERNS.iter().any(|p| lowered.contains(p))
    }

    /// The configured low-cost model for background tasks.
    pub fn light_model(&self) -> &str {
        &self.light_model
    }
}

/// Compile a glob where `*` matches any run of characters (including the
/// empty one); everything else is literal.
fn compile_glob(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped)).ok()
}

#[cfg(test)]
mod tests {
    use gravity_types::models::default_routes;

    use super::*;

    fn user_message(content: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Text(content.to_string())),
        }
    }

    #[test]
    fn test_exact_match_wins_over_glob() {
        let router = ModelRouter::new(
            &[
                RouteRule::new("gpt-4*", "glob-target"),
                RouteRule::new("gpt-4", "exact-target"),
            ],
            "gemini-2.0-flash",
        );
        assert_eq!(router.route("gpt-4"), "exact-target");
        assert_eq!(router.route("gpt-4-turbo"), "glob-target");
    }

    #[test]
    fn test_glob_matches_empty_substring() {
        let router = ModelRouter::new(&[RouteRule::new("gpt-4*", "t")], "gemini-2.0-flash");
        assert_eq!(router.route("gpt-4"), "t");
    }

    #[test]
    fn test_first_glob_wins_and_unmatched_passes_through() {
        let router = ModelRouter::new(
            &[
                RouteRule::new("claude-*", "first"),
                RouteRule::new("claude-3-*", "second"),
            ],
            "gemini-2.0-flash",
        );
        assert_eq!(router.route("claude-3-opus"), "first");
        assert_eq!(router.route("mistral-large"), "mistral-large");
    }

    #[test]
    fn test_glob_star_does_not_enable_other_metacharacters() {
        let router = ModelRouter::new(&[RouteRule::new("gpt.4*", "t")], "gemini-2.0-flash");
        // The dot is literal; "gptx4" must not match.
        assert_eq!(router.route("gptx4"), "gptx4");
        assert_eq!(router.route("gpt.4-turbo"), "t");
    }

    #[test]
    fn test_route_is_idempotent_over_default_rules() {
        let router = ModelRouter::new(&default_routes(), "gemini-2.0-flash");
        for model in ["gpt-4", "gpt-3.5-turbo", "claude-3-opus-20240229", "o1-preview"] {
            let once = router.route(model);
            assert_eq!(router.route(&once), once, "route not idempotent for {model}");
        }
    }

    #[test]
    fn test_set_routes_replaces_table() {
        let router = ModelRouter::new(&[RouteRule::new("a", "b")], "gemini-2.0-flash");
        assert_eq!(router.route("a"), "b");
        router.set_routes(&[RouteRule::new("a", "c")]);
        assert_eq!(router.route("a"), "c");
        assert_eq!(router.routes(), vec![RouteRule::new("a", "c")]);
    }

    #[test]
    fn test_background_detection_case_insensitive_last_message() {
        let router = ModelRouter::new(&[], "gemini-2.0-flash");
        assert!(router.is_background(&[user_message("Please GENERATE A TITLE for this thread.")]));
        assert!(router.is_background(&[
            user_message("long conversation"),
            user_message("now summarize it"),
        ]));
        // Only the last message counts.
        assert!(!router.is_background(&[
            user_message("generate a title"),
            user_message("actually, write an essay"),
        ]));
        assert!(!router.is_background(&[]));
    }

    #[test]
    fn test_background_detection_ignores_non_string_content() {
        let router = ModelRouter::new(&[], "gemini-2.0-flash");
        let blocks = ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Blocks(vec![
                gravity_types::protocol::ContentBlock::Text {
                    text: "generate a title".to_string(),
                },
            ])),
        };
        assert!(!router.is_background(&[blocks]));

        let empty = ChatMessage { role: "user".to_string(), content: None };
        assert!(!router.is_background(&[empty]));
    }

    #[test]
    fn test_light_model() {
        let router = ModelRouter::new(&[], "gemini-2.0-flash");
        assert_eq!(router.light_model(), "gemini-2.0-flash");
    }
}
