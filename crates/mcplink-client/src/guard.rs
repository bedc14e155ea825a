//! Keyword denylist for read-only statements.

use mcplink_core::{McpLinkError, McpLinkResult};

/// Keywords every guard rejects.
pub const MANDATORY_DENYLIST: [&str; 7] = [
    "drop",
    "delete",
    "truncate",
    "alter table",
    "create",
    "insert",
    "update",
];

/// Message returned when a statement is blocked.
pub const BLOCKED_MESSAGE: &str =
    "Query contains potentially dangerous operations and was blocked";

/// Textual denylist applied to statements before they leave the process.
///
/// The statement is lowercased and scanned for each keyword as a plain
/// substring. This is a best-effort policy layer, not a security boundary:
///
/// - identifiers that contain a keyword are rejected too (`created_at`,
///   `last_update`);
/// - there is no tokenizer, so comments, string literals, escapes and
///   alternative encodings are not understood and can be used to hide a
///   keyword.
///
/// Enforce read-only access on the server side as well.
#[derive(Debug, Clone)]
pub struct QueryGuard {
    keywords: Vec<String>,
}

impl Default for QueryGuard {
    fn default() -> Self {
        Self {
            keywords: MANDATORY_DENYLIST.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl QueryGuard {
    /// Guard with the mandatory keywords only.
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that also rejects `extra` keywords. The mandatory list always
    /// stays in place; blank and duplicate entries are ignored.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self::default();
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !guard.keywords.contains(&keyword) {
                guard.keywords.push(keyword);
            }
        }
        guard
    }

    /// Active keywords, mandatory ones first.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The first denylisted keyword found in `statement`, if any.
    pub fn find_violation(&self, statement: &str) -> Option<&str> {
        let folded = statement.to_lowercase();
        self.keywords
            .iter()
            .find(|k| folded.contains(k.as_str()))
            .map(String::as_str)
    }

    /// `Err(Policy)` if `statement` contains a denylisted keyword.
    pub fn check(&self, statement: &str) -> McpLinkResult<()> {
        match self.find_violation(statement) {
            Some(keyword) => Err(McpLinkError::Policy(format!(
                "{BLOCKED_MESSAGE} (matched '{keyword}')"
            ))),
            None => Ok(()),
        }
    }
}
