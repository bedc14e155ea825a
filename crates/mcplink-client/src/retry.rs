//! Retry decorator for any [`ToolInvoker`].

use crate::codec::DECODE_FAILURE;
use crate::invoker::ToolInvoker;
use crate::protocol::ToolDescriptor;
use async_trait::async_trait;
use mcplink_core::{RetryPolicy, ToolFailure, ToolOutcome};
use serde_json::Value;
use tracing::{info, warn};

/// A [`ToolInvoker`] decorator that retries transient transport failures
/// with exponential backoff.
///
/// Only `FailureKind::Transport` outcomes are retried. Client errors (HTTP
/// 4xx other than 429) and bodies that arrived but could not be decoded are
/// returned on the first attempt, as are remote tool errors.
///
/// A timeout or dropped connection does not tell whether the server ran the
/// tool. A retried call may therefore execute twice, so wrap only endpoints
/// whose tools are safe to repeat.
pub struct RetryingInvoker<I> {
    inner: I,
    policy: RetryPolicy,
}

impl<I: ToolInvoker> RetryingInvoker<I> {
    /// Wraps `inner` with `policy`.
    pub fn new(inner: I, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped invoker.
    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn attempts(&self) -> u32 {
        self.policy.max_attempts.max(1)
    }
}

/// Whether a failure is worth another attempt.
pub fn is_retryable(failure: &ToolFailure) -> bool {
    if !failure.kind.is_transient() {
        return false;
    }
    if failure.context.get(DECODE_FAILURE).and_then(Value::as_bool) == Some(true) {
        return false;
    }
    match failure.context.get("status").and_then(|s| s.as_u64()) {
        Some(429) => true,
        Some(status) => !(400..500).contains(&status),
        None => true,
    }
}

#[async_trait]
impl<I: ToolInvoker> ToolInvoker for RetryingInvoker<I> {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let attempts = self.attempts();
        let mut tools = Vec::new();
        for attempt in 0..attempts {
            tools = self.inner.list_tools().await;
            if !tools.is_empty() {
                break;
            }
            if attempt + 1 < attempts {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Tool discovery returned nothing, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
        tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> ToolOutcome {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            let outcome = self.inner.call_tool(name, arguments.clone()).await;
            let retry = match outcome.failure() {
                Some(failure) => is_retryable(failure) && attempt + 1 < attempts,
                None => false,
            };
            if !retry {
                if attempt > 0 && outcome.is_ok() {
                    info!(tool = %name, attempts = attempt + 1, "Tool call succeeded after retry");
                }
                return outcome;
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                tool = %name,
                attempt = attempt + 1,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %outcome.failure().map(|f| f.message.as_str()).unwrap_or_default(),
                "Transient tool failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, then repeats the last one.
    struct Scripted {
        script: Mutex<Vec<ToolOutcome>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(mut script: Vec<ToolOutcome>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolInvoker for Scripted {
        async fn list_tools(&self) -> Vec<ToolDescriptor> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < 1 {
                Vec::new()
            } else {
                vec![ToolDescriptor::new("ListTables", "")]
            }
        }

        async fn call_tool(&self, _name: &str, _arguments: serde_json::Value) -> ToolOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script[0].clone()
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay_ms: 1,
            backoff_max_ms: 5,
        }
    }

    fn ok() -> ToolOutcome {
        ToolOutcome::from_value(serde_json::json!({"tables": []}))
    }

    #[tokio::test]
    async fn test_retries_transport_until_success() {
        let inner = Scripted::new(vec![
            ToolOutcome::failed(FailureKind::Transport, "timed out"),
            ToolOutcome::failed(FailureKind::Transport, "timed out"),
            ok(),
        ]);
        let retrying = RetryingInvoker::new(inner, fast_policy(3));
        let outcome = retrying.call_tool("ListTables", serde_json::json!({})).await;
        assert!(outcome.is_ok());
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = Scripted::new(vec![ToolOutcome::failed(FailureKind::Transport, "down")]);
        let retrying = RetryingInvoker::new(inner, fast_policy(2));
        let outcome = retrying.call_tool("ListTables", serde_json::json!({})).await;
        assert_eq!(outcome.failure().unwrap().message, "down");
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_errors_are_not_retried() {
        let inner = Scripted::new(vec![ToolOutcome::failed(FailureKind::Remote, "no such table")]);
        let retrying = RetryingInvoker::new(inner, fast_policy(5));
        let outcome = retrying.call_tool("DescribeTable", serde_json::json!({})).await;
        assert!(outcome.is_error());
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_tools_retries_empty_discovery() {
        let retrying = RetryingInvoker::new(Scripted::new(vec![ok()]), fast_policy(3));
        let tools = retrying.list_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_is_retryable_by_status() {
        let base = ToolFailure::new(FailureKind::Transport, "HTTP error");
        assert!(is_retryable(&base));
        assert!(is_retryable(&base.clone().with_context("status", 503)));
        assert!(is_retryable(&base.clone().with_context("status", 429)));
        assert!(!is_retryable(&base.clone().with_context("status", 400)));
        assert!(!is_retryable(&base.with_context("status", 404)));
        assert!(!is_retryable(&ToolFailure::new(FailureKind::Policy, "blocked")));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_not_retried() {
        let malformed = crate::codec::decode_tool_response(
            r#"{"result":{"content":[{"type":"text","text":"not json"}]}}"#,
        );
        let retrying = RetryingInvoker::new(Scripted::new(vec![malformed]), fast_policy(4));
        let outcome = retrying.call_tool("ListTables", serde_json::json!({})).await;
        assert_eq!(outcome.failure().unwrap().kind, FailureKind::Transport);
        assert_eq!(retrying.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let retrying = RetryingInvoker::new(Scripted::new(vec![ok()]), fast_policy(0));
        assert_eq!(retrying.attempts(), 1);
    }
}
