//! Conversation assembly and token-budget trimming.
//!
//! Builds the outbound message list (system prompt, history, new user
//! message) and trims it to a token budget with strict FIFO eviction:
//! the oldest non-system message goes first, and the system message at
//! index 0 is never removed.

mod counter;

pub use counter::{HeuristicTokenCounter, TokenCounter};

use crate::api::{ChatMessage, Role};

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("Malformed conversation entry at index {index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

/// Validate a raw history entry into a typed message.
fn validate_entry(index: usize, entry: &serde_json::Value) -> Result<ChatMessage, AssembleError> {
    let obj = entry
        .as_object()
        .ok_or_else(|| AssembleError::MalformedEntry {
            index,
            reason: "entry is not an object".to_string(),
        })?;

    let role_value = obj.get("role").ok_or_else(|| AssembleError::MalformedEntry {
        index,
        reason: "missing role".to_string(),
    })?;

    let role: Role =
        serde_json::from_value(role_value.clone()).map_err(|_| AssembleError::MalformedEntry {
            index,
            reason: format!("unknown role {}", role_value),
        })?;

    let content_value = obj
        .get("content")
        .ok_or_else(|| AssembleError::MalformedEntry {
            index,
            reason: "missing content".to_string(),
        })?;

    let content = content_value
        .as_str()
        .ok_or_else(|| AssembleError::MalformedEntry {
            index,
            reason: format!("content is not a string: {}", content_value),
        })?;

    Ok(ChatMessage::new(role, content))
}

/// Assemble the outbound conversation and trim it to `budget` tokens.
///
/// The returned sequence is `[system] ++ history ++ [new user message]`.
/// While the token total exceeds the budget, the message at index 1 (the
/// oldest non-system message) is dropped. Trimming stops once only the
/// system message and the new user message remain, even if those two alone
/// exceed the budget.
pub fn assemble(
    system_prompt: &str,
    history: &[serde_json::Value],
    new_message: &str,
    budget: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<ChatMessage>, AssembleError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    for (index, entry) in history.iter().enumerate() {
        messages.push(validate_entry(index, entry)?);
    }
    messages.push(ChatMessage::user(new_message));

    let mut total: usize = messages.iter().map(|m| counter.count(&m.content)).sum();

    while total > budget && messages.len() > 2 {
        let removed = messages.remove(1);
        total -= counter.count(&removed.content);
        tracing::debug!(
            role = %removed.role,
            tokens = counter.count(&removed.content),
            remaining_total = total,
            "Trimmed oldest history message to fit token budget"
        );
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// One token per character, for exact budget arithmetic in tests.
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn history_entry(role: &str, content: &str) -> serde_json::Value {
        json!({"role": role, "content": content})
    }

    #[test]
    fn test_untrimmed_when_under_budget() {
        let history = vec![
            history_entry("user", "aaaa"),
            history_entry("assistant", "bbbb"),
        ];
        let result = assemble("sys", &history, "hello", 1000, &CharCounter).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], ChatMessage::system("sys"));
        assert_eq!(result[1], ChatMessage::user("aaaa"));
        assert_eq!(result[2], ChatMessage::assistant("bbbb"));
        assert_eq!(result[3], ChatMessage::user("hello"));
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        // Each history message costs 4 tokens; system "ss" = 2, new "uu" = 2.
        // Budget 12 fits exactly two history messages (2 + 4 + 4 + 2).
        let history = vec![
            history_entry("user", "m1m1"),
            history_entry("assistant", "m2m2"),
            history_entry("user", "m3m3"),
        ];
        let result = assemble("ss", &history, "uu", 12, &CharCounter).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result[1].content, "m2m2");
        assert_eq!(result[2].content, "m3m3");
    }

    #[test]
    fn test_trims_down_to_two_message_floor() {
        // System + new message alone exceed the budget; trimming must stop
        // at the two-message floor instead of looping.
        let history = vec![
            history_entry("user", "old-one"),
            history_entry("assistant", "old-two"),
        ];
        let result = assemble("long system prompt", &history, "long user message", 5, &CharCounter)
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].role, Role::System);
        assert_eq!(result[1], ChatMessage::user("long user message"));
    }

    #[test]
    fn test_exactly_at_budget_not_trimmed() {
        let history = vec![history_entry("user", "abcd")];
        // 3 + 4 + 2 = 9 tokens, budget 9.
        let result = assemble("sys", &history, "hi", 9, &CharCounter).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let result = assemble("sys", &[], "Hi", 4000, &CharCounter).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], ChatMessage::system("sys"));
        assert_eq!(result[1], ChatMessage::user("Hi"));
    }

    #[test]
    fn test_malformed_entry_missing_content() {
        let history = vec![json!({"role": "user"})];
        let err = assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        assert!(err.to_string().contains("missing content"));
    }

    #[test]
    fn test_malformed_entry_missing_role() {
        let history = vec![json!({"content": "hello"})];
        let err = assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        assert!(err.to_string().contains("missing role"));
    }

    #[test]
    fn test_malformed_entry_non_string_content() {
        let history = vec![json!({"role": "user", "content": 42})];
        let err = assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        assert!(err.to_string().contains("content is not a string"));
    }

    #[test]
    fn test_malformed_entry_unknown_role() {
        let history = vec![history_entry("narrator", "hello")];
        let err = assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        assert!(err.to_string().contains("unknown role"));
    }

    #[test]
    fn test_malformed_entry_not_an_object() {
        let history = vec![json!("just a string")];
        let err = assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        let AssembleError::MalformedEntry { index, .. } = err;
        assert_eq!(index, 0);
    }

    #[test]
    fn test_error_reports_offending_index() {
        let history = vec![
            history_entry("user", "fine"),
            json!({"role": "user"}),
        ];
        let AssembleError::MalformedEntry { index, .. } =
            assemble("sys", &history, "Hi", 4000, &CharCounter).unwrap_err();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_heuristic_counter_end_to_end() {
        let counter = HeuristicTokenCounter::default();
        let result = assemble("You are a helpful assistant.", &[], "Hi", 4000, &counter).unwrap();
        assert_eq!(result.len(), 2);
    }
}
