//! Outbound notices

use crate::error::{MatchError, Result};
use crate::types::ChannelId;
use crate::utils::generate_notice_id;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

/// A selectable action attached to a notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    /// Token sent back through the dispatcher when the choice is taken
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Rendered state delivered to a channel
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: String,
    pub channel: ChannelId,
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Notice {
    pub fn new(channel: ChannelId, text: impl Into<String>) -> Self {
        Self {
            id: generate_notice_id(),
            channel,
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Token of the first choice whose label contains `needle`
    pub fn token_for(&self, needle: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.label.contains(needle))
            .map(|c| c.token.as_str())
    }
}

/// Delivery seam to whatever chat surface hosts the matches
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notice: Notice) -> Result<()>;
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notice: Notice) -> Result<()> {
        let tokens: Vec<&str> = notice.choices.iter().map(|c| c.token.as_str()).collect();
        info!(
            channel = notice.channel,
            notice_id = %notice.id,
            "{}{}",
            notice.text,
            if tokens.is_empty() {
                String::new()
            } else {
                format!("\n[choices: {}]", tokens.join(" "))
            }
        );
        Ok(())
    }
}

/// Captures notices in memory for assertions
#[derive(Debug, Default)]
pub struct MockNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.text).collect()
    }

    /// Most recent notice whose text contains `needle`
    pub fn last_containing(&self, needle: &str) -> Option<Notice> {
        self.notices()
            .into_iter()
            .rev()
            .find(|n| n.text.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.notices.lock().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.clear();
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn deliver(&self, notice: Notice) -> Result<()> {
        self.notices
            .lock()
            .map_err(|_| MatchError::lock("notices"))?
            .push(notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_notifier_captures_in_order() {
        let notifier = MockNotifier::new();
        notifier.deliver(Notice::new(1, "first")).await.unwrap();
        notifier
            .deliver(Notice::new(2, "second").with_choices(vec![Choice::new("Go", "go_1")]))
            .await
            .unwrap();

        assert_eq!(notifier.texts(), vec!["first", "second"]);
        let last = notifier.last_containing("sec").unwrap();
        assert_eq!(last.channel, 2);
        assert_eq!(last.token_for("Go"), Some("go_1"));

        notifier.clear();
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        tokio_test::assert_ok!(LogNotifier.deliver(Notice::new(0, "hello")).await);
    }

    #[test]
    fn test_notice_ids_are_unique() {
        assert_ne!(Notice::new(0, "a").id, Notice::new(0, "a").id);
    }
}
