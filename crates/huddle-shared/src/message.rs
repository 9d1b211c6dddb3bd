//! Chat messages, reactions and message id generation.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{User, UserId};

/// Message identifier: milliseconds since the Unix epoch at creation time,
/// bumped when two messages are created within the same millisecond.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out strictly increasing [`MessageId`]s.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: AtomicI64,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> MessageId {
        self.next_at(Utc::now())
    }

    fn next_at(&self, now: DateTime<Utc>) -> MessageId {
        let candidate = now.timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return MessageId(next),
                Err(actual) => last = actual,
            }
        }
    }
}

/// One emoji reaction on a message. `count` always equals `users.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
    pub users: Vec<UserId>,
}

/// A chat message as shown in a conversation or thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: String,
    pub user_id: UserId,
    /// Display time, `HH:MM` in local time.
    pub time: String,
    pub content: String,
    pub avatar: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Derived on every publication from the current user; never authoritative.
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub replies: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
}

impl ChatMessage {
    /// Build a fresh message authored by `author`.
    pub fn compose(
        id: MessageId,
        author: &User,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author: author.name.clone(),
            user_id: author.id.clone(),
            time: display_time(created_at),
            content: content.into(),
            avatar: author.avatar.clone(),
            reactions: Vec::new(),
            is_self: false,
            replies: Vec::new(),
            reply_to_id: None,
            created_at,
            edited: false,
        }
    }

    pub fn in_reply_to(mut self, root: MessageId) -> Self {
        self.reply_to_id = Some(root);
        self
    }

    /// Add or withdraw `user`'s `emoji` reaction. Returns `true` when the user
    /// reacts after the call.
    pub fn toggle_reaction(&mut self, emoji: &str, user: &UserId) -> bool {
        let Some(pos) = self.reactions.iter().position(|r| r.emoji == emoji) else {
            self.reactions.push(Reaction {
                emoji: emoji.to_string(),
                count: 1,
                users: vec![user.clone()],
            });
            return true;
        };

        let reaction = &mut self.reactions[pos];
        if let Some(idx) = reaction.users.iter().position(|u| u == user) {
            reaction.users.remove(idx);
            reaction.count = reaction.users.len() as u32;
            if reaction.count == 0 {
                self.reactions.remove(pos);
            }
            false
        } else {
            reaction.users.push(user.clone());
            reaction.count = reaction.users.len() as u32;
            true
        }
    }

    /// Replace the content with the trimmed `content`. Blank input is ignored.
    pub fn edit(&mut self, content: &str) -> bool {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.content = trimmed.to_string();
        self.edited = true;
        true
    }

    /// Display time of the newest reply, if any.
    pub fn last_reply_time(&self) -> Option<&str> {
        self.replies.last().map(|r| r.time.as_str())
    }

    pub fn reply_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.replies.iter_mut().find(|r| r.id == id)
    }

    /// Set `is_self` on this message and all replies.
    pub fn mark_self(&mut self, current: &UserId) {
        self.is_self = &self.user_id == current;
        for reply in &mut self.replies {
            reply.mark_self(current);
        }
    }
}

/// `HH:MM` in the local time zone.
pub fn display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ChatMessage {
        let author = User::new("noah", "Noah Braun", "assets/Noah Braun.png");
        ChatMessage::compose(MessageId(1), &author, "hi", Utc::now())
    }

    #[test]
    fn toggle_twice_removes_sole_reaction() {
        let mut msg = sample();
        let me = UserId::from("frederik");

        assert!(msg.toggle_reaction("👍", &me));
        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].count, 1);

        assert!(!msg.toggle_reaction("👍", &me));
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn toggle_keeps_count_in_step_with_users() {
        let mut msg = sample();
        let me = UserId::from("frederik");
        let sofia = UserId::from("sofia");

        msg.toggle_reaction("🚀", &sofia);
        msg.toggle_reaction("🚀", &me);
        assert_eq!(msg.reactions[0].count, 2);

        msg.toggle_reaction("🚀", &me);
        let r = &msg.reactions[0];
        assert_eq!(r.count, 1);
        assert_eq!(r.users, vec![sofia]);
    }

    #[test]
    fn toggle_is_an_involution_per_user() {
        let mut msg = sample();
        msg.toggle_reaction("❤️", &UserId::from("sofia"));
        let before = msg.reactions.clone();

        let me = UserId::from("frederik");
        msg.toggle_reaction("❤️", &me);
        msg.toggle_reaction("❤️", &me);
        assert_eq!(msg.reactions, before);
    }

    #[test]
    fn blank_edit_is_ignored() {
        let mut msg = sample();
        assert!(!msg.edit("   "));
        assert_eq!(msg.content, "hi");
        assert!(!msg.edited);

        assert!(msg.edit("  hello  "));
        assert_eq!(msg.content, "hello");
        assert!(msg.edited);
    }

    #[test]
    fn mark_self_reaches_replies() {
        let me = User::new("frederik", "Frederik Beck", "a.png");
        let mut root = sample();
        root.replies
            .push(ChatMessage::compose(MessageId(2), &me, "yo", Utc::now()));

        root.mark_self(&me.id);
        assert!(!root.is_self);
        assert!(root.replies[0].is_self);
    }

    #[test]
    fn ids_strictly_increase_within_one_millisecond() {
        let ids = MessageIdGenerator::new();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let a = ids.next_at(at);
        let b = ids.next_at(at);
        let c = ids.next_at(at);
        assert_eq!(a.0, 1_700_000_000_000);
        assert!(a < b && b < c);
    }
}
