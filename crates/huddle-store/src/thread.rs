//! The open thread: a root message plus its replies.
//!
//! Replies are written into the root message stored in the [`ChannelStore`]
//! and the thread then takes the stored root's replies, so the conversation
//! view and the thread panel show the same replies.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use huddle_shared::{ChatMessage, MessageId};

use crate::channels::ChannelStore;
use crate::observable::Observable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Closed,
    Open,
}

/// What happened to the canonical copy of the root when a reply was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySync {
    /// The root in the active conversation now carries the reply.
    Synced,
    /// The root is not in the active conversation. Only the thread copy changed.
    Diverged,
    /// No thread is open; the reply only landed in the local list.
    Detached,
}

#[derive(Default)]
struct ThreadInner {
    root: Option<ChatMessage>,
    replies: Vec<ChatMessage>,
}

pub struct ThreadStore {
    state: Mutex<ThreadInner>,
    channels: Arc<ChannelStore>,
    root: Observable<Option<ChatMessage>>,
    replies: Observable<Vec<ChatMessage>>,
    initial_reply_text: Observable<String>,
}

impl ThreadStore {
    pub fn new(channels: Arc<ChannelStore>) -> Self {
        Self {
            state: Mutex::new(ThreadInner::default()),
            channels,
            root: Observable::default(),
            replies: Observable::default(),
            initial_reply_text: Observable::default(),
        }
    }

    pub fn state(&self) -> ThreadState {
        if self.inner().root.is_some() {
            ThreadState::Open
        } else {
            ThreadState::Closed
        }
    }

    pub fn root(&self) -> Option<ChatMessage> {
        self.root.get()
    }

    pub fn subscribe_root(&self) -> watch::Receiver<Option<ChatMessage>> {
        self.root.subscribe()
    }

    pub fn replies(&self) -> Vec<ChatMessage> {
        self.replies.get()
    }

    pub fn subscribe_replies(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.replies.subscribe()
    }

    pub fn initial_reply_text(&self) -> String {
        self.initial_reply_text.get()
    }

    pub fn subscribe_initial_reply_text(&self) -> watch::Receiver<String> {
        self.initial_reply_text.subscribe()
    }

    /// Show the thread anchored at `root`, pre-filling the reply box.
    pub fn open_thread(&self, root: ChatMessage, initial_reply_text: &str) {
        let mut state = self.inner();
        debug!(root = %root.id, replies = root.replies.len(), "thread opened");
        state.replies = root.replies.clone();
        state.root = Some(root);
        self.publish(&state);
        self.initial_reply_text.set(initial_reply_text.to_string());
    }

    pub fn set_initial_reply_text(&self, text: &str) {
        self.initial_reply_text.set(text.to_string());
    }

    /// Append a reply. With a thread open the reply goes into the root's
    /// canonical copy first and the thread takes that copy's replies, so edits
    /// and reactions made through the conversation survive.
    pub fn add_reply(&self, reply: ChatMessage) -> ReplySync {
        let mut state = self.inner();
        let Some(root_id) = state.root.as_ref().map(|r| r.id) else {
            state.replies.push(reply);
            self.publish(&state);
            return ReplySync::Detached;
        };

        let mut pending = Some(reply);
        let canonical = self.write_through(root_id, |root| {
            if let Some(reply) = pending.take() {
                root.replies.push(reply);
            }
        });

        let outcome = match canonical {
            Some(root) => {
                state.replies = root.replies.clone();
                state.root = Some(root);
                ReplySync::Synced
            }
            None => {
                state.replies.extend(pending);
                warn!(root = %root_id, "thread root not in active conversation, copies diverged");
                ReplySync::Diverged
            }
        };
        self.settle(&mut state);
        outcome
    }

    /// Mutate one reply (reaction, edit). `None` when the reply is unknown.
    pub fn update_reply(&self, id: MessageId, f: impl FnOnce(&mut ChatMessage)) -> Option<ReplySync> {
        let mut state = self.inner();
        let root_id = state.root.as_ref().map(|r| r.id);
        let mut f = Some(f);

        if let Some(root_id) = root_id {
            let mut found = false;
            let canonical = self.write_through(root_id, |root| {
                if let (Some(reply), Some(f)) = (root.reply_mut(id), f.take()) {
                    f(reply);
                    found = true;
                }
            });
            if let Some(root) = canonical {
                if !found {
                    return None;
                }
                state.replies = root.replies.clone();
                state.root = Some(root);
                self.settle(&mut state);
                return Some(ReplySync::Synced);
            }
        }

        let reply = state.replies.iter_mut().find(|r| r.id == id)?;
        if let Some(f) = f.take() {
            f(reply);
        }
        let outcome = match root_id {
            Some(root_id) => {
                warn!(root = %root_id, "thread root not in active conversation, copies diverged");
                ReplySync::Diverged
            }
            None => ReplySync::Detached,
        };
        self.settle(&mut state);
        Some(outcome)
    }

    /// Reload the open root and its replies from the active conversation.
    /// Returns false when no thread is open or the root is not there.
    pub fn refresh(&self) -> bool {
        let mut state = self.inner();
        let Some(root_id) = state.root.as_ref().map(|r| r.id) else {
            return false;
        };
        let Some(key) = self.channels.active_conversation() else {
            return false;
        };
        let Some(root) = self
            .channels
            .messages_for(&key)
            .into_iter()
            .find(|m| m.id == root_id)
        else {
            return false;
        };

        state.replies = root.replies.clone();
        state.root = Some(root);
        self.publish(&state);
        true
    }

    /// Hide the thread.
    pub fn close(&self) {
        let mut state = self.inner();
        state.root = None;
        state.replies.clear();
        self.publish(&state);
        self.initial_reply_text.set(String::new());
        debug!("thread closed");
    }

    /// Apply `f` to the root stored in the active conversation and return
    /// the updated root, or `None` when the root is not there.
    fn write_through(
        &self,
        root_id: MessageId,
        f: impl FnOnce(&mut ChatMessage),
    ) -> Option<ChatMessage> {
        let key = self.channels.active_conversation()?;
        let mut canonical = None;
        self.channels.update_message(&key, root_id, |root| {
            f(root);
            canonical = Some(root.clone());
        });
        canonical
    }

    /// Point the thread's root at the thread's replies and publish both.
    fn settle(&self, state: &mut ThreadInner) {
        let replies = state.replies.clone();
        if let Some(root) = state.root.as_mut() {
            root.replies = replies;
        }
        self.publish(state);
    }

    fn publish(&self, state: &ThreadInner) {
        let me = self.channels.users().current_user_id();

        let root = state.root.clone().map(|mut root| {
            root.mark_self(&me);
            root
        });
        let replies = state
            .replies
            .iter()
            .cloned()
            .map(|mut r| {
                r.mark_self(&me);
                r
            })
            .collect();

        self.root.set(root);
        self.replies.set(replies);
    }

    fn inner(&self) -> MutexGuard<'_, ThreadInner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
