//! Channel list, active conversation and all message storage.
//!
//! [`ChannelStore`] is the single source of truth for which channel or direct
//! message peer is active and for every conversation's messages. Channel
//! metadata (description, creator, members) lives in side tables keyed by the
//! channel name, so a rename moves all of them to the new key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use huddle_shared::constants::{SYSTEM_CHANNEL, UNKNOWN_NAME};
use huddle_shared::{Channel, ChatMessage, ConversationKey, MessageId, User, UserId};

use crate::current_user::CurrentUserStore;
use crate::observable::Observable;

/// Whether `name` is the channel that can be neither renamed nor removed.
pub fn is_system_channel(name: &str) -> bool {
    name == SYSTEM_CHANNEL
}

#[derive(Default)]
struct ChannelState {
    channels: Vec<Channel>,
    active_channel: Option<Channel>,
    active_user: Option<User>,
    channel_messages: HashMap<String, Vec<ChatMessage>>,
    direct_messages: HashMap<UserId, Vec<ChatMessage>>,
    members: HashMap<String, Vec<User>>,
    descriptions: HashMap<String, String>,
    creators: HashMap<String, String>,
}

impl ChannelState {
    fn list(&self, key: &ConversationKey) -> Option<&Vec<ChatMessage>> {
        match key {
            ConversationKey::Channel(name) => self.channel_messages.get(name),
            ConversationKey::Direct(id) => self.direct_messages.get(id),
        }
    }

    fn list_mut(&mut self, key: &ConversationKey) -> Option<&mut Vec<ChatMessage>> {
        match key {
            ConversationKey::Channel(name) => self.channel_messages.get_mut(name),
            ConversationKey::Direct(id) => self.direct_messages.get_mut(id),
        }
    }

    fn list_or_create(&mut self, key: ConversationKey) -> &mut Vec<ChatMessage> {
        match key {
            ConversationKey::Channel(name) => self.channel_messages.entry(name).or_default(),
            ConversationKey::Direct(id) => self.direct_messages.entry(id).or_default(),
        }
    }

    /// A present DM peer wins over the active channel.
    fn active_conversation(&self) -> Option<ConversationKey> {
        if let Some(user) = &self.active_user {
            return Some(ConversationKey::Direct(user.id.clone()));
        }
        self.active_channel
            .as_ref()
            .map(|c| ConversationKey::Channel(c.name.clone()))
    }

    fn is_active_channel(&self, name: &str) -> bool {
        self.active_channel.as_ref().is_some_and(|c| c.name == name)
    }

    /// Write the optional metadata a channel snapshot carries into the side tables.
    fn absorb_metadata(&mut self, channel: &Channel) {
        if let Some(members) = &channel.members {
            self.members.insert(channel.name.clone(), members.clone());
        }
        if let Some(description) = &channel.description {
            self.descriptions
                .insert(channel.name.clone(), description.clone());
        }
        if let Some(creator) = &channel.created_by {
            self.creators.insert(channel.name.clone(), creator.clone());
        }
    }

    /// Rewrite the listed entry for `name` from the side tables. Returns
    /// whether the channel is listed.
    fn refresh_entry(&mut self, name: &str) -> bool {
        let snapshot = self.snapshot(name);
        match self.channels.iter_mut().find(|c| c.name == name) {
            Some(entry) => {
                *entry = snapshot;
                true
            }
            None => false,
        }
    }

    /// The channel `name` with everything the side tables know about it.
    fn snapshot(&self, name: &str) -> Channel {
        Channel {
            name: name.to_string(),
            description: self.descriptions.get(name).cloned(),
            created_by: self.creators.get(name).cloned(),
            members: self.members.get(name).cloned(),
        }
    }
}

/// Channels, the active conversation and every conversation's messages.
///
/// Listed channels always mirror the side tables, so a channel read from
/// [`channels`](Self::channels) carries its current description, creator and
/// members.
pub struct ChannelStore {
    state: Mutex<ChannelState>,
    users: Arc<CurrentUserStore>,
    channels: Observable<Vec<Channel>>,
    active_channel: Observable<Option<Channel>>,
    active_user: Observable<Option<User>>,
    messages: Observable<Vec<ChatMessage>>,
}

impl ChannelStore {
    /// An empty store with no channel and no selection.
    pub fn new(users: Arc<CurrentUserStore>) -> Self {
        Self {
            state: Mutex::new(ChannelState::default()),
            users,
            channels: Observable::default(),
            active_channel: Observable::default(),
            active_user: Observable::default(),
            messages: Observable::default(),
        }
    }

    /// The current-user store messages are classified against.
    pub fn users(&self) -> &Arc<CurrentUserStore> {
        &self.users
    }

    // ------------------------------------------------------------------
    // Channel list
    // ------------------------------------------------------------------

    /// Listed channels in insertion order.
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.get()
    }

    /// Receiver for the channel list; sees the latest list immediately.
    pub fn subscribe_channels(&self) -> watch::Receiver<Vec<Channel>> {
        self.channels.subscribe()
    }

    /// Names of the listed channels, used for `#` completion.
    pub fn channel_names(&self) -> Vec<String> {
        self.state().channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether `name` is listed.
    pub fn has_channel(&self, name: &str) -> bool {
        self.state().channels.iter().any(|c| c.name == name)
    }

    /// Append a channel. Names are unique; a duplicate is rejected.
    pub fn add_channel(&self, channel: Channel) -> bool {
        let mut state = self.state();
        if state.channels.iter().any(|c| c.name == channel.name) {
            warn!(channel = %channel.name, "channel already exists");
            return false;
        }

        state.absorb_metadata(&channel);
        info!(channel = %channel.name, "channel added");
        let entry = state.snapshot(&channel.name);
        state.channels.push(entry);
        self.channels.set(state.channels.clone());
        true
    }

    /// Replace the channel with the same name.
    pub fn update_channel(&self, channel: Channel) -> bool {
        let mut state = self.state();
        if !state.channels.iter().any(|c| c.name == channel.name) {
            warn!(channel = %channel.name, "update for unknown channel");
            return false;
        }

        state.absorb_metadata(&channel);
        self.sync_channel(&mut state, &channel.name);
        true
    }

    /// Drop a channel together with its messages and metadata. Clears the
    /// active selection when it pointed at this channel.
    pub fn remove_channel(&self, name: &str) -> bool {
        if is_system_channel(name) {
            warn!(channel = %name, "refusing to remove the system channel");
            return false;
        }

        let mut state = self.state();
        let before = state.channels.len();
        state.channels.retain(|c| c.name != name);
        let listed = state.channels.len() != before;

        let had_data = state.channel_messages.remove(name).is_some()
            | state.members.remove(name).is_some()
            | state.descriptions.remove(name).is_some()
            | state.creators.remove(name).is_some();

        if state.is_active_channel(name) {
            state.active_channel = None;
            self.active_channel.set(None);
            self.publish_messages(&state);
        }

        if listed {
            info!(channel = %name, "channel removed");
            self.channels.set(state.channels.clone());
        }
        listed || had_data
    }

    /// Take a channel off the list while keeping its messages and metadata.
    /// Clears the active selection when it pointed at this channel.
    pub fn unlist_channel(&self, name: &str) -> bool {
        if is_system_channel(name) {
            warn!(channel = %name, "refusing to unlist the system channel");
            return false;
        }

        let mut state = self.state();
        let before = state.channels.len();
        state.channels.retain(|c| c.name != name);
        if state.channels.len() == before {
            return false;
        }

        if state.is_active_channel(name) {
            state.active_channel = None;
            self.active_channel.set(None);
            self.publish_messages(&state);
        }
        info!(channel = %name, "channel unlisted");
        self.channels.set(state.channels.clone());
        true
    }

    /// Rename a channel, moving its messages, members, description and
    /// creator to the new key.
    pub fn rename_channel(&self, old_name: &str, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if is_system_channel(old_name) {
            warn!(channel = %old_name, "refusing to rename the system channel");
            return false;
        }
        if new_name.is_empty() || new_name == old_name {
            return false;
        }

        let mut state = self.state();
        if state.channels.iter().any(|c| c.name == new_name) {
            warn!(from = %old_name, to = %new_name, "rename target already exists");
            return false;
        }
        let Some(channel) = state.channels.iter_mut().find(|c| c.name == old_name) else {
            debug!(channel = %old_name, "rename of unknown channel ignored");
            return false;
        };
        channel.name = new_name.to_string();

        rekey(&mut state.channel_messages, old_name, new_name.to_string());
        rekey(&mut state.members, old_name, new_name.to_string());
        rekey(&mut state.descriptions, old_name, new_name.to_string());
        rekey(&mut state.creators, old_name, new_name.to_string());
        state.refresh_entry(new_name);

        if state.is_active_channel(old_name) {
            let renamed = state.snapshot(new_name);
            state.active_channel = Some(renamed.clone());
            self.active_channel.set(Some(renamed));
            self.publish_messages(&state);
        }

        info!(from = %old_name, to = %new_name, "channel renamed");
        self.channels.set(state.channels.clone());
        true
    }

    // ------------------------------------------------------------------
    // Active selection
    // ------------------------------------------------------------------

    /// The active channel snapshot. Still set while a DM peer is selected.
    pub fn active_channel(&self) -> Option<Channel> {
        self.active_channel.get()
    }

    /// Receiver for the active channel snapshot.
    pub fn subscribe_active_channel(&self) -> watch::Receiver<Option<Channel>> {
        self.active_channel.subscribe()
    }

    /// The selected direct-message peer.
    pub fn active_user(&self) -> Option<User> {
        self.active_user.get()
    }

    /// Receiver for the DM peer.
    pub fn subscribe_active_user(&self) -> watch::Receiver<Option<User>> {
        self.active_user.subscribe()
    }

    /// The conversation new messages go to: the DM peer if one is selected,
    /// else the active channel.
    pub fn active_conversation(&self) -> Option<ConversationKey> {
        self.state().active_conversation()
    }

    /// Activate a channel (or nothing). Always ends any direct-message
    /// selection. Metadata carried by `channel` is stored first. Activating
    /// the already active channel still recomputes the visible messages.
    pub fn set_active_channel(&self, channel: Option<Channel>) {
        let mut state = self.state();
        state.active_user = None;
        self.active_user.set(None);

        match channel {
            None => {
                state.active_channel = None;
                self.active_channel.set(None);
                self.messages.set(Vec::new());
            }
            Some(channel) => {
                state.absorb_metadata(&channel);
                if state.refresh_entry(&channel.name) {
                    self.channels.set(state.channels.clone());
                }
                let snapshot = state.snapshot(&channel.name);
                debug!(channel = %snapshot.name, "channel activated");
                state.active_channel = Some(snapshot.clone());
                self.active_channel.set(Some(snapshot));
                self.publish_messages(&state);
            }
        }
    }

    /// Select a direct-message peer (or none). The active channel slot is
    /// left alone; a selected peer takes priority for the visible messages.
    pub fn set_active_user(&self, user: Option<User>) {
        let mut state = self.state();
        if let Some(u) = &user {
            debug!(user = %u.id, "direct conversation activated");
        }
        state.active_user = user.clone();
        self.active_user.set(user);
        self.publish_messages(&state);
    }

    /// Activate a listed channel with its current metadata. A miss clears
    /// the selection.
    pub fn set_active_channel_by_name(&self, name: &str) -> bool {
        let found = {
            let state = self.state();
            let listed = state.channels.iter().any(|c| c.name == name);
            listed.then(|| state.snapshot(name))
        };

        if found.is_none() {
            warn!(channel = %name, "no such channel, clearing selection");
        }
        let hit = found.is_some();
        self.set_active_channel(found);
        hit
    }

    /// Select a roster user as DM peer. A miss clears the selection.
    pub fn set_active_user_by_id(&self, id: &UserId) -> bool {
        let found = self.users.find_user(id);
        if found.is_none() {
            warn!(user = %id, "no such user, clearing selection");
        }
        let hit = found.is_some();
        self.set_active_user(found);
        hit
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Messages of the active conversation, `is_self` resolved.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.get()
    }

    /// Receiver for the visible messages.
    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    /// The visible-messages observable, for [`Observable::updates`].
    pub fn messages_observable(&self) -> &Observable<Vec<ChatMessage>> {
        &self.messages
    }

    /// The stored messages of one conversation, as stored.
    pub fn messages_for(&self, key: &ConversationKey) -> Vec<ChatMessage> {
        self.state().list(key).cloned().unwrap_or_default()
    }

    /// Append `message` to the channel or direct conversation `target_id`.
    pub fn add_message(&self, target_id: &str, message: ChatMessage, is_dm: bool) {
        let key = ConversationKey::new(target_id, is_dm);
        let mut state = self.state();
        debug!(conversation = %key, id = %message.id, "message added");
        state.list_or_create(key).push(message);
        self.publish_messages(&state);
    }

    /// Mutate one message (top-level or reply) of a conversation in place.
    pub fn update_message(
        &self,
        key: &ConversationKey,
        id: MessageId,
        f: impl FnOnce(&mut ChatMessage),
    ) -> bool {
        let mut state = self.state();
        let Some(message) = state.list_mut(key).and_then(|list| find_message_mut(list, id)) else {
            debug!(conversation = %key, id = %id, "message not found");
            return false;
        };
        f(message);
        self.publish_messages(&state);
        true
    }

    /// Recompute and publish the visible messages.
    pub fn update_messages_for_active_target(&self) {
        let state = self.state();
        self.publish_messages(&state);
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Description of `name`, empty when none was set.
    pub fn description(&self, name: &str) -> String {
        self.state()
            .descriptions
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Set the description of `name` and refresh its listed and active
    /// snapshots.
    pub fn set_description(&self, name: &str, description: &str) {
        let mut state = self.state();
        state
            .descriptions
            .insert(name.to_string(), description.to_string());
        self.sync_channel(&mut state, name);
    }

    /// Display name of the creator, `Unbekannt` when unknown.
    pub fn created_by(&self, name: &str) -> String {
        self.state()
            .creators
            .get(name)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    /// Record the creator's display name for `name`.
    pub fn set_created_by(&self, name: &str, creator: &str) {
        let mut state = self.state();
        state.creators.insert(name.to_string(), creator.to_string());
        self.sync_channel(&mut state, name);
    }

    /// Members of `name`, empty for an unknown channel.
    pub fn members_for_channel(&self, name: &str) -> Vec<User> {
        self.state().members.get(name).cloned().unwrap_or_default()
    }

    /// Replace the member list of `name`.
    pub fn set_members_for_channel(&self, name: &str, members: Vec<User>) {
        let mut state = self.state();
        state.members.insert(name.to_string(), members);
        self.sync_channel(&mut state, name);
    }

    /// Add whoever in `users` isn't a member yet. Returns how many joined.
    pub fn add_members(&self, name: &str, users: Vec<User>) -> usize {
        let mut state = self.state();
        let members = state.members.entry(name.to_string()).or_default();
        let before = members.len();
        for user in users {
            if !members.iter().any(|m| m.id == user.id) {
                members.push(user);
            }
        }
        let added = members.len() - before;
        if added > 0 {
            info!(channel = %name, added, "members added");
            self.sync_channel(&mut state, name);
        }
        added
    }

    /// Drop `user` from the members of `name`.
    pub fn remove_member(&self, name: &str, user: &UserId) -> bool {
        let mut state = self.state();
        let Some(members) = state.members.get_mut(name) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| &m.id != user);
        let removed = members.len() != before;
        if removed {
            self.sync_channel(&mut state, name);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Rewrite the listed entry for `name` from the side tables and refresh
    /// the active snapshot if `name` is the active channel.
    fn sync_channel(&self, state: &mut ChannelState, name: &str) {
        if state.refresh_entry(name) {
            self.channels.set(state.channels.clone());
        }
        if state.is_active_channel(name) {
            let snapshot = state.snapshot(name);
            state.active_channel = Some(snapshot.clone());
            self.active_channel.set(Some(snapshot));
        }
    }

    fn publish_messages(&self, state: &ChannelState) {
        let me = self.users.current_user_id();
        let visible = state
            .active_conversation()
            .and_then(|key| state.list(&key))
            .map(|list| {
                list.iter()
                    .cloned()
                    .map(|mut m| {
                        m.mark_self(&me);
                        m
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.messages.set(visible);
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rekey<V>(map: &mut HashMap<String, V>, old: &str, new: String) {
    if let Some(value) = map.remove(old) {
        map.insert(new, value);
    }
}

fn find_message_mut(list: &mut [ChatMessage], id: MessageId) -> Option<&mut ChatMessage> {
    let pos = list.iter().position(|m| m.id == id);
    match pos {
        Some(pos) => Some(&mut list[pos]),
        None => list.iter_mut().find_map(|m| m.reply_mut(id)),
    }
}
