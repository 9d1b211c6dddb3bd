//! A signed-in client: the three stores wired to their collaborators, plus
//! the commands the UI issues.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use huddle_shared::constants::{DEFAULT_AVATAR, PREF_USERNAME, UNKNOWN_NAME, UPLOAD_PREFIX};
use huddle_shared::types::demo_roster;
use huddle_shared::{
    Channel, ChatMessage, ConversationKey, MessageId, MessageIdGenerator, User, UserId,
};
use huddle_store::{
    is_system_channel, ChannelStore, CurrentUserStore, Database, Preferences, ReplySync,
    SqlitePreferences, ThreadState, ThreadStore,
};

use crate::auth::{AuthProvider, IdentityToolkitAuth, MemoryAuth};
use crate::config::ClientConfig;
use crate::error::{ClientError, UploadError};
use crate::files::{self, FileStorage, LocalFileStorage, UploadTask};
use crate::mentions::{self, MentionQuery, SearchResult, Suggestions};

pub struct Session {
    users: Arc<CurrentUserStore>,
    channels: Arc<ChannelStore>,
    threads: Arc<ThreadStore>,
    prefs: Arc<dyn Preferences>,
    auth: Arc<dyn AuthProvider>,
    files: Arc<dyn FileStorage>,
    ids: MessageIdGenerator,
}

impl Session {
    /// Build the stores in dependency order around `identity`.
    pub fn new(
        identity: User,
        prefs: Arc<dyn Preferences>,
        auth: Arc<dyn AuthProvider>,
        files: Arc<dyn FileStorage>,
    ) -> Self {
        let users = Arc::new(CurrentUserStore::new(identity, prefs.clone()));
        let channels = Arc::new(ChannelStore::new(users.clone()));
        let threads = Arc::new(ThreadStore::new(channels.clone()));

        Self {
            users,
            channels,
            threads,
            prefs,
            auth,
            files,
            ids: MessageIdGenerator::new(),
        }
    }

    /// Open the preference database and pick collaborators from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let db = match config.database_path() {
            Some(path) => Database::open_at(&path)?,
            None => Database::new()?,
        };
        let prefs: Arc<dyn Preferences> = Arc::new(SqlitePreferences::new(db));

        let auth: Arc<dyn AuthProvider> = match &config.auth_api_key {
            Some(key) => Arc::new(IdentityToolkitAuth::new(&config.auth_endpoint, key)),
            None => {
                debug!("no auth API key configured, using in-memory accounts");
                Arc::new(MemoryAuth::new())
            }
        };
        let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            &config.upload_dir,
            &config.public_url,
            config.max_upload_size,
        ));

        let identity = demo_roster()
            .into_iter()
            .find(|u| u.id.as_str() == config.user_id)
            .unwrap_or_else(|| {
                warn!(user = %config.user_id, "user not in roster, starting anonymous");
                User::new(config.user_id.as_str(), UNKNOWN_NAME, DEFAULT_AVATAR)
            });

        Ok(Self::new(identity, prefs, auth, files))
    }

    pub fn users(&self) -> &Arc<CurrentUserStore> {
        &self.users
    }

    pub fn channels(&self) -> &Arc<ChannelStore> {
        &self.channels
    }

    pub fn threads(&self) -> &Arc<ThreadStore> {
        &self.threads
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Post to the active conversation. A selected direct-message peer wins
    /// over the active channel.
    pub fn send_message(&self, content: &str) -> Option<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let key = self.channels.active_conversation()?;

        let message = self.compose(content);
        match &key {
            ConversationKey::Channel(name) => self.channels.add_message(name, message.clone(), false),
            ConversationKey::Direct(id) => self.channels.add_message(id.as_str(), message.clone(), true),
        }
        debug!(conversation = %key, id = %message.id, "message sent");
        Some(message)
    }

    /// Post to an explicit recipient, `#channel` or `@user-id`, and switch to
    /// that conversation. Unknown recipients and blank content send nothing.
    pub fn send_to(&self, recipient: &str, content: &str) -> Option<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let recipient = recipient.trim();

        if let Some(name) = recipient.strip_prefix('#') {
            let name = name.trim();
            if !self.channels.has_channel(name) {
                warn!(channel = %name, "no such channel, message not sent");
                return None;
            }
            let message = self.compose(content);
            self.channels.add_message(name, message.clone(), false);
            self.channels.set_active_channel_by_name(name);
            debug!(channel = %name, id = %message.id, "message sent to channel");
            return Some(message);
        }

        if let Some(id) = recipient.strip_prefix('@') {
            let id = UserId::from(id.trim());
            if self.users.find_user(&id).is_none() {
                warn!(user = %id, "no such user, message not sent");
                return None;
            }
            let message = self.compose(content);
            self.channels.add_message(id.as_str(), message.clone(), true);
            self.channels.set_active_user_by_id(&id);
            debug!(user = %id, id = %message.id, "direct message sent");
            return Some(message);
        }

        warn!(%recipient, "recipient needs a # or @ prefix");
        None
    }

    /// Upload a file and post a link to it. Nothing is posted if the upload
    /// fails.
    pub async fn send_attachment(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<ChatMessage>, ClientError> {
        if self.channels.active_conversation().is_none() {
            return Ok(None);
        }
        let link = self.upload(file_name, bytes).await?;
        Ok(self.send_message(&link))
    }

    /// Reply in the open thread.
    pub fn reply_in_thread(&self, content: &str) -> Option<(ChatMessage, ReplySync)> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let root = self.threads.root()?;

        let reply = self.compose(content).in_reply_to(root.id);
        let outcome = self.threads.add_reply(reply.clone());
        debug!(root = %root.id, id = %reply.id, ?outcome, "thread reply sent");
        Some((reply, outcome))
    }

    pub async fn reply_attachment_in_thread(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<(ChatMessage, ReplySync)>, ClientError> {
        if self.threads.state() == ThreadState::Closed {
            return Ok(None);
        }
        let link = self.upload(file_name, bytes).await?;
        Ok(self.reply_in_thread(&link))
    }

    /// Start replying to `message`. In a channel this opens its thread; in a
    /// direct conversation the mention is only returned for the compose box.
    pub fn reply_to(&self, message: &ChatMessage) -> String {
        let mention = if message.author.is_empty() {
            String::new()
        } else {
            format!("@{} ", message.author)
        };

        if self.channels.active_user().is_none() {
            self.threads.open_thread(message.clone(), &mention);
        }
        mention
    }

    /// Toggle the current user's `emoji` on a message of the active
    /// conversation, or on a reply of the open thread.
    pub fn toggle_reaction(&self, id: MessageId, emoji: &str) -> bool {
        let me = self.users.current_user_id();
        let reached = match self.channels.active_conversation() {
            Some(key) => self.channels.update_message(&key, id, |m| {
                m.toggle_reaction(emoji, &me);
            }),
            None => false,
        };
        if reached {
            self.threads.refresh();
            return true;
        }
        self.threads
            .update_reply(id, |r| {
                r.toggle_reaction(emoji, &me);
            })
            .is_some()
    }

    /// Toggle the current user's `emoji` on a reply in the open thread.
    pub fn toggle_reply_reaction(&self, id: MessageId, emoji: &str) -> Option<ReplySync> {
        let me = self.users.current_user_id();
        self.threads.update_reply(id, |r| {
            r.toggle_reaction(emoji, &me);
        })
    }

    /// Replace the content of a message in the active conversation or a reply
    /// of the open thread. Blank
    /// content leaves the message untouched.
    pub fn edit_message(&self, id: MessageId, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        let mut edited = false;
        let reached = match self.channels.active_conversation() {
            Some(key) => self.channels.update_message(&key, id, |m| edited = m.edit(content)),
            None => false,
        };
        if reached {
            self.threads.refresh();
            return edited;
        }
        self.threads.update_reply(id, |r| edited = r.edit(content)).is_some() && edited
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Create a channel owned by the current user and switch to it.
    pub fn create_channel(&self, name: &str, description: &str, members: Vec<User>) -> Option<Channel> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let me = self.users.current_user();
        let mut channel = Channel::named(name).with_creator(me.name.clone());
        if !description.trim().is_empty() {
            channel = channel.with_description(description.trim());
        }
        let mut roster = vec![me];
        for user in members {
            if !roster.iter().any(|m| m.id == user.id) {
                roster.push(user);
            }
        }
        channel = channel.with_members(roster);

        if !self.channels.add_channel(channel.clone()) {
            return None;
        }
        self.channels.set_active_channel(Some(channel.clone()));
        info!(channel = %name, "channel created");
        Some(channel)
    }

    /// Remove a channel for everyone.
    pub fn delete_channel(&self, name: &str) -> bool {
        if is_system_channel(name) {
            warn!(channel = %name, "the system channel cannot be deleted");
            return false;
        }
        let was_active = self.is_active_channel(name);
        let removed = self.channels.remove_channel(name);
        if removed && was_active && self.channels.active_user().is_none() {
            self.activate_fallback();
        }
        removed
    }

    /// Leave a channel: drop the current user from its members and take it
    /// off the list. Its messages and metadata stay stored.
    pub fn leave_channel(&self, name: &str) -> bool {
        if is_system_channel(name) {
            warn!(channel = %name, "the system channel cannot be left");
            return false;
        }
        if !self.channels.has_channel(name) {
            warn!(channel = %name, "leave of unknown channel ignored");
            return false;
        }

        let was_active = self.is_active_channel(name);
        let me = self.users.current_user_id();
        self.channels.remove_member(name, &me);
        if !self.channels.unlist_channel(name) {
            return false;
        }
        info!(channel = %name, user = %me, "channel left");
        if was_active && self.channels.active_user().is_none() {
            self.activate_fallback();
        }
        true
    }

    /// Add users to the active channel. Returns how many were new.
    pub fn add_members_to_active_channel(&self, users: Vec<User>) -> usize {
        if self.channels.active_user().is_some() {
            return 0;
        }
        match self.channels.active_channel() {
            Some(channel) => self.channels.add_members(&channel.name, users),
            None => 0,
        }
    }

    fn is_active_channel(&self, name: &str) -> bool {
        self.channels
            .active_channel()
            .is_some_and(|c| c.name == name)
    }

    fn activate_fallback(&self) {
        let names = self.channels.channel_names();
        let fallback = names
            .iter()
            .find(|n| is_system_channel(n))
            .or_else(|| names.first());

        match fallback {
            Some(name) => {
                debug!(channel = %name, "activating fallback channel");
                self.channels.set_active_channel_by_name(name);
            }
            None => self.channels.set_active_channel(None),
        }
    }

    // ------------------------------------------------------------------
    // Search and mentions
    // ------------------------------------------------------------------

    pub fn search(&self, term: &str) -> Vec<SearchResult> {
        mentions::search(&self.channels.channels(), &self.users.all_users(), term)
    }

    pub fn select_search_result(&self, result: &SearchResult) -> bool {
        match result {
            SearchResult::Channel { name } => self.channels.set_active_channel_by_name(name),
            SearchResult::User { id, .. } => self.channels.set_active_user_by_id(id),
        }
    }

    /// Completions for a trailing `@term` (people in the active conversation)
    /// or `#term` (channel names).
    pub fn mention_suggestions(&self, input: &str) -> Suggestions {
        match mentions::trailing_mention(input) {
            Some(MentionQuery::User(term)) => Suggestions::Users(
                self.conversation_people()
                    .into_iter()
                    .filter(|u| mentions::matches(&u.name, term))
                    .collect(),
            ),
            Some(MentionQuery::Channel(term)) => Suggestions::Channels(
                self.channels
                    .channel_names()
                    .into_iter()
                    .filter(|n| mentions::matches(n, term))
                    .collect(),
            ),
            None => Suggestions::None,
        }
    }

    fn conversation_people(&self) -> Vec<User> {
        if let Some(peer) = self.channels.active_user() {
            let me = self.users.current_user();
            return if peer.id == me.id { vec![me] } else { vec![me, peer] };
        }
        self.channels
            .active_channel()
            .map(|c| self.channels.members_for_channel(&c.name))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let identity = self.auth.sign_in(email, password).await?;
        self.users.apply_external_identity(&identity);
        Ok(self.users.current_user())
    }

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        let identity = self.auth.sign_up(name, email, password).await?;
        self.users.apply_external_identity(&identity);
        Ok(self.users.current_user())
    }

    /// Sign out and forget the stored display name.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.auth.sign_out().await?;
        if let Err(e) = self.prefs.remove(PREF_USERNAME) {
            warn!(error = %e, "failed to forget stored username");
        }
        self.threads.close();
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), ClientError> {
        Ok(self.auth.reset_password(email).await?)
    }

    /// Pull the display name from the auth collaborator, if signed in.
    pub fn refresh_current_user(&self) -> bool {
        match self.auth.current_identity() {
            Some(identity) => self.users.apply_external_identity(&identity),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn compose(&self, content: &str) -> ChatMessage {
        ChatMessage::compose(self.ids.next_id(), &self.users.current_user(), content, Utc::now())
    }

    /// Store an attachment and return the message text linking to it.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        let destination = format!(
            "{UPLOAD_PREFIX}/{}_{}",
            Utc::now().timestamp_millis(),
            file_name
        );
        let UploadTask {
            mut progress,
            result,
        } = self.files.upload_file(bytes, &destination);

        let name = file_name.to_string();
        tokio::spawn(async move {
            while let Some(percent) = progress.recv().await {
                debug!(file = %name, percent, "upload progress");
            }
        });

        match files::resolve(result).await {
            Ok(url) => Ok(format!("[Datei: {file_name}]({url})")),
            Err(e) => {
                warn!(file = %file_name, error = %e, "attachment not sent");
                Err(e)
            }
        }
    }
}
