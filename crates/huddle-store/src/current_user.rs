//! The signed-in user and the roster of everyone the client knows about.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use huddle_shared::constants::{DEFAULT_AVATAR, PREF_AVATAR, PREF_USERNAME, UNKNOWN_NAME};
use huddle_shared::types::demo_roster;
use huddle_shared::{ExternalIdentity, User, UserId};

use crate::observable::Observable;
use crate::preferences::Preferences;

/// Out-of-band notifications about profile edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    NameChanged(String),
    AvatarChanged(String),
}

struct Profile {
    current: User,
    roster: Vec<User>,
}

pub struct CurrentUserStore {
    state: Mutex<Profile>,
    current: Observable<User>,
    users: Observable<Vec<User>>,
    events: broadcast::Sender<ProfileEvent>,
    prefs: Arc<dyn Preferences>,
}

impl CurrentUserStore {
    /// Seed the store from the fixed demo roster plus `identity`.
    pub fn new(identity: User, prefs: Arc<dyn Preferences>) -> Self {
        Self::with_roster(identity, demo_roster(), prefs)
    }

    /// Seed the store from `roster` plus `identity`. Stored preferences take
    /// precedence over the identity's name and avatar.
    pub fn with_roster(identity: User, roster: Vec<User>, prefs: Arc<dyn Preferences>) -> Self {
        let name = read_pref(prefs.as_ref(), PREF_USERNAME)
            .or_else(|| non_blank(&identity.name))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let avatar = read_pref(prefs.as_ref(), PREF_AVATAR)
            .or_else(|| non_blank(&identity.avatar))
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());
        let current = User {
            name,
            avatar,
            ..identity
        };

        let mut roster = roster;
        match roster.iter_mut().find(|u| u.id == current.id) {
            Some(entry) => *entry = current.clone(),
            None => roster.push(current.clone()),
        }

        debug!(user = %current.id, name = %current.name, "current user loaded");

        let (events, _) = broadcast::channel(16);
        Self {
            current: Observable::new(current.clone()),
            users: Observable::new(roster.clone()),
            state: Mutex::new(Profile { current, roster }),
            events,
            prefs,
        }
    }

    pub fn current_user(&self) -> User {
        self.current.get()
    }

    pub fn current_user_id(&self) -> UserId {
        self.state().current.id.clone()
    }

    pub fn subscribe_current_user(&self) -> watch::Receiver<User> {
        self.current.subscribe()
    }

    /// Every known user in insertion order.
    pub fn all_users(&self) -> Vec<User> {
        self.users.get()
    }

    pub fn subscribe_users(&self) -> watch::Receiver<Vec<User>> {
        self.users.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    pub fn find_user(&self, id: &UserId) -> Option<User> {
        self.state().roster.iter().find(|u| &u.id == id).cloned()
    }

    /// Change the display name. Blank names are ignored.
    pub fn update_name(&self, name: &str) -> bool {
        let Some(name) = non_blank(name) else {
            return false;
        };

        self.edit_profile(|user| user.name = name.clone());
        self.persist(PREF_USERNAME, &name);
        let _ = self.events.send(ProfileEvent::NameChanged(name));
        true
    }

    /// Change the avatar. Blank paths are ignored.
    pub fn update_avatar(&self, avatar: &str) -> bool {
        let Some(avatar) = non_blank(avatar) else {
            return false;
        };

        self.edit_profile(|user| user.avatar = avatar.clone());
        self.persist(PREF_AVATAR, &avatar);
        let _ = self.events.send(ProfileEvent::AvatarChanged(avatar));
        true
    }

    /// Adopt the display name reported by the auth collaborator, if it has one
    /// and it differs from the current name.
    pub fn apply_external_identity(&self, identity: &ExternalIdentity) -> bool {
        let current_name = self.current_user().name;
        match identity.display_name.as_deref() {
            Some(name) if name.trim() != current_name => self.update_name(name),
            _ => false,
        }
    }

    /// Mark a roster entry as online or offline.
    pub fn set_presence(&self, id: &UserId, online: bool) -> bool {
        let mut state = self.state();
        let Some(entry) = state.roster.iter_mut().find(|u| &u.id == id) else {
            warn!(user = %id, "presence update for unknown user");
            return false;
        };
        entry.is_online = online;
        if &state.current.id == id {
            state.current.is_online = online;
            self.current.set(state.current.clone());
        }
        self.users.set(state.roster.clone());
        true
    }

    fn edit_profile(&self, edit: impl FnOnce(&mut User)) {
        let mut state = self.state();
        edit(&mut state.current);
        let current = state.current.clone();
        upsert_user(&mut state.roster, &current);

        self.current.set(current);
        self.users.set(state.roster.clone());
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.prefs.set(key, value) {
            warn!(key, error = %e, "failed to persist profile setting");
        }
    }

    fn state(&self) -> MutexGuard<'_, Profile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Insert `user` into `roster`, or merge it into the entry with the same id
/// while keeping that entry's presence.
pub fn upsert_user(roster: &mut Vec<User>, user: &User) {
    match roster.iter_mut().find(|u| u.id == user.id) {
        Some(existing) => {
            let is_online = existing.is_online;
            *existing = User {
                is_online,
                ..user.clone()
            };
        }
        None => roster.push(user.clone()),
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_pref(prefs: &dyn Preferences, key: &str) -> Option<String> {
    match prefs.get(key) {
        Ok(value) => value.as_deref().and_then(non_blank),
        Err(e) => {
            warn!(key, error = %e, "failed to read preference");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferences;

    fn frederik() -> User {
        User::new("frederik", "Frederik Beck", "assets/Frederik Beck.png").online()
    }

    fn store_with(prefs: Arc<MemoryPreferences>) -> CurrentUserStore {
        CurrentUserStore::new(frederik(), prefs)
    }

    #[test]
    fn blank_name_is_ignored() {
        let prefs = Arc::new(MemoryPreferences::new());
        let store = store_with(prefs.clone());

        assert!(!store.update_name("   "));
        assert_eq!(store.current_user().name, "Frederik Beck");
        assert_eq!(prefs.get(PREF_USERNAME).unwrap(), None);
    }

    #[test]
    fn rename_updates_roster_and_keeps_presence() {
        let prefs = Arc::new(MemoryPreferences::new());
        let store = store_with(prefs.clone());

        assert!(store.update_name("  Fred  "));

        let me = store.current_user();
        assert_eq!(me.name, "Fred");
        let entry = store.find_user(&me.id).unwrap();
        assert_eq!(entry.name, "Fred");
        assert!(entry.is_online);
        assert_eq!(prefs.get(PREF_USERNAME).unwrap().as_deref(), Some("Fred"));
    }

    #[test]
    fn upsert_preserves_existing_presence() {
        let mut roster = vec![User::new("noah", "Noah Braun", "n.png").online()];
        upsert_user(&mut roster, &User::new("noah", "Noah B.", "n2.png"));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Noah B.");
        assert_eq!(roster[0].avatar, "n2.png");
        assert!(roster[0].is_online);

        upsert_user(&mut roster, &User::new("lena", "Lena", "l.png"));
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].id, UserId::from("lena"));
    }

    #[test]
    fn stored_preferences_win_over_identity() {
        let prefs = Arc::new(MemoryPreferences::with(&[
            (PREF_USERNAME, "Freddy"),
            (PREF_AVATAR, "assets/custom.png"),
        ]));
        let store = store_with(prefs);

        let me = store.current_user();
        assert_eq!(me.name, "Freddy");
        assert_eq!(me.avatar, "assets/custom.png");
        assert_eq!(store.all_users().iter().filter(|u| u.id == me.id).count(), 1);
    }

    #[test]
    fn missing_name_falls_back_to_defaults() {
        let prefs = Arc::new(MemoryPreferences::new());
        let store = CurrentUserStore::with_roster(User::new("guest", "", ""), Vec::new(), prefs);

        let me = store.current_user();
        assert_eq!(me.name, UNKNOWN_NAME);
        assert_eq!(me.avatar, DEFAULT_AVATAR);
        assert_eq!(store.all_users(), vec![me]);
    }

    #[test]
    fn avatar_update_emits_event_and_keeps_presence() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        let mut events = store.subscribe_events();

        assert!(store.update_avatar("assets/Elise Roth.png"));
        assert_eq!(
            events.try_recv().unwrap(),
            ProfileEvent::AvatarChanged("assets/Elise Roth.png".into())
        );
        assert!(store.current_user().is_online);
    }

    #[test]
    fn name_update_emits_exactly_one_event() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        let mut events = store.subscribe_events();

        store.update_name("Fred");
        assert_eq!(events.try_recv().unwrap(), ProfileEvent::NameChanged("Fred".into()));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn external_identity_only_applies_real_changes() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        let mut identity = ExternalIdentity {
            uid: "abc".into(),
            display_name: Some("Frederik Beck".into()),
            email: None,
        };
        assert!(!store.apply_external_identity(&identity));

        identity.display_name = Some("F. Beck".into());
        assert!(store.apply_external_identity(&identity));
        assert_eq!(store.current_user().name, "F. Beck");

        identity.display_name = None;
        assert!(!store.apply_external_identity(&identity));
    }

    #[test]
    fn presence_tracks_roster_and_current_user() {
        let store = store_with(Arc::new(MemoryPreferences::new()));
        assert!(store.set_presence(&UserId::from("sofia"), true));
        assert!(store.find_user(&UserId::from("sofia")).unwrap().is_online);

        assert!(store.set_presence(&UserId::from("frederik"), false));
        assert!(!store.current_user().is_online);

        assert!(!store.set_presence(&UserId::from("ghost"), true));
    }
}
