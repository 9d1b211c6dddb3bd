use serde::{Deserialize, Serialize};

use crate::constants::DEMO_ROSTER;

// User identity = stable opaque string handed out by the auth collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A known user. Only `name` and `avatar` change after creation; presence is
/// tracked separately and survives profile edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    #[serde(default)]
    pub is_online: bool,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
            is_online: false,
        }
    }

    pub fn online(mut self) -> Self {
        self.is_online = true;
        self
    }
}

/// A group conversation. The name doubles as its key, so renaming a channel
/// means moving everything stored under the old name.
///
/// `description`, `created_by` and `members` are optional on the wire: when a
/// channel snapshot carries them they are written through to the channel
/// store's metadata, when it doesn't the stored values stay authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<User>>,
}

impl Channel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    pub fn with_members(mut self, members: Vec<User>) -> Self {
        self.members = Some(members);
        self
    }
}

/// Addresses one message list: a channel by name or a direct-message
/// conversation by the peer's id. The two namespaces never overlap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum ConversationKey {
    Channel(String),
    Direct(UserId),
}

impl ConversationKey {
    pub fn new(target_id: &str, is_dm: bool) -> Self {
        if is_dm {
            Self::Direct(UserId::from(target_id))
        } else {
            Self::Channel(target_id.to_string())
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(name) => write!(f, "#{name}"),
            Self::Direct(id) => write!(f, "@{id}"),
        }
    }
}

/// What the auth collaborator knows about the signed-in account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Avatar path for a roster member.
pub fn avatar_for(name: &str) -> String {
    format!("assets/{name}.png")
}

/// The fixed roster every session starts with, everyone offline.
pub fn demo_roster() -> Vec<User> {
    DEMO_ROSTER
        .iter()
        .map(|(id, name)| User::new(*id, *name, avatar_for(name)))
        .collect()
}
