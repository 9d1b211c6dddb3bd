/// Application name
pub const APP_NAME: &str = "huddle";

/// The channel every workspace starts with. It cannot be renamed, left or removed.
pub const SYSTEM_CHANNEL: &str = "Entwicklerteam";

/// Description seeded for the system channel.
pub const SYSTEM_CHANNEL_DESCRIPTION: &str = "Dieser Channel ist für alles rund um #Entwicklerteam vorgesehen. Hier kannst du zusammen mit deinem Team Meetings abhalten, Dokumente teilen und Entscheidungen treffen.";

/// Fallback for unknown display names and channel creators.
pub const UNKNOWN_NAME: &str = "Unbekannt";

/// Avatar used when nothing else is known about a user.
pub const DEFAULT_AVATAR: &str = "assets/avatar-default.png";

/// Preference key holding the chosen display name.
pub const PREF_USERNAME: &str = "username";

/// Preference key holding the chosen avatar path.
pub const PREF_AVATAR: &str = "avatar";

/// Directory prefix for uploaded chat attachments.
pub const UPLOAD_PREFIX: &str = "uploads";

/// Maximum attachment size in bytes (10 MiB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Id of the identity signed in when nothing else is configured.
pub const DEFAULT_USER_ID: &str = "frederik";

/// Fixed roster every workspace knows about: `(id, display name)`.
/// Avatars live at `assets/<display name>.png`.
pub const DEMO_ROSTER: &[(&str, &str)] = &[
    ("frederik", "Frederik Beck"),
    ("sofia", "Sofia Müller"),
    ("noah", "Noah Braun"),
    ("elise", "Elise Roth"),
    ("elias", "Elias Neumann"),
    ("steffen", "Steffen Hoffmann"),
];

/// Emojis offered by the reaction picker.
pub const REACTION_EMOJIS: &[&str] = &["😀", "😄", "🚀", "❤️", "👍", "✅", "🎯", "😂"];
