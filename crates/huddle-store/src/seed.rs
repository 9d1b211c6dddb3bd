//! Demo content for a fresh workspace.

use chrono::{Duration, Utc};
use tracing::info;

use huddle_shared::constants::{SYSTEM_CHANNEL, SYSTEM_CHANNEL_DESCRIPTION};
use huddle_shared::{Channel, ChatMessage, MessageId, User, UserId};

use crate::channels::ChannelStore;

const SYSTEM_CHANNEL_MEMBERS: &[&str] = &["frederik", "sofia", "noah", "elise"];

/// Create the system channel with its members and opening conversation, and
/// make it the active channel.
pub fn seed_demo_workspace(channels: &ChannelStore) {
    let roster = channels.users().all_users();
    let find = |id: &str| roster.iter().find(|u| u.id.as_str() == id).cloned();

    let members: Vec<User> = SYSTEM_CHANNEL_MEMBERS.iter().filter_map(|id| find(*id)).collect();
    let creator = find("noah").map(|u| u.name).unwrap_or_default();

    let channel = Channel::named(SYSTEM_CHANNEL)
        .with_description(SYSTEM_CHANNEL_DESCRIPTION)
        .with_creator(creator)
        .with_members(members);
    channels.add_channel(channel.clone());

    let yesterday = Utc::now() - Duration::days(1);
    let author = |id: &str| {
        find(id).unwrap_or_else(|| User::new(UserId::from(id), id, String::new()))
    };

    let mut question = ChatMessage::compose(
        MessageId(1),
        &author("noah"),
        "Welche Version ist aktuell von Angular?",
        yesterday,
    );
    question.replies = vec![
        ChatMessage::compose(
            MessageId(2),
            &author("sofia"),
            "Ich glaube 17.1, oder?",
            yesterday + Duration::minutes(1),
        )
        .in_reply_to(MessageId(1)),
        ChatMessage::compose(
            MessageId(3),
            &author("frederik"),
            "Die aktuelle Version ist 17.2.1.",
            yesterday + Duration::minutes(2),
        )
        .in_reply_to(MessageId(1)),
    ];

    channels.add_message(SYSTEM_CHANNEL, question, false);
    channels.set_active_channel(Some(channel));

    info!(channel = SYSTEM_CHANNEL, "demo workspace seeded");
}
