//! `@user` / `#channel` completion and the workspace search box.

use serde::Serialize;

use huddle_shared::{Channel, User, UserId};

/// A trailing `@term` or `#term` at the end of the compose box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionQuery<'a> {
    User(&'a str),
    Channel(&'a str),
}

/// What to offer for the text currently being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestions {
    None,
    Users(Vec<User>),
    Channels(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SearchResult {
    Channel { name: String },
    User { id: UserId, name: String, avatar: String },
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Find the mention being typed at the end of `input`, if any.
pub fn trailing_mention(input: &str) -> Option<MentionQuery<'_>> {
    let head = input.trim_end_matches(is_word);
    let term = &input[head.len()..];
    match head.chars().last()? {
        '@' => Some(MentionQuery::User(term)),
        '#' => Some(MentionQuery::Channel(term)),
        _ => None,
    }
}

/// Replace the trailing `@term`/`#term` with the completed mention.
pub fn complete_mention(input: &str, query: MentionQuery<'_>, label: &str) -> String {
    let (sigil, term) = match query {
        MentionQuery::User(term) => ('@', term),
        MentionQuery::Channel(term) => ('#', term),
    };
    let keep = input.len() - term.len() - sigil.len_utf8();
    format!("{}{sigil}{label} ", &input[..keep])
}

pub fn matches(name: &str, term: &str) -> bool {
    name.to_lowercase().contains(&term.to_lowercase())
}

/// Channels whose name contains `term`, then users whose name does.
pub fn search(channels: &[Channel], users: &[User], term: &str) -> Vec<SearchResult> {
    let channels = channels
        .iter()
        .filter(|c| matches(&c.name, term))
        .map(|c| SearchResult::Channel {
            name: c.name.clone(),
        });
    let users = users
        .iter()
        .filter(|u| matches(&u.name, term))
        .map(|u| SearchResult::User {
            id: u.id.clone(),
            name: u.name.clone(),
            avatar: u.avatar.clone(),
        });
    channels.chain(users).collect()
}
