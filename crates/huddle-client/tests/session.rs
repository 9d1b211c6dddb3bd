use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use huddle_client::mentions::{SearchResult, Suggestions};
use huddle_client::{
    ClientError, FileStorage, LocalFileStorage, MemoryAuth, Session, UploadError, UploadTask,
};
use huddle_shared::constants::{PREF_USERNAME, SYSTEM_CHANNEL};
use huddle_shared::{Channel, ConversationKey, User, UserId};
use huddle_store::seed::seed_demo_workspace;
use huddle_store::{MemoryPreferences, Preferences, ReplySync, ThreadState};

/// Storage that fails every upload.
struct BrokenStorage;

impl FileStorage for BrokenStorage {
    fn upload_file(&self, _bytes: Vec<u8>, _destination: &str) -> UploadTask {
        let (_progress_tx, progress) = mpsc::unbounded_channel();
        let (tx, result) = oneshot::channel();
        let _ = tx.send(Err(UploadError::Interrupted));
        UploadTask { progress, result }
    }
}

/// Storage whose uploads vanish without an answer.
struct VanishingStorage;

impl FileStorage for VanishingStorage {
    fn upload_file(&self, _bytes: Vec<u8>, _destination: &str) -> UploadTask {
        let (_progress_tx, progress) = mpsc::unbounded_channel();
        let (_tx, result) = oneshot::channel();
        UploadTask { progress, result }
    }
}

fn frederik() -> User {
    User::new("frederik", "Frederik Beck", "assets/Frederik Beck.png")
}

fn session_with(files: Arc<dyn FileStorage>, prefs: Arc<MemoryPreferences>) -> Session {
    let auth = MemoryAuth::new().with_account("Frederik Beck", "frederik@example.org", "geheim123");
    let session = Session::new(frederik(), prefs, Arc::new(auth), files);
    seed_demo_workspace(session.channels());
    session
}

fn session() -> (Session, TempDir) {
    let dir = TempDir::new().unwrap();
    let files = LocalFileStorage::new(dir.path(), "https://files.example.org", 1024);
    let session = session_with(Arc::new(files), Arc::new(MemoryPreferences::new()));
    (session, dir)
}

#[tokio::test]
async fn send_message_targets_active_conversation() {
    let (session, _dir) = session();

    assert!(session.send_message("   ").is_none());

    let sent = session.send_message("  Hallo Team  ").unwrap();
    assert_eq!(sent.content, "Hallo Team");
    let visible = session.channels().messages();
    assert_eq!(visible.len(), 2);
    assert!(visible[1].is_self);

    assert!(session.channels().set_active_user_by_id(&UserId::from("sofia")));
    session.send_message("Hi Sofia").unwrap();
    let direct = session
        .channels()
        .messages_for(&ConversationKey::Direct(UserId::from("sofia")));
    assert_eq!(direct.len(), 1);
    assert_eq!(
        session
            .channels()
            .messages_for(&ConversationKey::Channel(SYSTEM_CHANNEL.into()))
            .len(),
        2
    );
}

#[tokio::test]
async fn nothing_is_sent_without_a_target() {
    let (session, _dir) = session();
    session.channels().set_active_channel(None);
    assert!(session.send_message("Hallo").is_none());
    assert!(session
        .send_attachment("a.txt", b"x".to_vec())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn attachment_is_posted_as_link() {
    let (session, dir) = session();

    let message = session
        .send_attachment("plan.txt", b"Sprint".to_vec())
        .await
        .unwrap()
        .unwrap();

    assert!(message.content.starts_with("[Datei: plan.txt](https://files.example.org/uploads/"));
    assert!(message.content.ends_with("_plan.txt)"));
    assert!(dir.path().join("uploads").is_dir());
    assert_eq!(session.channels().messages().len(), 2);
}

#[tokio::test]
async fn failed_upload_sends_nothing() {
    let session = session_with(Arc::new(BrokenStorage), Arc::new(MemoryPreferences::new()));

    let err = session
        .send_attachment("plan.txt", b"Sprint".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Upload(UploadError::Interrupted)));
    assert_eq!(session.channels().messages().len(), 1);
}

#[tokio::test]
async fn vanished_upload_counts_as_interrupted() {
    let session = session_with(Arc::new(VanishingStorage), Arc::new(MemoryPreferences::new()));
    let err = session
        .send_attachment("plan.txt", b"Sprint".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Upload(UploadError::Interrupted)));
    assert_eq!(session.channels().messages().len(), 1);
}

#[tokio::test]
async fn oversized_upload_is_reported_verbatim() {
    let (session, _dir) = session();
    let err = session
        .send_attachment("big.bin", vec![0; 2048])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File too large: 2048 bytes (max 1024)");
}

#[tokio::test]
async fn reply_to_opens_thread_and_replies_reach_root() {
    let (session, _dir) = session();
    let question = session.channels().messages()[0].clone();

    let mention = session.reply_to(&question);
    assert_eq!(mention, "@Noah Braun ");
    assert_eq!(session.threads().state(), ThreadState::Open);
    assert_eq!(session.threads().initial_reply_text(), "@Noah Braun ");

    let (reply, outcome) = session.reply_in_thread("@Noah Braun 17.2.1").unwrap();
    assert_eq!(outcome, ReplySync::Synced);
    assert_eq!(reply.reply_to_id, Some(question.id));
    assert_eq!(session.threads().replies().len(), 3);
    assert_eq!(session.channels().messages()[0].replies.len(), 3);

    assert_eq!(
        session.toggle_reply_reaction(reply.id, "👍"),
        Some(ReplySync::Synced)
    );
    let root = &session.channels().messages()[0];
    assert_eq!(root.replies[2].reactions[0].count, 1);
}

#[tokio::test]
async fn thread_reply_keeps_earlier_reply_edits_and_reactions() {
    let (session, _dir) = session();
    let question = session.channels().messages()[0].clone();
    session.reply_to(&question);
    let first = session.threads().replies()[0].id;

    assert!(session.edit_message(first, "überarbeitet"));
    assert!(session.toggle_reaction(first, "👍"));
    assert_eq!(session.threads().replies()[0].content, "überarbeitet");

    let (_, outcome) = session.reply_in_thread("noch etwas").unwrap();
    assert_eq!(outcome, ReplySync::Synced);

    let root = &session.channels().messages()[0];
    assert_eq!(root.replies.len(), 3);
    assert_eq!(root.replies[0].content, "überarbeitet");
    assert!(root.replies[0].edited);
    assert_eq!(root.replies[0].reactions[0].count, 1);
    let replies = session.threads().replies();
    assert_eq!(replies[0].content, "überarbeitet");
    assert_eq!(replies[0].reactions[0].count, 1);
}

#[tokio::test]
async fn reply_edits_reach_a_thread_outside_the_active_conversation() {
    let (session, _dir) = session();
    let question = session.channels().messages()[0].clone();
    session.reply_to(&question);
    let first = session.threads().replies()[0].id;

    session.channels().set_active_user_by_id(&UserId::from("sofia"));
    assert!(session.edit_message(first, "im Thread"));
    assert_eq!(session.threads().replies()[0].content, "im Thread");
}

#[tokio::test]
async fn reply_to_in_direct_conversation_keeps_thread_closed() {
    let (session, _dir) = session();
    session.channels().set_active_user_by_id(&UserId::from("noah"));
    let message = session.send_message("Kurze Frage").unwrap();

    assert_eq!(session.reply_to(&message), "@Frederik Beck ");
    assert_eq!(session.threads().state(), ThreadState::Closed);
    assert!(session.reply_in_thread("egal").is_none());
    assert!(session
        .reply_attachment_in_thread("a.txt", b"x".to_vec())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reactions_and_edits() {
    let (session, _dir) = session();
    let sent = session.send_message("Tippfeler").unwrap();

    assert!(session.toggle_reaction(sent.id, "🚀"));
    let reactions = &session.channels().messages()[1].reactions;
    assert_eq!(reactions[0].users, vec![UserId::from("frederik")]);

    assert!(session.toggle_reaction(sent.id, "🚀"));
    assert!(session.channels().messages()[1].reactions.is_empty());

    assert!(!session.edit_message(sent.id, "   "));
    assert!(session.edit_message(sent.id, "Tippfehler"));
    let edited = &session.channels().messages()[1];
    assert_eq!(edited.content, "Tippfehler");
    assert!(edited.edited);
}

#[tokio::test]
async fn send_to_switches_to_the_recipient() {
    let (session, _dir) = session();
    session.channels().set_active_user_by_id(&UserId::from("noah"));

    let sent = session
        .send_to(&format!("#{SYSTEM_CHANNEL}"), "  Hallo Kanal ")
        .unwrap();
    assert_eq!(sent.content, "Hallo Kanal");
    assert!(session.channels().active_user().is_none());
    assert_eq!(session.channels().active_channel().unwrap().name, SYSTEM_CHANNEL);
    assert_eq!(session.channels().messages().len(), 2);

    session.send_to("@sofia", "Hallo Sofia").unwrap();
    assert_eq!(session.channels().active_user().unwrap().name, "Sofia Müller");
    let direct = session
        .channels()
        .messages_for(&ConversationKey::Direct(UserId::from("sofia")));
    assert_eq!(direct.len(), 1);
    assert_eq!(session.channels().messages().len(), 1);
}

#[tokio::test]
async fn send_to_rejects_unknown_recipients() {
    let (session, _dir) = session();

    assert!(session.send_to("#Nirgendwo", "Hallo").is_none());
    assert!(session.send_to("@ghost", "Hallo").is_none());
    assert!(session.send_to("sofia", "Hallo").is_none());
    assert!(session.send_to("@sofia", "   ").is_none());

    assert!(session
        .channels()
        .messages_for(&ConversationKey::Direct(UserId::from("ghost")))
        .is_empty());
    assert!(session
        .channels()
        .messages_for(&ConversationKey::Direct(UserId::from("sofia")))
        .is_empty());
    assert_eq!(session.channels().active_channel().unwrap().name, SYSTEM_CHANNEL);
    assert_eq!(session.channels().messages().len(), 1);
}

#[tokio::test]
async fn create_and_delete_channels() {
    let (session, _dir) = session();
    let sofia = session.users().find_user(&UserId::from("sofia")).unwrap();

    assert!(session.create_channel("  ", "", vec![]).is_none());

    let created = session
        .create_channel("Design", "Alles rund ums UI", vec![sofia.clone(), frederik()])
        .unwrap();
    assert_eq!(created.created_by.as_deref(), Some("Frederik Beck"));
    assert_eq!(session.channels().active_channel().unwrap().name, "Design");
    assert_eq!(session.channels().members_for_channel("Design").len(), 2);
    assert!(session.create_channel("Design", "", vec![]).is_none());

    assert!(!session.delete_channel(SYSTEM_CHANNEL));
    assert!(session.delete_channel("Design"));
    assert_eq!(session.channels().active_channel().unwrap().name, SYSTEM_CHANNEL);
    assert_eq!(session.channels().messages().len(), 1);
}

#[tokio::test]
async fn leave_channel_falls_back_to_system_channel() {
    let (session, _dir) = session();
    session.create_channel("Marketing", "", vec![]).unwrap();

    assert!(!session.leave_channel(SYSTEM_CHANNEL));
    assert!(!session.leave_channel("Unbekannt"));
    assert!(session.leave_channel("Marketing"));
    assert!(!session.channels().has_channel("Marketing"));
    assert_eq!(session.channels().active_channel().unwrap().name, SYSTEM_CHANNEL);
}

#[tokio::test]
async fn leaving_keeps_history_but_drops_membership() {
    let (session, _dir) = session();
    let sofia = session.users().find_user(&UserId::from("sofia")).unwrap();
    session.create_channel("Marketing", "Kampagnen", vec![sofia]).unwrap();
    session.send_message("Bis morgen").unwrap();

    assert!(session.leave_channel("Marketing"));
    assert!(!session.leave_channel("Marketing"));

    let history = session
        .channels()
        .messages_for(&ConversationKey::Channel("Marketing".into()));
    assert_eq!(history.len(), 1);
    let members = session.channels().members_for_channel("Marketing");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, UserId::from("sofia"));
    assert_eq!(session.channels().description("Marketing"), "Kampagnen");
}

#[tokio::test]
async fn add_members_only_counts_newcomers() {
    let (session, _dir) = session();
    let users = session.users().all_users();
    assert_eq!(session.add_members_to_active_channel(users), 2);
    assert_eq!(session.channels().members_for_channel(SYSTEM_CHANNEL).len(), 6);

    session.channels().set_active_user_by_id(&UserId::from("elias"));
    assert_eq!(session.add_members_to_active_channel(vec![frederik()]), 0);
}

#[tokio::test]
async fn added_members_survive_channel_switches() {
    let (session, _dir) = session();
    let users = session.users().all_users();
    assert_eq!(session.add_members_to_active_channel(users), 2);

    session.create_channel("Design", "", vec![]).unwrap();
    assert!(session.delete_channel("Design"));
    assert_eq!(session.channels().members_for_channel(SYSTEM_CHANNEL).len(), 6);
    let active = session.channels().active_channel().unwrap();
    assert_eq!(active.name, SYSTEM_CHANNEL);
    assert_eq!(active.members.unwrap().len(), 6);

    session.channels().set_description(SYSTEM_CHANNEL, "neu");
    let system = session
        .search("entwick")
        .into_iter()
        .find(|r| matches!(r, SearchResult::Channel { .. }))
        .unwrap();
    session.channels().set_active_user_by_id(&UserId::from("elias"));
    assert!(session.select_search_result(&system));
    assert_eq!(session.channels().description(SYSTEM_CHANNEL), "neu");
    assert_eq!(session.channels().members_for_channel(SYSTEM_CHANNEL).len(), 6);
}

#[tokio::test]
async fn search_and_select() {
    let (session, _dir) = session();
    session.channels().add_channel(Channel::named("Design"));

    let results = session.search("de");
    assert_eq!(
        results[0],
        SearchResult::Channel {
            name: "Design".into()
        }
    );

    let elise = session
        .search("elise")
        .into_iter()
        .find(|r| matches!(r, SearchResult::User { .. }))
        .unwrap();
    assert!(session.select_search_result(&elise));
    assert_eq!(session.channels().active_user().unwrap().name, "Elise Roth");
}

#[tokio::test]
async fn mention_suggestions_follow_conversation() {
    let (session, _dir) = session();

    match session.mention_suggestions("Frage an @so") {
        Suggestions::Users(users) => {
            assert_eq!(users.len(), 1);
            assert_eq!(users[0].name, "Sofia Müller");
        }
        other => panic!("unexpected {other:?}"),
    }

    match session.mention_suggestions("siehe #ent") {
        Suggestions::Channels(names) => assert_eq!(names, vec![SYSTEM_CHANNEL.to_string()]),
        other => panic!("unexpected {other:?}"),
    }

    session.channels().set_active_user_by_id(&UserId::from("steffen"));
    match session.mention_suggestions("@") {
        Suggestions::Users(users) => assert_eq!(users.len(), 2),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(session.mention_suggestions("kein Treffer"), Suggestions::None);
}

#[tokio::test]
async fn auth_flow_updates_profile() {
    let prefs = Arc::new(MemoryPreferences::new());
    let dir = TempDir::new().unwrap();
    let files = Arc::new(LocalFileStorage::new(dir.path(), "https://files.example.org", 1024));
    let session = session_with(files, prefs.clone());

    assert!(!session.refresh_current_user());

    let err = session.sign_in("frederik@example.org", "falsch").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");

    let user = session
        .sign_up("Fred B.", "fred@example.org", "geheim123")
        .await
        .unwrap();
    assert_eq!(user.name, "Fred B.");
    assert_eq!(prefs.get(PREF_USERNAME).unwrap().as_deref(), Some("Fred B."));
    assert!(!session.refresh_current_user());

    session.reset_password("fred@example.org").await.unwrap();

    session.sign_out().await.unwrap();
    assert!(prefs.get(PREF_USERNAME).unwrap().is_none());

    let user = session.sign_in("frederik@example.org", "geheim123").await.unwrap();
    assert_eq!(user.name, "Frederik Beck");
}
