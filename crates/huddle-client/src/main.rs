//! Headless huddle session: seeds the demo workspace and walks through a
//! short conversation, logging what subscribers see.

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::info;

use huddle_client::{init_tracing, ClientConfig, Session};
use huddle_shared::constants::REACTION_EMOJIS;
use huddle_store::seed::seed_demo_workspace;
use huddle_store::timeline::group_by_date;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(user = %config.user_id, uploads = %config.upload_dir.display(), "starting huddle");

    let session = Session::from_config(&config).context("failed to open session")?;
    seed_demo_workspace(session.channels());

    let mut updates = Box::pin(session.channels().messages_observable().updates());
    tokio::spawn(async move {
        while let Some(messages) = updates.next().await {
            info!(visible = messages.len(), "conversation updated");
        }
    });

    let me = session.users().current_user();
    info!(name = %me.name, avatar = %me.avatar, "signed in locally");

    let sent = session
        .send_message("Guten Morgen zusammen!")
        .context("no active conversation")?;
    session.toggle_reaction(sent.id, REACTION_EMOJIS[4]);

    if let Some(question) = session.channels().messages().first().cloned() {
        let mention = session.reply_to(&question);
        if let Some((reply, outcome)) = session.reply_in_thread(&format!("{mention}danke!")) {
            info!(id = %reply.id, ?outcome, "replied in thread");
        }
    }

    match session
        .send_attachment("notizen.txt", b"Sprint-Planung am Montag".to_vec())
        .await
    {
        Ok(Some(message)) => info!(content = %message.content, "attachment shared"),
        Ok(None) => {}
        Err(e) => info!(error = %e, "attachment skipped"),
    }

    for group in group_by_date(&session.channels().messages()) {
        info!(label = %group.label, messages = group.messages.len(), "timeline");
    }

    Ok(())
}
