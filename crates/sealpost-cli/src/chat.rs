//! Interactive chat loop.
//!
//! Prints every message the first time it appears in the published view and
//! sends each input line. A failed send is reported and nothing is appended,
//! so the user can simply type the line again.

use std::collections::HashSet;

use sealpost_client::{
    Conversation, ConversationSynchronizer, Session, SyncConfig, SystemEnv, transport::HttpApi,
};
use sealpost_core::{LocalStore, MessageId, ResolvedMessage, User, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Tracks which messages were already printed.
#[derive(Debug, Default)]
struct Printed {
    seen: HashSet<MessageId>,
}

impl Printed {
    /// Messages in `view` not printed before, in view order.
    fn fresh<'a>(&mut self, view: &'a Conversation) -> Vec<&'a ResolvedMessage> {
        view.messages().iter().filter(|m| self.seen.insert(m.id.clone())).collect()
    }
}

fn render(message: &ResolvedMessage, local: &UserId, peer: &User) -> String {
    let author = if &message.sender_id == local { "you" } else { peer.username.as_str() };
    format!("[{author}] {}", message.content)
}

/// Chat with `peer` until `/quit` or end of input.
pub async fn run<S: LocalStore>(
    session: Session<S>,
    api: HttpApi,
    peer: User,
    config: SyncConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let local = session.user_id().clone();
    let sync = ConversationSynchronizer::new(session, api.clone(), api, config);
    let mut view = sync.view();
    let subscription = sync.start(SystemEnv::new(), peer.clone());

    if peer.public_key.is_none() {
        eprintln!("{} has no public key yet, messages cannot be sent", peer.username);
    }
    println!("chatting with {} (/quit to leave)", peer.username);

    let mut printed = Printed::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                for message in printed.fresh(&current) {
                    println!("{}", render(message, &local, &peer));
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "/quit" {
                    break;
                }
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = sync.send(&line).await {
                    eprintln!("not sent: {e}");
                }
            },
        }
    }

    subscription.cancel();
    subscription.stopped().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use sealpost_core::MessageContent;

    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            id: UserId::from(id),
            username: name.to_string(),
            email: format!("{name}@example.test"),
            public_key: None,
            created_at: None,
        }
    }

    fn message(id: &str, sender: &str, content: MessageContent) -> ResolvedMessage {
        ResolvedMessage {
            id: MessageId::from(id),
            sender_id: UserId::from(sender),
            receiver_id: UserId::from("other"),
            content,
            created_at: String::new(),
            is_read: false,
        }
    }

    #[test]
    fn render_names_author_and_shows_placeholders() {
        let local = UserId::from("1");
        let peer = user("2", "bob");

        let mine = message("m1", "1", MessageContent::Plaintext("hi".into()));
        let theirs = message("m2", "2", MessageContent::FailedToDecrypt);

        assert_eq!(render(&mine, &local, &peer), "[you] hi");
        assert_eq!(render(&theirs, &local, &peer), "[bob] [Failed to decrypt]");
    }

    #[test]
    fn each_message_is_printed_once() {
        let mut conversation = Conversation::new();
        conversation.select(user("2", "bob"));
        let ticket = conversation.ticket().unwrap();
        let mut printed = Printed::default();

        conversation.publish(ticket, vec![message("m1", "2", MessageContent::StillEncrypted)]);
        assert_eq!(printed.fresh(&conversation).len(), 1);

        conversation.publish(
            ticket,
            vec![
                message("m1", "2", MessageContent::StillEncrypted),
                message("m2", "1", MessageContent::Plaintext("yo".into())),
            ],
        );
        let fresh: Vec<_> = printed.fresh(&conversation).iter().map(|m| m.id.clone()).collect();
        assert_eq!(fresh, vec![MessageId::from("m2")]);
    }
}
