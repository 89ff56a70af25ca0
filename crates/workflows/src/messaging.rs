//! Direct messages between students and landlords.

use std::collections::BTreeMap;

use marketplace::{
    fetch_all, insert_record, Filter, LinkierError, Message, NewMessage, NotificationKind, Profile,
    ProfileId, PropertyId, Query, Table,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::guard::required_text;
use crate::{display_name, Marketplace};

/// Longest message body accepted.
pub const MAX_BODY_CHARS: usize = 4000;

/// Preview length used in message notifications.
const PREVIEW_CHARS: usize = 80;

/// One row of the inbox: the latest message exchanged with a counterpart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub counterpart_id: ProfileId,
    pub last_message: Message,
    /// Messages from the counterpart the actor has not read yet.
    pub unread: u64,
}

/// Messaging operations.
pub struct Messaging<'a> {
    market: &'a Marketplace,
}

impl<'a> Messaging<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Sends `body` to `recipient_id`, optionally about a listing.
    #[instrument(skip_all, fields(sender_id = %actor.id, %recipient_id))]
    pub async fn send(
        &self,
        actor: &Profile,
        recipient_id: ProfileId,
        body: &str,
        property_id: Option<PropertyId>,
    ) -> Result<Message, LinkierError> {
        let body = required_text("message", body, MAX_BODY_CHARS)?;
        if recipient_id == actor.id {
            return Err(LinkierError::validation("recipient", "cannot message yourself"));
        }
        self.market.accounts().profile(recipient_id).await?;
        if let Some(property_id) = property_id {
            self.market.listings().property(property_id).await?;
        }

        let message: Message = insert_record(
            self.market.store(),
            &NewMessage {
                sender_id: actor.id,
                recipient_id,
                property_id,
                body,
                read: false,
            },
        )
        .await?;
        info!(message_id = %message.id, "Message sent");

        self.market
            .notifications()
            .notify(
                recipient_id,
                NotificationKind::MessageReceived,
                format!("New message from {}", display_name(actor)),
                preview(&message.body),
            )
            .await;
        Ok(message)
    }

    /// Every message between the actor and `other_id`, oldest first.
    pub async fn conversation(
        &self,
        actor: &Profile,
        other_id: ProfileId,
    ) -> Result<Vec<Message>, LinkierError> {
        let sent = Query::new()
            .eq("sender_id", json!(actor.id))
            .eq("recipient_id", json!(other_id));
        let received = Query::new()
            .eq("sender_id", json!(other_id))
            .eq("recipient_id", json!(actor.id));
        let (mut messages, received) = tokio::try_join!(
            fetch_all::<Message>(self.market.store(), &sent),
            fetch_all::<Message>(self.market.store(), &received),
        )?;
        messages.extend(received);
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    /// Latest message per counterpart, most recent conversation first.
    pub async fn inbox(&self, actor: &Profile) -> Result<Vec<ConversationSummary>, LinkierError> {
        let sent = Query::new().eq("sender_id", json!(actor.id));
        let received = Query::new().eq("recipient_id", json!(actor.id));
        let (sent, received) = tokio::try_join!(
            fetch_all::<Message>(self.market.store(), &sent),
            fetch_all::<Message>(self.market.store(), &received),
        )?;

        let mut threads: BTreeMap<ProfileId, ConversationSummary> = BTreeMap::new();
        for message in sent.into_iter().chain(received) {
            let incoming = message.recipient_id == actor.id;
            let counterpart_id = if incoming {
                message.sender_id
            } else {
                message.recipient_id
            };
            let unread = u64::from(incoming && !message.read);
            match threads.get_mut(&counterpart_id) {
                Some(thread) => {
                    thread.unread += unread;
                    if message.created_at > thread.last_message.created_at {
                        thread.last_message = message;
                    }
                }
                None => {
                    threads.insert(
                        counterpart_id,
                        ConversationSummary {
                            counterpart_id,
                            last_message: message,
                            unread,
                        },
                    );
                }
            }
        }

        let mut inbox: Vec<ConversationSummary> = threads.into_values().collect();
        inbox.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
        Ok(inbox)
    }

    /// Marks every message from `other_id` to the actor as read; returns how many.
    pub async fn mark_read(
        &self,
        actor: &Profile,
        other_id: ProfileId,
    ) -> Result<u64, LinkierError> {
        let filters = [
            Filter::Eq("sender_id".into(), json!(other_id)),
            Filter::Eq("recipient_id".into(), json!(actor.id)),
            Filter::Eq("read".into(), json!(false)),
        ];
        let updated = self
            .market
            .store()
            .update(Table::Messages, &filters, json!({ "read": true }))
            .await?;
        Ok(updated.len() as u64)
    }

    pub async fn unread_count(&self, actor: &Profile) -> Result<u64, LinkierError> {
        let filters = [
            Filter::Eq("recipient_id".into(), json!(actor.id)),
            Filter::Eq("read".into(), json!(false)),
        ];
        Ok(self.market.store().count(Table::Messages, &filters).await?)
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_owned();
    }
    let cut: String = body.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn conversation_is_ordered_and_read_receipts_apply_one_way() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let owner = fx.landlord("owner@rent.be").await;
        let chat = fx.market.messaging();

        chat.send(&ana, owner.id, "Is the room still free?", None).await.unwrap();
        chat.send(&owner, ana.id, "Yes it is.", None).await.unwrap();
        chat.send(&ana, owner.id, "Great, can I visit?", None).await.unwrap();

        let thread = chat.conversation(&owner, ana.id).await.unwrap();
        let bodies: Vec<&str> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(
            bodies,
            vec!["Is the room still free?", "Yes it is.", "Great, can I visit?"]
        );

        assert_eq!(chat.unread_count(&owner).await.unwrap(), 2);
        assert_eq!(chat.mark_read(&owner, ana.id).await.unwrap(), 2);
        assert_eq!(chat.unread_count(&owner).await.unwrap(), 0);
        assert_eq!(chat.unread_count(&ana).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn inbox_groups_by_counterpart() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let bob = fx.student("bob@uni.be").await;
        let owner = fx.landlord("owner@rent.be").await;
        let chat = fx.market.messaging();

        chat.send(&ana, owner.id, "Hi from Ana", None).await.unwrap();
        chat.send(&bob, owner.id, "Hi from Bob", None).await.unwrap();
        chat.send(&bob, owner.id, "Still there?", None).await.unwrap();
        chat.send(&owner, ana.id, "Hello Ana", None).await.unwrap();

        let inbox = chat.inbox(&owner).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].counterpart_id, ana.id);
        assert_eq!(inbox[0].last_message.body, "Hello Ana");
        assert_eq!(inbox[0].unread, 1);
        assert_eq!(inbox[1].counterpart_id, bob.id);
        assert_eq!(inbox[1].last_message.body, "Still there?");
        assert_eq!(inbox[1].unread, 2);
    }

    #[tokio::test]
    async fn send_validates_body_and_recipient() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let chat = fx.market.messaging();

        assert!(matches!(
            chat.send(&ana, ana.id, "hello me", None).await,
            Err(LinkierError::Validation { field: "recipient", .. })
        ));
        assert!(matches!(
            chat.send(&ana, ProfileId::new_random(), "hello?", None).await,
            Err(LinkierError::NotFound { entity: "profile", .. })
        ));
        let owner = fx.landlord("owner@rent.be").await;
        assert!(matches!(
            chat.send(&ana, owner.id, "   ", None).await,
            Err(LinkierError::Validation { field: "message", .. })
        ));
        let long = "x".repeat(MAX_BODY_CHARS + 1);
        assert!(matches!(
            chat.send(&ana, owner.id, &long, None).await,
            Err(LinkierError::Validation { field: "message", .. })
        ));
    }

    #[tokio::test]
    async fn recipient_gets_a_preview_notification() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let owner = fx.landlord("owner@rent.be").await;
        let long = "word ".repeat(40);
        fx.market
            .messaging()
            .send(&ana, owner.id, &long, None)
            .await
            .unwrap();

        let feed = fx.market.notifications().for_user(&owner, false).await.unwrap();
        assert_eq!(feed[0].kind, NotificationKind::MessageReceived);
        assert_eq!(feed[0].title, "New message from ana");
        assert!(feed[0].body.ends_with("..."));
        assert!(feed[0].body.chars().count() <= PREVIEW_CHARS + 3);
    }
}
