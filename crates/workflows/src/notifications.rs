//! Per-user notification feed.

use marketplace::{
    fetch_all, fetch_one, insert_record, update_record, Filter, LinkierError, NewNotification,
    Notification, NotificationId, NotificationKind, Profile, ProfileId, Query, Table,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::guard::require_self;
use crate::Marketplace;

/// Notification operations.
pub struct Notifications<'a> {
    market: &'a Marketplace,
}

impl<'a> Notifications<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Delivers a notification to `user_id`.
    ///
    /// Best-effort: a store failure is logged and `None` returned, so callers
    /// never fail because a notification could not be written.
    pub async fn notify(
        &self,
        user_id: ProfileId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Option<Notification> {
        let row = NewNotification {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            read: false,
        };
        match insert_record::<Notification, _>(self.market.store(), &row).await {
            Ok(notification) => {
                debug!(%user_id, %kind, "Notification delivered");
                Some(notification)
            }
            Err(err) => {
                warn!(%user_id, %kind, error = %err, "Failed to deliver notification");
                None
            }
        }
    }

    /// The actor's notifications, newest first.
    pub async fn for_user(
        &self,
        actor: &Profile,
        unread_only: bool,
    ) -> Result<Vec<Notification>, LinkierError> {
        let mut query = Query::new().eq("user_id", json!(actor.id));
        if unread_only {
            query = query.eq("read", false);
        }
        Ok(fetch_all(self.market.store(), &query.order_desc("created_at")).await?)
    }

    /// Marks one of the actor's notifications as read.
    pub async fn mark_read(
        &self,
        actor: &Profile,
        id: NotificationId,
    ) -> Result<Notification, LinkierError> {
        let notification = fetch_one::<Notification>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("notification", id))?;
        require_self(actor, notification.user_id, "notification")?;
        if notification.read {
            return Ok(notification);
        }
        update_record::<Notification>(self.market.store(), id, json!({ "read": true }))
            .await?
            .ok_or_else(|| LinkierError::not_found("notification", id))
    }

    /// Marks every unread notification of the actor as read; returns how many.
    pub async fn mark_all_read(&self, actor: &Profile) -> Result<u64, LinkierError> {
        let updated = self
            .market
            .store()
            .update(Table::Notifications, &self.unread_filters(actor), json!({ "read": true }))
            .await?;
        Ok(updated.len() as u64)
    }

    pub async fn unread_count(&self, actor: &Profile) -> Result<u64, LinkierError> {
        Ok(self
            .market
            .store()
            .count(Table::Notifications, &self.unread_filters(actor))
            .await?)
    }

    fn unread_filters(&self, actor: &Profile) -> [Filter; 2] {
        [
            Filter::Eq("user_id".into(), json!(actor.id)),
            Filter::Eq("read".into(), json!(false)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn feed_is_per_user_and_tracks_reads() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let bob = fx.student("bob@uni.be").await;
        let feed = fx.market.notifications();

        let first = feed
            .notify(ana.id, NotificationKind::MessageReceived, "New message", "Hi")
            .await
            .unwrap();
        feed.notify(ana.id, NotificationKind::PaymentDue, "Rent due", "450.00")
            .await
            .unwrap();
        feed.notify(bob.id, NotificationKind::PaymentDue, "Rent due", "450.00")
            .await
            .unwrap();

        assert_eq!(feed.for_user(&ana, false).await.unwrap().len(), 2);
        assert_eq!(feed.unread_count(&ana).await.unwrap(), 2);

        let read = feed.mark_read(&ana, first.id).await.unwrap();
        assert!(read.read);
        assert_eq!(feed.for_user(&ana, true).await.unwrap().len(), 1);

        assert!(matches!(
            feed.mark_read(&bob, first.id).await,
            Err(LinkierError::Forbidden { .. })
        ));

        assert_eq!(feed.mark_all_read(&ana).await.unwrap(), 1);
        assert_eq!(feed.unread_count(&ana).await.unwrap(), 0);
        assert_eq!(feed.unread_count(&bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_notification_is_not_found() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        assert!(matches!(
            fx.market
                .notifications()
                .mark_read(&ana, NotificationId::new_random())
                .await,
            Err(LinkierError::NotFound { .. })
        ));
    }
}
