//! # Notification Facade
//!
//! Pure translation from `DomainEvent` to `NewNotification`s. Self-notifications
//! are filtered and each recipient appears at most once per event. The facade
//! never touches the store or the network; it only hands batches to delivery.

use async_trait::async_trait;
use domains::{
    Actor, CommentCreated, ContentKind, ContentRemoved, ContentVoted, DomainEvent, DomainEventSink, DomainResult,
    JobMatched, NewNotification, VoteTarget,
};
use tracing::debug;

use super::delivery::NotificationSender;

pub struct NotificationFacade {
    sender: NotificationSender,
}

impl NotificationFacade {
    pub fn new(sender: NotificationSender) -> Self {
        Self { sender }
    }

    /// Notifications for `event`, after filtering.
    pub fn build_notifications(event: &DomainEvent) -> Vec<NewNotification> {
        let candidates = match event {
            DomainEvent::CommentCreated(created) => comment_created(created),
            DomainEvent::ContentVoted(voted) => vec![content_voted(voted)],
            DomainEvent::ContentRemoved(removed) => vec![content_removed(removed)],
            DomainEvent::JobMatched(matched) => job_matched(matched),
        };

        let mut batch: Vec<NewNotification> = Vec::with_capacity(candidates.len());
        for notification in candidates {
            if notification.is_self_notification() {
                continue;
            }
            if batch.iter().any(|kept| kept.recipient_id == notification.recipient_id) {
                continue;
            }
            batch.push(notification);
        }
        batch
    }

    /// Builds and enqueues; returns how many notifications were handed off.
    pub fn notify(&self, event: &DomainEvent) -> DomainResult<usize> {
        let batch = Self::build_notifications(event);
        if batch.is_empty() {
            debug!(event = event.name(), "event produced no notifications");
            return Ok(0);
        }
        let count = batch.len();
        self.sender.send(batch)?;
        Ok(count)
    }
}

#[async_trait]
impl DomainEventSink for NotificationFacade {
    async fn publish(&self, event: DomainEvent) -> DomainResult<()> {
        self.notify(&event).map(|_| ())
    }
}

fn from_actor(notification: NewNotification, actor: &Actor) -> NewNotification {
    notification
        .from_sender(&actor.id)
        .with_icon(actor.avatar_url.clone(), Some(format!("/profile/{}", actor.id)))
}

fn comment_anchor(target_url: &str, comment_id: &str) -> String {
    format!("{target_url}#comment-{comment_id}")
}

fn comment_created(created: &CommentCreated) -> Vec<NewNotification> {
    let name = &created.author.display_name;
    let action = comment_anchor(&created.target.url(), &created.comment_id);

    match &created.parent_comment_author_id {
        None => vec![from_actor(
            NewNotification::new(
                &created.target.author_id,
                format!("{name} commented on your post: {}", created.content),
            )
            .with_action(&action),
            &created.author,
        )],
        Some(parent_author) => vec![
            from_actor(
                NewNotification::new(
                    &created.target.author_id,
                    format!("{name} replied to a comment on your post: {}", created.content),
                )
                .with_action(&action),
                &created.author,
            ),
            from_actor(
                NewNotification::new(parent_author, format!("{name} replied to your comment: {}", created.content))
                    .with_action(&action),
                &created.author,
            ),
        ],
    }
}

fn content_voted(voted: &ContentVoted) -> NewNotification {
    let (message, action) = match &voted.target {
        VoteTarget::Post { id, title, .. } => (
            format!("Your post \"{title}\" received a new vote"),
            format!("/{}/{id}", ContentKind::Post.path_segment()),
        ),
        VoteTarget::JobPosting { id, title, .. } => (
            format!("Your job \"{title}\" received a new vote"),
            format!("/{}/{id}", ContentKind::JobPosting.path_segment()),
        ),
        VoteTarget::Comment { id, content, parent, .. } => (
            format!("Your comment \"{content}\" received a new vote"),
            comment_anchor(&parent.url(), id),
        ),
    };
    from_actor(
        NewNotification::new(voted.target.author_id(), message).with_action(action),
        &voted.voter,
    )
}

fn content_removed(removed: &ContentRemoved) -> NewNotification {
    let (subject, label) = match removed.kind {
        ContentKind::Post => ("post", "Post"),
        ContentKind::JobPosting => ("job posting", "Job posting"),
        ContentKind::Comment => ("comment", "Comment"),
    };
    NewNotification::new(
        &removed.author_id,
        format!("Your {subject} was removed: {}.\n{label}: {}", removed.reason, removed.excerpt),
    )
    .with_action("/profile")
}

fn job_matched(matched: &JobMatched) -> Vec<NewNotification> {
    let action = format!("/{}/{}", ContentKind::JobPosting.path_segment(), matched.job_posting_id);
    matched
        .candidate_ids
        .iter()
        .map(|candidate| {
            NewNotification::new(
                candidate,
                format!("Check this new job which matches your profile: {}", matched.title),
            )
            .from_sender(&matched.author_id)
            .with_action(&action)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::notification_channel;
    use domains::ContentRef;

    fn actor(id: &str, name: &str) -> Actor {
        Actor { id: id.into(), display_name: name.into(), avatar_url: Some(format!("https://cdn/{id}.png")) }
    }

    fn post_ref(author: &str) -> ContentRef {
        ContentRef { kind: ContentKind::Post, id: "post-1".into(), author_id: author.into() }
    }

    fn reply(author: Actor, post_author: &str, parent_author: &str) -> DomainEvent {
        DomainEvent::CommentCreated(CommentCreated {
            comment_id: "c-9".into(),
            author,
            content: "agreed, async traits help".into(),
            target: post_ref(post_author),
            parent_comment_author_id: Some(parent_author.into()),
        })
    }

    #[test]
    fn top_level_comment_notifies_post_owner() {
        let event = DomainEvent::CommentCreated(CommentCreated {
            comment_id: "c-1".into(),
            author: actor("u2", "Mona"),
            content: "great write-up".into(),
            target: post_ref("u1"),
            parent_comment_author_id: None,
        });
        let batch = NotificationFacade::build_notifications(&event);
        insta::assert_debug_snapshot!(batch, @r###"
        [
            NewNotification {
                recipient_id: "u1",
                sender_id: Some(
                    "u2",
                ),
                message: "Mona commented on your post: great write-up",
                action_url: Some(
                    "/posts/post-1#comment-c-1",
                ),
                icon_url: Some(
                    "https://cdn/u2.png",
                ),
                icon_action_url: Some(
                    "/profile/u2",
                ),
            },
        ]
        "###);
    }

    #[test]
    fn reply_notifies_post_owner_and_parent_author() {
        let batch = NotificationFacade::build_notifications(&reply(actor("u3", "Omar"), "u1", "u2"));
        let recipients: Vec<_> = batch.iter().map(|n| n.recipient_id.as_str()).collect();
        assert_eq!(recipients, ["u1", "u2"]);
        assert!(batch.iter().all(|n| n.recipient_id != "u3"));
        assert!(batch[0].message.starts_with("Omar replied to a comment on your post"));
        assert!(batch[1].message.starts_with("Omar replied to your comment"));
    }

    #[test]
    fn replying_on_own_post_only_notifies_parent_author() {
        let batch = NotificationFacade::build_notifications(&reply(actor("u1", "Sara"), "u1", "u2"));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].recipient_id, "u2");
    }

    #[test]
    fn parent_author_owning_the_post_gets_one_notification() {
        let batch = NotificationFacade::build_notifications(&reply(actor("u3", "Omar"), "u1", "u1"));
        assert_eq!(batch.len(), 1);
        assert!(batch[0].message.contains("replied to a comment on your post"));
    }

    #[test]
    fn self_vote_produces_nothing() {
        let event = DomainEvent::ContentVoted(ContentVoted {
            voter: actor("u1", "Sara"),
            target: VoteTarget::Post { id: "p".into(), title: "Mine".into(), author_id: "u1".into() },
        });
        assert!(NotificationFacade::build_notifications(&event).is_empty());
    }

    #[test]
    fn comment_vote_links_to_the_comment_anchor() {
        let event = DomainEvent::ContentVoted(ContentVoted {
            voter: actor("u2", "Mona"),
            target: VoteTarget::Comment {
                id: "c-4".into(),
                content: "use a semaphore".into(),
                author_id: "u1".into(),
                parent: ContentRef { kind: ContentKind::JobPosting, id: "j-7".into(), author_id: "u5".into() },
            },
        });
        let batch = NotificationFacade::build_notifications(&event);
        assert_eq!(batch[0].message, "Your comment \"use a semaphore\" received a new vote");
        assert_eq!(batch[0].action_url.as_deref(), Some("/jobs/j-7#comment-c-4"));
    }

    #[test]
    fn removal_notice_has_no_sender() {
        let event = DomainEvent::ContentRemoved(ContentRemoved {
            kind: ContentKind::Post,
            content_id: "p".into(),
            author_id: "u1".into(),
            excerpt: "Buy followers now".into(),
            reason: "Your post does not follow our Community Guidelines".into(),
        });
        let batch = NotificationFacade::build_notifications(&event);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].sender_id, None);
        insta::assert_snapshot!(batch[0].message, @r###"
        Your post was removed: Your post does not follow our Community Guidelines.
        Post: Buy followers now
        "###);
    }

    #[test]
    fn job_match_skips_the_posting_author() {
        let event = DomainEvent::JobMatched(JobMatched {
            job_posting_id: "j1".into(),
            author_id: "recruiter".into(),
            title: "Rust Engineer".into(),
            candidate_ids: vec!["dev-1".into(), "recruiter".into()],
        });
        let batch = NotificationFacade::build_notifications(&event);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].recipient_id, "dev-1");
        assert_eq!(batch[0].action_url.as_deref(), Some("/jobs/j1"));
    }

    #[tokio::test]
    async fn publish_hands_one_batch_to_delivery() {
        let (sender, mut receiver) = notification_channel();
        let facade = NotificationFacade::new(sender);
        facade.publish(reply(actor("u3", "Omar"), "u1", "u2")).await.unwrap();

        let batch = receiver.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
    }
}
