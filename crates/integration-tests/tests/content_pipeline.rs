//! End-to-end runs of content through scan, consumers and finalizer, using
//! the in-memory store and broker.

use std::sync::Arc;
use std::time::Duration;

use domains::{ContentItem, ContentKind, Stage, Topic, UserProfile, EMBEDDING_DIMENSIONS};
use integration_tests::{embedder, safe_analyzer, tagger, toxic_analyzer, Harness};
use services::{Delivery, PeriodicJob, UserInterestScanJob};
use tokio_test::assert_ok;

fn handled_once(deliveries: &[Delivery]) -> bool {
    deliveries.iter().all(|delivery| *delivery == Delivery::Handled { attempts: 1 })
}

#[tokio::test]
async fn safe_post_becomes_visible_after_every_stage() {
    let harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&["Rust", "Async"]), embedder());
    let post = ContentItem::new(ContentKind::Post, "author-1", "Pinning explained", "Why Pin<&mut Self> exists");
    harness.store.insert_content(post.clone());

    // moderation: safe verdict, no report
    let deliveries = harness.run_stage(&groups, ContentKind::Post, Stage::Moderation).await;
    assert_eq!(deliveries.len(), 1);
    assert!(handled_once(&deliveries));
    let item = harness.store.content(ContentKind::Post, &post.id).unwrap();
    assert!(item.is_processed);
    assert!(harness.store.report_for(ContentKind::Post, &post.id).is_none());
    assert!(!item.is_safe_content);

    // tagging
    let deliveries = harness.run_stage(&groups, ContentKind::Post, Stage::Tagging).await;
    assert!(handled_once(&deliveries));
    let item = harness.store.content(ContentKind::Post, &post.id).unwrap();
    assert!(item.is_tagged);
    assert_eq!(item.tags, ["rust", "async"]);
    assert!(!item.is_safe_content);

    // embedding
    let deliveries = harness.run_stage(&groups, ContentKind::Post, Stage::Embedding).await;
    assert!(handled_once(&deliveries));
    let item = harness.store.content(ContentKind::Post, &post.id).unwrap();
    assert_eq!(item.embedding.as_ref().map(Vec::len), Some(EMBEDDING_DIMENSIONS));
    assert!(!item.is_safe_content);

    // one finalizer pass
    assert_eq!(assert_ok!(harness.finalizer().finalize().await), 1);
    assert!(harness.store.content(ContentKind::Post, &post.id).unwrap().is_safe_content);
    assert_eq!(harness.metrics.finalized.get(), 1);
}

#[tokio::test]
async fn toxic_post_is_removed_and_its_author_told() {
    let mut harness = Harness::new();
    let groups = harness.groups(toxic_analyzer(), tagger(&["Rust"]), embedder());
    let post = ContentItem::new(ContentKind::Post, "author-1", "You are all clowns", "...");
    harness.store.insert_content(post.clone());

    let deliveries = harness.run_stage(&groups, ContentKind::Post, Stage::Moderation).await;
    assert!(handled_once(&deliveries));

    let item = harness.store.content(ContentKind::Post, &post.id).unwrap();
    assert!(item.is_processed);
    assert!(item.is_removed);
    let report = harness.store.report_for(ContentKind::Post, &post.id).unwrap();
    assert!(report.is_negative);
    assert_eq!(report.author_id, "author-1");

    let queued = harness.queued_notifications();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].recipient_id, "author-1");
    assert_eq!(queued[0].sender_id, None);
    assert!(queued[0].message.starts_with("Your post was removed"));
    assert!(queued[0].message.ends_with("Post: You are all clowns"));

    // removed content drops out of every later stage and never turns visible
    assert!(harness.run_stage(&groups, ContentKind::Post, Stage::Tagging).await.is_empty());
    assert!(harness.run_stage(&groups, ContentKind::Post, Stage::Embedding).await.is_empty());
    assert_eq!(assert_ok!(harness.finalizer().finalize().await), 0);
    assert!(!harness.store.content(ContentKind::Post, &post.id).unwrap().is_safe_content);
}

#[tokio::test]
async fn stages_complete_in_any_order() {
    let harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&["Hiring"]), embedder());
    let comment = ContentItem::new(ContentKind::Comment, "author-2", "", "Is this remote?");
    harness.store.insert_content(comment.clone());

    for stage in [Stage::Embedding, Stage::Tagging] {
        harness.run_stage(&groups, ContentKind::Comment, stage).await;
        assert_eq!(assert_ok!(harness.finalizer().finalize().await), 0);
    }
    harness.run_stage(&groups, ContentKind::Comment, Stage::Moderation).await;

    assert_eq!(assert_ok!(harness.finalizer().finalize().await), 1);
    assert!(harness.store.content(ContentKind::Comment, &comment.id).unwrap().is_safe_content);
}

#[tokio::test]
async fn embedded_job_posting_notifies_matching_profiles() {
    let mut harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&["Rust"]), embedder());

    let mut candidate = UserProfile::new("candidate-1", "Ada");
    candidate.interest_embedding = Some(vec![0.1; EMBEDDING_DIMENSIONS]);
    let mut recruiter = UserProfile::new("recruiter-1", "Grace");
    recruiter.interest_embedding = Some(vec![0.1; EMBEDDING_DIMENSIONS]);
    let mut unrelated = UserProfile::new("gardener-1", "Linus");
    let mut opposite = vec![0.1; EMBEDDING_DIMENSIONS];
    opposite.iter_mut().for_each(|value| *value = -*value);
    unrelated.interest_embedding = Some(opposite);
    for profile in [candidate, recruiter, unrelated] {
        harness.store.insert_profile(profile);
    }

    let posting = ContentItem::new(ContentKind::JobPosting, "recruiter-1", "Senior Rust Engineer", "tokio, axum");
    harness.store.insert_content(posting.clone());
    harness.run_stage(&groups, ContentKind::JobPosting, Stage::Embedding).await;

    let queued = harness.queued_notifications();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].recipient_id, "candidate-1");
    assert_eq!(queued[0].sender_id.as_deref(), Some("recruiter-1"));
    assert_eq!(queued[0].message, "Check this new job which matches your profile: Senior Rust Engineer");
    assert_eq!(queued[0].action_url.as_deref(), Some(format!("/jobs/{}", posting.id).as_str()));
}

#[tokio::test]
async fn interest_scan_fills_missing_profile_embeddings() {
    let harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&[]), embedder());
    let mut profile = UserProfile::new("u1", "Ada");
    profile.interest_tags = vec!["Rust".into(), "Embedded".into()];
    harness.store.insert_profile(profile);
    harness.store.insert_profile(UserProfile::new("u2", "No interests yet"));

    let job = UserInterestScanJob::new(Duration::from_secs(60), harness.store.clone(), Arc::new(harness.scanner()));
    assert!(job.run().await.is_ok());
    assert_eq!(harness.broker.queued(Topic::UserInterests).await, 1);

    let deliveries = harness.pump(&groups, Topic::UserInterests).await;
    assert_eq!(deliveries, vec![Delivery::Handled { attempts: 1 }]);
    let embedding = harness.store.profile("u1").unwrap().interest_embedding.unwrap();
    assert_eq!(embedding.len(), EMBEDDING_DIMENSIONS);
    assert!(harness.store.profile("u2").unwrap().interest_embedding.is_none());
}
