//! # Moderation Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentKind;

/// Per-category scores returned by the moderation collaborator, each 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModerationScores {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub threat: f64,
    pub insult: f64,
    pub identity_attack: f64,
    pub sexual_explicit: f64,
}

/// Score at or above which a category marks content as negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationThresholds {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub threat: f64,
    pub insult: f64,
    pub identity_attack: f64,
    pub sexual_explicit: f64,
}

impl Default for ModerationThresholds {
    fn default() -> Self {
        Self {
            toxicity: 0.7,
            severe_toxicity: 0.5,
            obscene: 0.7,
            threat: 0.6,
            insult: 0.7,
            identity_attack: 0.6,
            sexual_explicit: 0.6,
        }
    }
}

impl ModerationThresholds {
    /// Any single category over its threshold is enough.
    pub fn is_negative(&self, scores: &ModerationScores) -> bool {
        scores.toxicity >= self.toxicity
            || scores.severe_toxicity >= self.severe_toxicity
            || scores.obscene >= self.obscene
            || scores.threat >= self.threat
            || scores.insult >= self.insult
            || scores.identity_attack >= self.identity_attack
            || scores.sexual_explicit >= self.sexual_explicit
    }
}

/// Side artifact recorded when moderation judges content unsafe.
/// At most one exists per content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationReport {
    pub id: Uuid,
    pub content_kind: ContentKind,
    pub content_id: String,
    pub author_id: String,
    pub reason: String,
    pub is_negative: bool,
    /// Automated reports are resolved at creation; only user reports wait for review
    pub is_resolved: bool,
    pub scores: ModerationScores,
    pub created_at: DateTime<Utc>,
}

impl ModerationReport {
    pub fn negative(
        content_kind: ContentKind,
        content_id: impl Into<String>,
        author_id: impl Into<String>,
        scores: ModerationScores,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            content_kind,
            content_id: content_id.into(),
            author_id: author_id.into(),
            reason: format!("Your {} does not follow our Community Guidelines", content_kind.label()),
            is_negative: true,
            is_resolved: true,
            scores,
            created_at: Utc::now(),
        }
    }
}
