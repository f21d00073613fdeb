//! # Pipeline Metrics
//!
//! Prometheus counters shared by scanners, consumers and the delivery worker.
//! Stuck content shows up as dispatch counts that never turn into consumes.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StageLabels {
    pub stage: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TopicLabels {
    pub topic: String,
}

#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics {
    pub dispatched: Family<StageLabels, Counter>,
    pub dispatch_failures: Family<StageLabels, Counter>,
    pub consumed: Family<TopicLabels, Counter>,
    pub retries: Family<TopicLabels, Counter>,
    pub poisoned: Family<TopicLabels, Counter>,
    pub finalized: Counter,
    pub notifications_delivered: Counter,
    pub notifications_dropped: Counter,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every counter under the `pipeline` / `notifications` names.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "pipeline_dispatched",
            "Stage messages published by scans",
            self.dispatched.clone(),
        );
        registry.register(
            "pipeline_dispatch_failures",
            "Stage messages a scan failed to publish",
            self.dispatch_failures.clone(),
        );
        registry.register("pipeline_consumed", "Messages handled successfully", self.consumed.clone());
        registry.register("pipeline_retries", "Handler redeliveries", self.retries.clone());
        registry.register("pipeline_poisoned", "Messages parked as poison", self.poisoned.clone());
        registry.register(
            "pipeline_finalized",
            "Content items made visible by the finalizer",
            self.finalized.clone(),
        );
        registry.register(
            "notifications_delivered",
            "Notifications persisted and pushed",
            self.notifications_delivered.clone(),
        );
        registry.register(
            "notifications_dropped",
            "Notifications lost to a failed delivery batch",
            self.notifications_dropped.clone(),
        );
    }

    pub(crate) fn stage(stage: impl Into<String>) -> StageLabels {
        StageLabels { stage: stage.into() }
    }

    pub(crate) fn topic(topic: impl Into<String>) -> TopicLabels {
        TopicLabels { topic: topic.into() }
    }
}
