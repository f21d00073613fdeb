//! # services
//!
//! The content pipeline: periodic scans publish stage messages, consumer
//! groups run the stage handlers, the finalizer flips visibility, and domain
//! events become pushed notifications. Everything here talks to the outside
//! world through the ports in `domains`.

pub mod consumers;
pub mod finalizer;
pub mod jobs;
pub mod metrics;
pub mod notifications;
pub mod retention;
pub mod runtime;
pub mod scanner;
pub mod scheduler;

pub use consumers::{EmbeddingConsumer, ModerationConsumer, TaggingConsumer, UserInterestConsumer};
pub use finalizer::VisibilityFinalizer;
pub use jobs::{stage_scan_jobs, StageScanJob, UserInterestScanJob};
pub use metrics::PipelineMetrics;
pub use notifications::{notification_channel, DeliveryWorker, NotificationFacade, NotificationSender};
pub use retention::NotificationRetentionJob;
pub use runtime::{ConsumerGroup, Delivery, RetryPolicy};
pub use scanner::{ContentScanner, ScanReport};
pub use scheduler::{run_locked, PeriodicJob, Scheduler, TickOutcome};
