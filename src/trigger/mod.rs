//! Trigger adapters: each adapts one inbound event shape into a single
//! launch invocation and routes the outcome to that trigger's result
//! surface.

pub mod pipeline;
pub mod schedule;

pub use pipeline::{PipelineTriggerAdapter, PipelineTriggerEvent};
pub use schedule::{ScheduleTriggerEvent, ScheduledLaunchRecord, ScheduledTriggerAdapter};
