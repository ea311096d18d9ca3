//! Search orchestrator: concurrent provider fan-out with lifecycle events.
//!
//! This module runs one query against many providers at once, isolates
//! provider failures, and reports progress through [`events::SearchEvent`]s
//! delivered to an optional [`events::EventSink`].

pub mod events;
pub mod search;

pub use events::{EventSink, FnSink, SearchEvent, SearchEventKind};
pub use search::{SearchOrchestrator, SearchRequest, SearchSummary};
