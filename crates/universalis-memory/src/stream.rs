//! The chronological event stream.
//!
//! A bounded, append-only, thread-safe log of typed events plus an
//! id-to-event index. Every adjudication, intent, and rationale lands
//! here, which is what makes a cycle's outcome reconstructable after
//! the fact. On overflow the oldest event is dropped from both
//! structures in O(1) per insert.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// Default ring-buffer bound.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Length of the hex event id (truncated SHA-256).
const EVENT_ID_LEN: usize = 12;

/// Types of events in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Something an actor observed.
    Observation,
    /// An actor's proposed action.
    Intent,
    /// The Archon's cycle resolution.
    Adjudication,
    /// Reasoning attached to an adjudication.
    Rationale,
    /// A world-state change.
    StateChange,
    /// Engine lifecycle events.
    System,
    /// An executed actor action.
    ActorAction,
    /// An environmental shift.
    Environment,
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Observation => "OBSERVATION",
            Self::Intent => "INTENT",
            Self::Adjudication => "ADJUDICATION",
            Self::Rationale => "RATIONALE",
            Self::StateChange => "STATE_CHANGE",
            Self::System => "SYSTEM",
            Self::ActorAction => "ACTOR_ACTION",
            Self::Environment => "ENVIRONMENT",
        };
        write!(f, "{name}")
    }
}

/// A single event in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Hash-derived id over type, content, cycle, and timestamp.
    pub event_id: String,
    /// The event's type.
    pub event_type: EventType,
    /// Event content / description.
    pub content: String,
    /// Simulation cycle when the event occurred.
    pub cycle: u64,
    /// Real-world timestamp.
    pub timestamp: DateTime<Utc>,
    /// Actor involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Additional event metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Ids of related events.
    #[serde(default)]
    pub linked_events: Vec<String>,
}

impl StreamEvent {
    fn build(
        event_type: EventType,
        content: String,
        cycle: u64,
        actor_id: Option<String>,
        metadata: BTreeMap<String, serde_json::Value>,
        linked_events: Vec<String>,
    ) -> Self {
        let timestamp = Utc::now();
        let event_id = compute_event_id(event_type, &content, cycle, &timestamp);
        Self {
            event_id,
            event_type,
            content,
            cycle,
            timestamp,
            actor_id,
            metadata,
            linked_events,
        }
    }
}

/// Hash id over `type:content:cycle:timestamp`, truncated to 12 hex chars.
fn compute_event_id(
    event_type: EventType,
    content: &str,
    cycle: u64,
    timestamp: &DateTime<Utc>,
) -> String {
    let material = format!("{event_type}:{content}:{cycle}:{}", timestamp.to_rfc3339());
    let digest = hex::encode(Sha256::digest(material.as_bytes()));
    digest.get(..EVENT_ID_LEN).unwrap_or(&digest).to_owned()
}

/// Checkpoint state of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// The simulation this stream serves.
    pub simulation_id: String,
    /// Every event, in insertion order.
    pub events: Vec<StreamEvent>,
}

struct StreamInner {
    events: VecDeque<StreamEvent>,
    index: BTreeMap<String, StreamEvent>,
}

/// Bounded chronological event log for one simulation.
pub struct EventStream {
    simulation_id: String,
    max_events: usize,
    inner: Mutex<StreamInner>,
}

impl EventStream {
    /// Create a stream with the default ring-buffer bound.
    pub fn new(simulation_id: impl Into<String>) -> Self {
        Self::with_capacity(simulation_id, DEFAULT_MAX_EVENTS)
    }

    /// Create a stream holding at most `max_events` events.
    pub fn with_capacity(simulation_id: impl Into<String>, max_events: usize) -> Self {
        let simulation_id = simulation_id.into();
        info!(%simulation_id, max_events, "Event stream initialized");
        Self {
            simulation_id,
            max_events: max_events.max(1),
            inner: Mutex::new(StreamInner {
                events: VecDeque::new(),
                index: BTreeMap::new(),
            }),
        }
    }

    /// The simulation this stream serves.
    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    /// Append an event and return it.
    pub fn add_event(
        &self,
        event_type: EventType,
        content: impl Into<String>,
        cycle: u64,
        actor_id: Option<String>,
        metadata: BTreeMap<String, serde_json::Value>,
        linked_events: Vec<String>,
    ) -> StreamEvent {
        let event = StreamEvent::build(
            event_type,
            content.into(),
            cycle,
            actor_id,
            metadata,
            linked_events,
        );

        let mut inner = self.lock();
        inner.events.push_back(event.clone());
        inner.index.insert(event.event_id.clone(), event.clone());
        if inner.events.len() > self.max_events
            && let Some(removed) = inner.events.pop_front()
        {
            inner.index.remove(&removed.event_id);
        }
        event
    }

    /// Append an observation by `actor_id`.
    pub fn add_observation(
        &self,
        content: impl Into<String>,
        cycle: u64,
        actor_id: impl Into<String>,
    ) -> StreamEvent {
        self.add_event(
            EventType::Observation,
            content,
            cycle,
            Some(actor_id.into()),
            BTreeMap::new(),
            Vec::new(),
        )
    }

    /// Append an intent by `actor_id`.
    pub fn add_intent(
        &self,
        content: impl Into<String>,
        cycle: u64,
        actor_id: impl Into<String>,
    ) -> StreamEvent {
        self.add_event(
            EventType::Intent,
            content,
            cycle,
            Some(actor_id.into()),
            BTreeMap::new(),
            Vec::new(),
        )
    }

    /// Append an adjudication with its metadata payload.
    pub fn add_adjudication(
        &self,
        content: impl Into<String>,
        cycle: u64,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> StreamEvent {
        self.add_event(
            EventType::Adjudication,
            content,
            cycle,
            None,
            metadata,
            Vec::new(),
        )
    }

    /// Append a rationale, optionally linked to an adjudication event.
    pub fn add_rationale(
        &self,
        content: impl Into<String>,
        cycle: u64,
        linked_adjudication: Option<String>,
    ) -> StreamEvent {
        self.add_event(
            EventType::Rationale,
            content,
            cycle,
            None,
            BTreeMap::new(),
            linked_adjudication.into_iter().collect(),
        )
    }

    /// Fetch one event by id.
    pub fn get_event(&self, event_id: &str) -> Option<StreamEvent> {
        self.lock().index.get(event_id).cloned()
    }

    /// All events from one cycle, in insertion order.
    pub fn events_by_cycle(&self, cycle: u64) -> Vec<StreamEvent> {
        self.lock()
            .events
            .iter()
            .filter(|event| event.cycle == cycle)
            .cloned()
            .collect()
    }

    /// Events of one type; `limit` keeps only the newest.
    pub fn events_by_type(&self, event_type: EventType, limit: Option<usize>) -> Vec<StreamEvent> {
        let inner = self.lock();
        let matching: Vec<StreamEvent> = inner
            .events
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect();
        trim_to_newest(matching, limit)
    }

    /// Events involving one actor; `limit` keeps only the newest.
    pub fn events_by_actor(&self, actor_id: &str, limit: Option<usize>) -> Vec<StreamEvent> {
        let inner = self.lock();
        let matching: Vec<StreamEvent> = inner
            .events
            .iter()
            .filter(|event| event.actor_id.as_deref() == Some(actor_id))
            .cloned()
            .collect();
        trim_to_newest(matching, limit)
    }

    /// The newest `limit` events in insertion order.
    pub fn recent_events(&self, limit: usize) -> Vec<StreamEvent> {
        let inner = self.lock();
        let skip = inner.events.len().saturating_sub(limit);
        inner.events.iter().skip(skip).cloned().collect()
    }

    /// All rationale events for one cycle.
    pub fn rationales_for_cycle(&self, cycle: u64) -> Vec<StreamEvent> {
        self.lock()
            .events
            .iter()
            .filter(|event| event.event_type == EventType::Rationale && event.cycle == cycle)
            .cloned()
            .collect()
    }

    /// Fielded search: substring over content, plus optional type,
    /// actor, and cycle-range filters.
    pub fn search(
        &self,
        query: &str,
        event_types: Option<&[EventType]>,
        actor_id: Option<&str>,
        cycle_range: Option<(u64, u64)>,
    ) -> Vec<StreamEvent> {
        let query_lower = query.to_lowercase();
        self.lock()
            .events
            .iter()
            .filter(|event| event.content.to_lowercase().contains(&query_lower))
            .filter(|event| {
                event_types.is_none_or(|types| types.contains(&event.event_type))
            })
            .filter(|event| {
                actor_id.is_none_or(|actor| event.actor_id.as_deref() == Some(actor))
            })
            .filter(|event| {
                cycle_range.is_none_or(|(min, max)| event.cycle >= min && event.cycle <= max)
            })
            .cloned()
            .collect()
    }

    /// Checkpoint the full event list.
    pub fn get_state(&self) -> StreamState {
        StreamState {
            simulation_id: self.simulation_id.clone(),
            events: self.lock().events.iter().cloned().collect(),
        }
    }

    /// Restore the event list from a checkpoint.
    pub fn set_state(&self, state: &StreamState) {
        let mut inner = self.lock();
        inner.events = state.events.iter().cloned().collect();
        inner.index = state
            .events
            .iter()
            .map(|event| (event.event_id.clone(), event.clone()))
            .collect();
    }

    /// Export every event as a JSON array ordered by insertion.
    ///
    /// # Errors
    ///
    /// Returns the serde error if serialization fails.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let inner = self.lock();
        let events: Vec<&StreamEvent> = inner.events.iter().collect();
        serde_json::to_string_pretty(&events)
    }

    /// Drop every event.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.events.clear();
        inner.index.clear();
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Whether the stream holds no events.
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Keep only the newest `limit` events of an already-ordered list.
fn trim_to_newest(mut events: Vec<StreamEvent>, limit: Option<usize>) -> Vec<StreamEvent> {
    if let Some(limit) = limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    events
}
