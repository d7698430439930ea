//! Workflow history events
//!
//! - EventType: closed enum over the workflow event type names (+ Unknown)
//! - WorkflowEvent: immutable record (id + timestamp + type + attributes)
//! - History: tolerant parser, malformed events are dropped and reported

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::error::{GraphError, Result};

/// Monotonic sequence number of an event within one execution
pub type EventId = u64;

macro_rules! event_types {
    ($($name:ident),+ $(,)?) => {
        /// Workflow event type
        ///
        /// Names outside the known set are kept as `Unknown` so that newer
        /// backends still render (without causal inference).
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventType {
            $($name,)+
            Unknown(String),
        }

        impl EventType {
            /// Wire name of the event type
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$name => stringify!($name),)+
                    Self::Unknown(name) => name,
                }
            }
        }

        fn known_event_types() -> Vec<(&'static str, EventType)> {
            vec![$((stringify!($name), EventType::$name)),+]
        }
    };
}

event_types! {
    ActivityTaskCanceled,
    ActivityTaskCancelRequested,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskTimedOut,
    CancelTimerFailed,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionTerminated,
    ChildWorkflowExecutionTimedOut,
    DecisionTaskCompleted,
    DecisionTaskFailed,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskTimedOut,
    ExternalWorkflowExecutionCancelRequested,
    ExternalWorkflowExecutionSignaled,
    MarkerRecorded,
    RequestCancelActivityTaskFailed,
    RequestCancelExternalWorkflowExecutionFailed,
    RequestCancelExternalWorkflowExecutionInitiated,
    SignalExternalWorkflowExecutionFailed,
    SignalExternalWorkflowExecutionInitiated,
    StartChildWorkflowExecutionFailed,
    StartChildWorkflowExecutionInitiated,
    TimerCanceled,
    TimerFired,
    TimerStarted,
    UpsertWorkflowSearchAttributes,
    WorkflowExecutionCanceled,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionCompleted,
    WorkflowExecutionContinuedAsNew,
    WorkflowExecutionFailed,
    WorkflowExecutionSignaled,
    WorkflowExecutionStarted,
    WorkflowExecutionTerminated,
    WorkflowExecutionTimedOut,
}

static EVENT_TYPES_BY_NAME: Lazy<FxHashMap<&'static str, EventType>> =
    Lazy::new(|| known_event_types().into_iter().collect());

/// Attribute holding the id of an earlier, related event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackReference {
    ScheduledEventId,
    StartedEventId,
    InitiatedEventId,
    DecisionTaskCompletedEventId,
}

impl BackReference {
    pub fn attribute_name(self) -> &'static str {
        match self {
            Self::ScheduledEventId => "scheduledEventId",
            Self::StartedEventId => "startedEventId",
            Self::InitiatedEventId => "initiatedEventId",
            Self::DecisionTaskCompletedEventId => "decisionTaskCompletedEventId",
        }
    }
}

/// Coarse grouping used for summaries and rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Activity,
    Decision,
    Timer,
    ChildWorkflow,
    ExternalWorkflow,
    Marker,
    Workflow,
    Unknown,
}

impl EventType {
    /// Look up a wire name; unrecognised names become `Unknown`
    pub fn from_name(name: &str) -> Self {
        EVENT_TYPES_BY_NAME
            .get(name)
            .cloned()
            .unwrap_or_else(|| Self::Unknown(name.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    pub fn category(&self) -> EventCategory {
        use EventType::*;
        match self {
            ActivityTaskCanceled
            | ActivityTaskCancelRequested
            | ActivityTaskCompleted
            | ActivityTaskFailed
            | ActivityTaskScheduled
            | ActivityTaskStarted
            | ActivityTaskTimedOut
            | RequestCancelActivityTaskFailed => EventCategory::Activity,
            DecisionTaskCompleted
            | DecisionTaskFailed
            | DecisionTaskScheduled
            | DecisionTaskStarted
            | DecisionTaskTimedOut => EventCategory::Decision,
            CancelTimerFailed | TimerCanceled | TimerFired | TimerStarted => EventCategory::Timer,
            ChildWorkflowExecutionCanceled
            | ChildWorkflowExecutionCompleted
            | ChildWorkflowExecutionFailed
            | ChildWorkflowExecutionStarted
            | ChildWorkflowExecutionTerminated
            | ChildWorkflowExecutionTimedOut
            | StartChildWorkflowExecutionFailed
            | StartChildWorkflowExecutionInitiated => EventCategory::ChildWorkflow,
            ExternalWorkflowExecutionCancelRequested
            | ExternalWorkflowExecutionSignaled
            | RequestCancelExternalWorkflowExecutionFailed
            | RequestCancelExternalWorkflowExecutionInitiated
            | SignalExternalWorkflowExecutionFailed
            | SignalExternalWorkflowExecutionInitiated => EventCategory::ExternalWorkflow,
            MarkerRecorded => EventCategory::Marker,
            UpsertWorkflowSearchAttributes
            | WorkflowExecutionCanceled
            | WorkflowExecutionCancelRequested
            | WorkflowExecutionCompleted
            | WorkflowExecutionContinuedAsNew
            | WorkflowExecutionFailed
            | WorkflowExecutionSignaled
            | WorkflowExecutionStarted
            | WorkflowExecutionTerminated
            | WorkflowExecutionTimedOut => EventCategory::Workflow,
            Unknown(_) => EventCategory::Unknown,
        }
    }

    /// Initiating events open their own thread
    pub fn opens_thread(&self) -> bool {
        matches!(
            self,
            Self::ActivityTaskScheduled
                | Self::DecisionTaskScheduled
                | Self::TimerStarted
                | Self::StartChildWorkflowExecutionInitiated
                | Self::SignalExternalWorkflowExecutionInitiated
                | Self::RequestCancelExternalWorkflowExecutionInitiated
        )
    }

    /// References that place the event inside its initiator's thread
    pub fn membership_references(&self) -> &'static [BackReference] {
        use BackReference::*;
        use EventType::*;
        match self {
            ActivityTaskStarted | DecisionTaskStarted => &[ScheduledEventId],
            ActivityTaskCompleted
            | ActivityTaskFailed
            | ActivityTaskTimedOut
            | ActivityTaskCanceled
            | DecisionTaskCompleted
            | DecisionTaskFailed
            | DecisionTaskTimedOut => &[StartedEventId, ScheduledEventId],
            TimerFired | TimerCanceled => &[StartedEventId],
            ChildWorkflowExecutionStarted
            | StartChildWorkflowExecutionFailed
            | ExternalWorkflowExecutionSignaled
            | SignalExternalWorkflowExecutionFailed
            | ExternalWorkflowExecutionCancelRequested
            | RequestCancelExternalWorkflowExecutionFailed => &[InitiatedEventId],
            ChildWorkflowExecutionCompleted
            | ChildWorkflowExecutionFailed
            | ChildWorkflowExecutionCanceled
            | ChildWorkflowExecutionTimedOut
            | ChildWorkflowExecutionTerminated => &[StartedEventId, InitiatedEventId],
            _ => &[],
        }
    }

    /// All references that yield an inferred causal connection
    ///
    /// Commands issued by a decision point back at the completing decision
    /// task; that link is causal only and does not change the thread.
    pub fn causal_references(&self) -> &'static [BackReference] {
        use BackReference::*;
        use EventType::*;
        match self {
            ActivityTaskScheduled
            | ActivityTaskCancelRequested
            | RequestCancelActivityTaskFailed
            | TimerStarted
            | CancelTimerFailed
            | StartChildWorkflowExecutionInitiated
            | SignalExternalWorkflowExecutionInitiated
            | RequestCancelExternalWorkflowExecutionInitiated
            | MarkerRecorded
            | UpsertWorkflowSearchAttributes
            | WorkflowExecutionCompleted
            | WorkflowExecutionFailed
            | WorkflowExecutionCanceled
            | WorkflowExecutionContinuedAsNew => &[DecisionTaskCompletedEventId],
            other => other.membership_references(),
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Single recorded occurrence in a workflow execution history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Type-specific payload
    pub attributes: Map<String, Value>,
}

impl WorkflowEvent {
    pub fn new(id: EventId, timestamp: DateTime<Utc>, event_type: impl Into<EventType>) -> Self {
        Self {
            id,
            timestamp,
            event_type: event_type.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Read a back-reference attribute as an event id
    pub fn back_reference(&self, reference: BackReference) -> Option<EventId> {
        self.attributes
            .get(reference.attribute_name())
            .and_then(parse_event_id)
    }
}

/// Why an input event was left out of the history
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("event #{index} is not an object")]
    NotAnObject { index: usize },

    #[error("event #{index} has no usable id")]
    MissingId { index: usize },

    #[error("event #{index} (id {id}) has no usable timestamp")]
    MissingTimestamp { index: usize, id: EventId },

    #[error("event #{index} (id {id}) has no eventType")]
    MissingEventType { index: usize, id: EventId },

    #[error("event #{index} duplicates id {id}")]
    DuplicateId { index: usize, id: EventId },
}

/// Parsed execution history, ordered by event id
#[derive(Debug, Clone, Default)]
pub struct History {
    events: Vec<WorkflowEvent>,
    skipped: Vec<MalformedEvent>,
    seen: FxHashSet<EventId>,
}

impl History {
    /// Build from already-typed events (sorted by id, duplicates dropped)
    pub fn from_events(events: Vec<WorkflowEvent>) -> Self {
        let mut history = Self::default();
        for (index, event) in events.into_iter().enumerate() {
            history.push(index, event);
        }
        history.finish()
    }

    /// Parse a JSON document: an array of events, `{ events: [...] }`
    /// or `{ history: { events: [...] } }`
    pub fn from_json(document: &Value) -> Result<Self> {
        let raw_events = event_array(document).ok_or_else(|| GraphError::InvalidHistory {
            reason: format!("expected an event array, found {}", value_kind(document)),
        })?;

        let mut history = Self::default();
        for (index, raw) in raw_events.iter().enumerate() {
            match parse_event(index, raw) {
                Ok(event) => history.push(index, event),
                Err(malformed) => {
                    warn!(%malformed, "skipping malformed history event");
                    history.skipped.push(malformed);
                }
            }
        }
        Ok(history.finish())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(yaml)?;
        Self::from_json(&document)
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn skipped(&self) -> &[MalformedEvent] {
        &self.skipped
    }

    pub fn into_events(self) -> Vec<WorkflowEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, index: usize, event: WorkflowEvent) {
        if !self.seen.insert(event.id) {
            let malformed = MalformedEvent::DuplicateId { index, id: event.id };
            warn!(%malformed, "skipping malformed history event");
            self.skipped.push(malformed);
            return;
        }
        self.events.push(event);
    }

    fn finish(mut self) -> Self {
        self.events.sort_by_key(|e| e.id);
        self
    }
}

impl FromStr for History {
    type Err = GraphError;

    fn from_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_json(&document)
    }
}

fn event_array(document: &Value) -> Option<&Vec<Value>> {
    match document {
        Value::Array(events) => Some(events),
        Value::Object(map) => map
            .get("events")
            .and_then(Value::as_array)
            .or_else(|| {
                map.get("history")
                    .and_then(|h| h.get("events"))
                    .and_then(Value::as_array)
            }),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without events",
    }
}

fn parse_event(index: usize, raw: &Value) -> std::result::Result<WorkflowEvent, MalformedEvent> {
    let obj = raw.as_object().ok_or(MalformedEvent::NotAnObject { index })?;

    let id = obj
        .get("eventId")
        .or_else(|| obj.get("id"))
        .and_then(parse_event_id)
        .ok_or(MalformedEvent::MissingId { index })?;

    let timestamp = obj
        .get("timestamp")
        .and_then(parse_timestamp)
        .ok_or(MalformedEvent::MissingTimestamp { index, id })?;

    let event_type = obj
        .get("eventType")
        .or_else(|| obj.get("type"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(EventType::from_name)
        .ok_or(MalformedEvent::MissingEventType { index, id })?;

    let attributes = obj
        .get("attributes")
        .or_else(|| obj.get("details"))
        .or_else(|| {
            obj.iter()
                .find(|(key, _)| key.ends_with("EventAttributes"))
                .map(|(_, value)| value)
        })
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(WorkflowEvent {
        id,
        timestamp,
        event_type,
        attributes,
    })
}

/// Event ids arrive as numbers or as numeric strings (64-bit safe)
fn parse_event_id(value: &Value) -> Option<EventId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 string, or epoch nanoseconds as number / numeric string.
/// Float numbers are accepted when they hold a whole nanosecond count.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(|nanos| Utc.timestamp_nanos(nanos)),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(nanos) => Some(Utc.timestamp_nanos(nanos)),
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ═══════════════════════════════════════════════════════════════
    // EventType
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn event_type_name_roundtrip() {
        for (name, ty) in known_event_types() {
            assert_eq!(EventType::from_name(name), ty);
            assert_eq!(ty.as_str(), name);
        }
    }

    #[test]
    fn unknown_event_type_keeps_name() {
        let ty = EventType::from_name("WorkflowExecutionOptionsUpdated");
        assert!(!ty.is_known());
        assert_eq!(ty.as_str(), "WorkflowExecutionOptionsUpdated");
        assert_eq!(ty.category(), EventCategory::Unknown);
        assert!(ty.causal_references().is_empty());
    }

    #[test]
    fn decision_commands_only_reference_decision_task() {
        let ty = EventType::TimerStarted;
        assert!(ty.opens_thread());
        assert!(ty.membership_references().is_empty());
        assert_eq!(
            ty.causal_references(),
            &[BackReference::DecisionTaskCompletedEventId]
        );
    }

    // ═══════════════════════════════════════════════════════════════
    // Parsing
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn parses_cadence_style_events() {
        let doc = json!({
            "history": { "events": [
                {
                    "eventId": "2",
                    "timestamp": "1600000000000000000",
                    "eventType": "ActivityTaskStarted",
                    "activityTaskStartedEventAttributes": { "scheduledEventId": "1" }
                },
                {
                    "eventId": 1,
                    "timestamp": "2020-09-13T12:26:40Z",
                    "eventType": "ActivityTaskScheduled",
                    "details": { "activityId": "0" }
                }
            ]}
        });

        let history = History::from_json(&doc).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.skipped().is_empty());

        let ids: Vec<_> = history.events().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let started = &history.events()[1];
        assert_eq!(started.back_reference(BackReference::ScheduledEventId), Some(1));
        assert_eq!(started.timestamp, history.events()[0].timestamp);
    }

    #[test]
    fn malformed_events_are_excluded() {
        let doc = json!([
            { "eventId": 1, "timestamp": 0, "eventType": "WorkflowExecutionStarted" },
            { "timestamp": 0, "eventType": "TimerStarted" },
            { "eventId": 3, "eventType": "TimerStarted" },
            { "eventId": 4, "timestamp": 0 },
            "garbage",
            { "eventId": 1, "timestamp": 0, "eventType": "MarkerRecorded" }
        ]);

        let history = History::from_json(&doc).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history.skipped(),
            &[
                MalformedEvent::MissingId { index: 1 },
                MalformedEvent::MissingTimestamp { index: 2, id: 3 },
                MalformedEvent::MissingEventType { index: 3, id: 4 },
                MalformedEvent::NotAnObject { index: 4 },
                MalformedEvent::DuplicateId { index: 5, id: 1 },
            ]
        );
    }

    #[test]
    fn float_epoch_timestamps() {
        let history: History = r#"[
            {"eventId": 1, "timestamp": 1.7e18, "eventType": "WorkflowExecutionStarted"},
            {"eventId": 2, "timestamp": 12.5, "eventType": "MarkerRecorded"}
        ]"#
        .parse()
        .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(
            history.events()[0].timestamp,
            Utc.timestamp_nanos(1_700_000_000_000_000_000)
        );
        assert_eq!(
            history.skipped(),
            &[MalformedEvent::MissingTimestamp { index: 1, id: 2 }]
        );
    }

    #[test]
    fn from_events_sorts_and_keeps_first_duplicate() {
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        let history = History::from_events(vec![
            WorkflowEvent::new(3, at(3), EventType::TimerFired),
            WorkflowEvent::new(1, at(1), EventType::WorkflowExecutionStarted),
            WorkflowEvent::new(3, at(9), EventType::MarkerRecorded),
            WorkflowEvent::new(2, at(2), EventType::TimerStarted),
        ]);

        assert_eq!(
            history.skipped(),
            &[MalformedEvent::DuplicateId { index: 2, id: 3 }]
        );
        let events = history.into_events();
        let ids: Vec<_> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(events[2].event_type, EventType::TimerFired);
    }

    #[test]
    fn unknown_type_is_still_an_event() {
        let history: History =
            r#"[{"id": 1, "timestamp": 5, "type": "SomethingNew"}]"#.parse().unwrap();
        assert_eq!(
            history.events()[0].event_type,
            EventType::Unknown("SomethingNew".into())
        );
    }

    #[test]
    fn rejects_non_history_document() {
        let err = History::from_json(&json!({ "foo": 1 })).unwrap_err();
        assert!(matches!(err, GraphError::InvalidHistory { .. }));
    }

    #[test]
    fn parses_yaml_history() {
        let yaml = r#"
events:
  - eventId: 1
    timestamp: 0
    eventType: TimerStarted
  - eventId: 2
    timestamp: 10
    eventType: TimerFired
    attributes:
      startedEventId: 1
"#;
        let history = History::from_yaml_str(yaml).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.events()[1].back_reference(BackReference::StartedEventId),
            Some(1)
        );
    }
}
