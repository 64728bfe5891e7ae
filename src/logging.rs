//! Deterministic audit logging for the DTSE
//!
//! Entries and events are stamped with the block time rather than the wall
//! clock, so replaying the same batch against the same state yields the same
//! log on every replica. Operational diagnostics use `tracing` instead and
//! never feed back into results.

use serde::{Deserialize, Serialize};

use crate::types::{Identifier, TimestampMillis};

/// Log level for deterministic logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// A deterministic log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Block time in milliseconds
    pub timestamp: TimestampMillis,
    pub document_id: Option<Identifier>,
    pub transition_index: Option<usize>,
    pub message: String,
    /// Additional structured data
    pub metadata: Vec<(String, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, timestamp: TimestampMillis, message: String) -> Self {
        Self {
            level,
            timestamp,
            document_id: None,
            transition_index: None,
            message,
            metadata: Vec::new(),
        }
    }

    /// Add transition context to the log entry
    pub fn with_transition(mut self, document_id: Identifier, index: usize) -> Self {
        self.document_id = Some(document_id);
        self.transition_index = Some(index);
        self
    }

    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.push((key, value));
        self
    }
}

/// Type of trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventType {
    ValidationStarted,
    /// A contract group finished validation
    GroupValidated,
    TransitionRejected,
    ValidationCompleted,
    ApplyStarted,
    DocumentStored,
    DocumentRemoved,
    ApplyCompleted,
}

/// An event in the execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: TimestampMillis,
    pub event_type: TraceEventType,
    pub document_id: Option<Identifier>,
    pub transition_index: Option<usize>,
    pub data: Vec<(String, String)>,
}

impl TraceEvent {
    pub fn new(timestamp: TimestampMillis, event_type: TraceEventType) -> Self {
        Self {
            timestamp,
            event_type,
            document_id: None,
            transition_index: None,
            data: Vec::new(),
        }
    }
}

/// Execution trace for debugging and audit purposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTraceLog {
    pub block_time: TimestampMillis,
    pub logs: Vec<LogEntry>,
    pub events: Vec<TraceEvent>,
}

impl ExecutionTraceLog {
    pub fn new(block_time: TimestampMillis) -> Self {
        Self {
            block_time,
            logs: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn add_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    /// Record an event stamped with this trace's block time
    pub fn record(&mut self, event_type: TraceEventType) -> &mut TraceEvent {
        self.events.push(TraceEvent::new(self.block_time, event_type));
        let last = self.events.len() - 1;
        &mut self.events[last]
    }

    /// Append another trace's logs and events after this one's
    pub fn extend(&mut self, other: ExecutionTraceLog) {
        self.logs.extend(other.logs);
        self.events.extend(other.events);
    }

    /// Log entries at or above a level
    pub fn logs_at_least(&self, min_level: LogLevel) -> Vec<&LogEntry> {
        self.logs.iter().filter(|e| e.level >= min_level).collect()
    }

    pub fn logs_by_document(&self, document_id: &Identifier) -> Vec<&LogEntry> {
        self.logs
            .iter()
            .filter(|e| e.document_id.as_ref() == Some(document_id))
            .collect()
    }

    pub fn events_by_type(&self, event_type: TraceEventType) -> Vec<&TraceEvent> {
        self.events.iter().filter(|e| e.event_type == event_type).collect()
    }
}
