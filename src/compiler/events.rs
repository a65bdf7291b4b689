//! Event logging for the optimization pipeline.
//!
//! Passes record what they did, and what they declined to do, into an
//! [`EventLog`] shared through the [`CompilerContext`](crate::compiler::CompilerContext).
//! Skipped loops and rejected call sites are not errors; they show up here
//! instead.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API for creating events, recorded on drop
//!
//! # Example
//!
//! ```rust
//! use optiscope::compiler::{EventKind, EventLog};
//! use optiscope::ir::MethodRef;
//!
//! let log = EventLog::new();
//! let method = MethodRef::new("demo.Main", "run", "()V");
//!
//! log.record(EventKind::LoopInverted)
//!     .at(method.clone(), 3)
//!     .message("inverted loop headed by $B3");
//! log.info("pipeline finished");
//!
//! assert!(log.has(EventKind::LoopInverted));
//! assert_eq!(log.filter_method(&method).count(), 1);
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use strum::{EnumIter, IntoEnumIterator};

use crate::ir::MethodRef;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum EventKind {
    /// An array unwrap was moved next to its array definition.
    UnwrapMoved,
    /// A loop was rewritten into guarded do-while form.
    LoopInverted,
    /// A loop was left alone because its shape does not allow inversion.
    LoopSkipped,
    /// A call site was replaced by the callee body.
    MethodInlined,
    /// A call site was considered for inlining and rejected.
    InlineRejected,
    /// A class initialization was inserted in front of inlined code.
    ClassInitInserted,

    /// A pass started on a method.
    PassStarted,
    /// A pass completed on a method.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnwrapMoved => "unwrap moved",
            Self::LoopInverted => "loop inverted",
            Self::LoopSkipped => "loop skipped",
            Self::MethodInlined => "method inlined",
            Self::InlineRejected => "inline rejected",
            Self::ClassInitInserted => "class init inserted",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::UnwrapMoved | Self::LoopInverted | Self::MethodInlined | Self::ClassInitInserted
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method where the event occurred (if applicable).
    pub method: Option<MethodRef>,
    /// Block index within the method.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if let Some(method) = &self.method {
            write!(f, "{method}")?;
            if let Some(location) = self.location {
                write!(f, "@$B{location}")?;
            }
            f.write_str(": ")?;
        }
        f.write_str(&self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodRef>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and block where the event occurred.
    pub fn at(mut self, method: MethodRef, location: usize) -> Self {
        self.method = Some(method);
        self.location = Some(location);
        self
    }

    /// Sets only the method.
    pub fn method(mut self, method: MethodRef) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the block index.
    pub fn location(mut self, location: usize) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events from one optimization run.
///
/// Statistics are derived from the events rather than tracked separately.
/// Events can be appended concurrently through shared references.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method<'a>(
        &'a self,
        method: &'a MethodRef,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.method.as_ref() == Some(method))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of unique methods with transformation events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.method.as_ref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all transformations, in the
    /// order the kinds are declared.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();
        let parts: Vec<String> = EventKind::iter()
            .filter(EventKind::is_transformation)
            .filter_map(|kind| {
                counts
                    .get(&kind)
                    .map(|count| format!("{} {}", count, kind.description()))
            })
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> MethodRef {
        MethodRef::new("demo.Main", "run", "()V")
    }

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        assert!(log.is_empty());

        log.record(EventKind::MethodInlined)
            .at(method(), 2)
            .pass("inlining")
            .message("inlined demo.Util.id(I)I");

        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.kind, EventKind::MethodInlined);
        assert_eq!(event.location, Some(2));
        assert_eq!(event.pass.as_deref(), Some("inlining"));
        assert_eq!(
            event.to_string(),
            "[method inlined] demo.Main.run()V@$B2: inlined demo.Util.id(I)I"
        );
    }

    #[test]
    fn test_default_message_is_description() {
        let log = EventLog::new();
        log.record(EventKind::LoopSkipped);
        assert_eq!(log.iter().next().unwrap().message, "loop skipped");
    }

    #[test]
    fn test_queries() {
        let log = EventLog::new();
        log.record(EventKind::UnwrapMoved).method(method());
        log.record(EventKind::UnwrapMoved).method(method());
        log.record(EventKind::LoopInverted).method(method());
        log.record(EventKind::InlineRejected).method(method());
        log.warn("odd");

        assert_eq!(log.count_kind(EventKind::UnwrapMoved), 2);
        assert!(log.has(EventKind::LoopInverted));
        assert!(!log.has(EventKind::MethodInlined));
        assert_eq!(log.transformations().count(), 3);
        assert_eq!(log.diagnostics().count(), 1);
        assert_eq!(log.methods_affected(), 1);
        assert_eq!(log.summary(), "2 unwrap moved, 1 loop inverted");
    }

    #[test]
    fn test_kind_descriptions_are_distinct() {
        let descriptions: HashSet<&str> = EventKind::iter().map(|k| k.description()).collect();
        assert_eq!(descriptions.len(), EventKind::iter().count());
        assert_eq!(
            EventKind::iter().filter(EventKind::is_transformation).count(),
            4
        );
        assert!(EventKind::iter()
            .filter(EventKind::is_diagnostic)
            .all(|k| !k.is_transformation()));
    }

    #[test]
    fn test_summary_without_transformations() {
        let log = EventLog::new();
        assert_eq!(log.summary(), "no events");
        log.info("hello");
        assert_eq!(log.summary(), "1 events");
    }

    #[test]
    fn test_clone_and_merge() {
        let log = EventLog::new();
        log.info("a");
        let copy = log.clone();
        copy.merge(&log);
        assert_eq!(copy.len(), 2);
        assert_eq!(log.len(), 1);
    }
}
