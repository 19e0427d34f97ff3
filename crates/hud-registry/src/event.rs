use std::fmt;

use hud_core::{Scope, Tag};

use crate::handle::ExtensionHandle;

/// Whether an extension reached or left a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutEventKind {
    /// A slot's add callback ran for an extension.
    ExtensionAdded,
    /// A slot's remove callback ran for an extension.
    ExtensionRemoved,
}

impl fmt::Display for LayoutEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtensionAdded => write!(f, "added"),
            Self::ExtensionRemoved => write!(f, "removed"),
        }
    }
}

/// One delivery of an extension to (or away from) a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEvent<W> {
    /// Monotonic sequence number within the issuing registry.
    pub sequence: u64,
    /// Added or removed.
    pub kind: LayoutEventKind,
    /// Tag of the slot that was notified.
    pub slot_tag: Tag,
    /// Tag the extension was registered at.
    pub extension_tag: Tag,
    /// The extension involved.
    pub extension: ExtensionHandle,
    /// Scope shared by slot and extension.
    pub scope: Scope,
    /// Name of the extension's widget class.
    pub class_name: String,
    /// Widget the slot callback returned, if any.
    pub widget: Option<W>,
}

/// Identifies a listener for [`unsubscribe`](crate::LayoutRegistry::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Keeps the most recent layout events.
#[derive(Debug)]
pub struct EventLog<W> {
    events: Vec<LayoutEvent<W>>,
    max_events: usize,
}

impl<W> Default for EventLog<W> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<W> EventLog<W> {
    /// Create a new event log with the given maximum capacity (0 = unlimited).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
        }
    }

    /// Append an event, dropping the oldest events if the log exceeds its capacity.
    pub fn push(&mut self, event: LayoutEvent<W>) {
        self.events.push(event);
        if self.max_events > 0 && self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(..drain_count);
        }
    }

    /// Return a slice of all retained events, oldest first.
    pub fn events(&self) -> &[LayoutEvent<W>] {
        &self.events
    }

    /// Return all retained events of the given kind.
    pub fn events_of_kind(&self, kind: LayoutEventKind) -> Vec<&LayoutEvent<W>> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    /// Return all retained events involving the given extension.
    pub fn events_for_extension(&self, extension: ExtensionHandle) -> Vec<&LayoutEvent<W>> {
        self.events
            .iter()
            .filter(|e| e.extension == extension)
            .collect()
    }

    /// Return the number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Return `true` if no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove all retained events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
