use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw host notifications the bridge consumes. The host fires these
/// asynchronously and sometimes redundantly; classification and debouncing
/// happen downstream in the focus tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A document was opened, or a brand-new unsaved one was created
    /// (`path: None`).
    DocumentOpened { path: Option<PathBuf> },
    DocumentSaved { path: PathBuf },
    /// Focus moved between the project/timeline surface and the embedded
    /// node-graph surface. `path` carries the document (or project file) now
    /// in front, when the host knows it.
    ViewFocusChanged {
        detail_view: bool,
        path: Option<PathBuf>,
    },
    /// The user selected items in the project view; `paths` are the
    /// candidate documents those items point at.
    SelectionChanged { paths: Vec<PathBuf> },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::DocumentOpened { .. } => EventKind::DocumentOpened,
            HostEvent::DocumentSaved { .. } => EventKind::DocumentSaved,
            HostEvent::ViewFocusChanged { .. } => EventKind::ViewFocusChanged,
            HostEvent::SelectionChanged { .. } => EventKind::SelectionChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DocumentOpened,
    DocumentSaved,
    ViewFocusChanged,
    SelectionChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::DocumentOpened,
        EventKind::DocumentSaved,
        EventKind::ViewFocusChanged,
        EventKind::SelectionChanged,
    ];
}

/// Host event subscription API. Hosts tend to happily register the same
/// callback twice, so the bridge never calls this directly; it goes through
/// [`EventRegistry`].
pub trait HostEventBus {
    fn subscribe(&mut self, kind: EventKind);
    fn unsubscribe(&mut self, kind: EventKind);
}

/// Tracks which event kinds the bridge has registered for, keyed by
/// identity rather than by introspecting the host's registries.
/// `ensure_registered` is idempotent; teardown happens only on explicit
/// `unregister_all`.
pub struct EventRegistry {
    bus: Box<dyn HostEventBus>,
    registered: HashSet<EventKind>,
}

impl EventRegistry {
    pub fn new(bus: Box<dyn HostEventBus>) -> Self {
        Self {
            bus,
            registered: HashSet::new(),
        }
    }

    pub fn ensure_registered(&mut self) {
        for kind in EventKind::ALL {
            if self.registered.insert(kind) {
                debug!(?kind, "subscribing to host event");
                self.bus.subscribe(kind);
            }
        }
    }

    pub fn unregister_all(&mut self) {
        for kind in EventKind::ALL {
            if self.registered.remove(&kind) {
                debug!(?kind, "unsubscribing from host event");
                self.bus.unsubscribe(kind);
            }
        }
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.registered.contains(&kind)
    }
}
