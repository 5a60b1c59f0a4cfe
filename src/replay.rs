use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{EventKind, HostEvent, HostEventBus};
use crate::scope::{EnvironmentKey, PathScopeSource, ResolutionError, Scope};
use crate::session::{Session, SessionBackend, StartError};
use crate::surface::CommandSurface;
use crate::util::normalize_separators;

/// One line of a host event log: the event itself plus the moment the host
/// recorded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub event: HostEvent,
}

/// Incremental reader over a JSONL host event log.
///
/// Keeps a byte cursor so follow mode only parses appended lines; a
/// truncated or rewritten file resets the cursor and replays from the top.
/// Malformed lines are skipped, not fatal, since host-side writers get
/// interrupted mid-line.
pub struct EventLogReader {
    path: PathBuf,
    cursor: u64,
}

impl EventLogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_new(&mut self) -> Result<Vec<TimedEvent>> {
        let metadata = std::fs::metadata(&self.path)
            .with_context(|| format!("failed to stat event log {}", self.path.display()))?;
        if metadata.len() < self.cursor {
            debug!(path = %self.path.display(), "event log shrank; replaying from start");
            self.cursor = 0;
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open event log {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.cursor))
            .with_context(|| format!("failed to seek event log {}", self.path.display()))?;
        let mut reader = BufReader::new(file);

        let mut events = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = reader.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TimedEvent>(trimmed) {
                Ok(mut timed) => {
                    timed.event = normalize_event_paths(timed.event);
                    events.push(timed);
                }
                Err(err) => {
                    warn!(%err, "skipping malformed event log line");
                }
            }
        }
        self.cursor = reader.stream_position().unwrap_or(metadata.len());
        Ok(events)
    }
}

fn normalize_event_paths(event: HostEvent) -> HostEvent {
    match event {
        HostEvent::DocumentOpened { path } => HostEvent::DocumentOpened {
            path: path.map(|p| normalize_separators(&p)),
        },
        HostEvent::DocumentSaved { path } => HostEvent::DocumentSaved {
            path: normalize_separators(&path),
        },
        HostEvent::ViewFocusChanged { detail_view, path } => HostEvent::ViewFocusChanged {
            detail_view,
            path: path.map(|p| normalize_separators(&p)),
        },
        HostEvent::SelectionChanged { paths } => HostEvent::SelectionChanged {
            paths: paths.iter().map(|p| normalize_separators(p)).collect(),
        },
    }
}

/// Directory-convention scope source for the replay driver:
/// `<root>/<project>[/<entity>[/<task>]]/<document>`.
///
/// A real host integration plugs a template engine in here instead; the
/// core only ever sees the trait.
pub struct DirectoryScopeSource {
    root: PathBuf,
}

impl DirectoryScopeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PathScopeSource for DirectoryScopeSource {
    fn resolve_scope(
        &self,
        path: &Path,
        previous: Option<&Scope>,
    ) -> Result<Scope, ResolutionError> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            ResolutionError::Unresolvable {
                path: path.to_path_buf(),
                reason: format!("outside project root {}", self.root.display()),
            }
        })?;

        let parts: Vec<String> = relative
            .iter()
            .map(|part| part.to_string_lossy().to_string())
            .collect();

        // the leaf must be a document, not a folder
        let is_document = parts
            .last()
            .is_some_and(|leaf| Path::new(leaf).extension().is_some());
        if parts.len() < 2 || !is_document {
            return Err(ResolutionError::Unresolvable {
                path: path.to_path_buf(),
                reason: "not a leaf document inside a project".to_string(),
            });
        }

        let project = parts[0].clone();
        let entity = (parts.len() >= 3).then(|| parts[1].clone());
        let mut task = (parts.len() >= 4).then(|| parts[2].clone());

        // Disambiguation hint: a path without a task segment keeps the task
        // from the prior scope when project and entity agree.
        if task.is_none()
            && let Some(previous) = previous
            && previous.project.as_deref() == Some(project.as_str())
            && previous.entity == entity
        {
            task = previous.task.clone();
        }

        Ok(Scope::new(project, entity, task))
    }

    fn classify_environment(&self, scope: &Scope) -> EnvironmentKey {
        EnvironmentKey(
            scope
                .task
                .as_deref()
                .unwrap_or("general")
                .to_ascii_lowercase(),
        )
    }
}

/// Replay-side session: there is no real service to boot, so starting one
/// just logs what a host integration would do.
struct ReplaySession {
    scope: Scope,
}

impl Session for ReplaySession {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn destroy(&mut self) {
        info!(scope = %self.scope, "session torn down");
    }
}

pub struct ReplaySessionBackend;

impl SessionBackend for ReplaySessionBackend {
    fn start(&mut self, scope: &Scope) -> Result<Box<dyn Session>, StartError> {
        if !scope.has_project() {
            return Err(StartError::InsufficientScope {
                scope: scope.clone(),
            });
        }
        info!(scope = %scope, "session started");
        Ok(Box::new(ReplaySession {
            scope: scope.clone(),
        }))
    }
}

/// Replay-side command surface: announces what the host menu would show.
pub struct AnnouncingSurface;

impl CommandSurface for AnnouncingSurface {
    fn rebuild(&mut self, scope: &Scope) {
        info!(scope = %scope, "command surface rebuilt");
    }

    fn disable(&mut self, reason: &str) {
        warn!(reason, "command surface disabled");
    }
}

/// The replay driver pushes events straight into the bridge, so the bus has
/// nothing to wire; it only records that registration happened.
pub struct NullEventBus;

impl HostEventBus for NullEventBus {
    fn subscribe(&mut self, kind: EventKind) {
        debug!(?kind, "subscribed");
    }

    fn unsubscribe(&mut self, kind: EventKind) {
        debug!(?kind, "unsubscribed");
    }
}
