use std::path::PathBuf;

use tracing::debug;

use crate::events::HostEvent;
use crate::scope::Scope;

/// What the tracker wants done in response to a host event: resolve a path
/// into a scope, or refresh straight to an already-known scope.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshPlan {
    FromPath(PathBuf),
    Known(Scope),
}

/// Classifies raw host events into refresh plans and swallows the noise.
///
/// The focus-flip event fires on every navigation between the project view
/// and the embedded node-graph view, including rapid back-and-forth, so
/// repeats with an unchanged direction are dropped outright. Without that
/// guard this one event can flood the lifecycle with destroy/create cycles
/// during ordinary navigation.
pub struct FocusTracker {
    in_detail_view: bool,
    startup_scope: Option<Scope>,
}

impl FocusTracker {
    /// `startup_scope` is the scope handed down from the process that
    /// spawned this one, used when a brand-new unsaved document appears.
    pub fn new(startup_scope: Option<Scope>) -> Self {
        Self {
            in_detail_view: false,
            startup_scope,
        }
    }

    pub fn in_detail_view(&self) -> bool {
        self.in_detail_view
    }

    /// The single fallback rule for events that carry no path: the inherited
    /// startup scope when one was handed down, otherwise the empty scope.
    /// Never fails.
    pub fn fallback_scope(&self) -> Scope {
        self.startup_scope.clone().unwrap_or_default()
    }

    pub fn plan(&mut self, event: &HostEvent) -> Option<RefreshPlan> {
        match event {
            HostEvent::DocumentOpened { path: Some(path) } => {
                Some(RefreshPlan::FromPath(path.clone()))
            }
            // New unsaved document: nothing to resolve, inherit.
            HostEvent::DocumentOpened { path: None } => {
                debug!("new unsaved document; using inherited scope");
                Some(RefreshPlan::Known(self.fallback_scope()))
            }
            HostEvent::DocumentSaved { path } => Some(RefreshPlan::FromPath(path.clone())),
            HostEvent::ViewFocusChanged { detail_view, path } => {
                if *detail_view == self.in_detail_view {
                    debug!(detail_view, "duplicate focus event dropped");
                    return None;
                }
                self.in_detail_view = *detail_view;

                match (*detail_view, path) {
                    (_, Some(path)) => Some(RefreshPlan::FromPath(path.clone())),
                    // Empty node-graph tab: stay in the current scope.
                    (true, None) => None,
                    // Back at the project level with no project file known.
                    (false, None) => Some(RefreshPlan::Known(self.fallback_scope())),
                }
            }
            // Selection changes are speculative; the prefetcher handles them.
            HostEvent::SelectionChanged { .. } => None,
        }
    }
}
