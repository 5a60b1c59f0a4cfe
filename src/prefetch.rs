use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::scope::{EnvironmentKey, ScopeResolver};
use crate::session::SessionLifecycle;
use crate::surface::SurfaceCoordinator;

/// Speculative, non-committing scope resolution driven by selection changes
/// in the project view.
///
/// Hovering a selection over n items must not rebuild the command surface n
/// times, and must not leave the session pointing anywhere new. The scan
/// runs with surface rebuilds suppressed, starts one transient session per
/// previously-unseen environment (purely to force its one-time resource
/// load), and always ends by restoring the committed scope with a single
/// ordinary refresh.
pub struct SelectionPrefetcher {
    processed_paths: HashSet<PathBuf>,
    processed_environments: HashSet<EnvironmentKey>,
}

impl SelectionPrefetcher {
    pub fn new() -> Self {
        Self {
            processed_paths: HashSet::new(),
            processed_environments: HashSet::new(),
        }
    }

    pub fn on_selection_changed(
        &mut self,
        paths: &[PathBuf],
        resolver: &mut ScopeResolver,
        lifecycle: &mut SessionLifecycle,
        surface: &mut SurfaceCoordinator,
    ) {
        let committed = lifecycle.current_scope().cloned();
        surface.set_suppressed(true);

        // A collaborator panic mid-scan must not skip the restore below, so
        // the scan is fenced and the payload re-raised afterwards for the
        // engine boundary to report.
        let scan = panic::catch_unwind(AssertUnwindSafe(|| {
            self.scan(paths, resolver, lifecycle, surface);
        }));

        surface.set_suppressed(false);
        match &committed {
            Some(scope) => {
                if lifecycle.current_scope() != Some(scope) {
                    info!(scope = %scope, "restoring committed scope after prefetch");
                    lifecycle.refresh(scope.clone(), surface);
                }
            }
            // No session was committed when the selection arrived; a scan
            // must not leave one behind.
            None => lifecycle.deactivate(),
        }

        if let Err(payload) = scan {
            panic::resume_unwind(payload);
        }
    }

    fn scan(
        &mut self,
        paths: &[PathBuf],
        resolver: &mut ScopeResolver,
        lifecycle: &mut SessionLifecycle,
        surface: &mut SurfaceCoordinator,
    ) {
        let previous = lifecycle.current_scope().cloned();

        for path in paths {
            if !self.processed_paths.insert(path.clone()) {
                continue;
            }

            let scope = match resolver.resolve(path, previous.as_ref()) {
                Ok(scope) => scope,
                // Folders and other non-document items simply don't resolve;
                // that is a non-match, not an error.
                Err(err) => {
                    debug!(path = %path.display(), %err, "selection item skipped");
                    continue;
                }
            };

            let environment = resolver.classify(&scope);
            if !self.processed_environments.insert(environment.clone()) {
                continue;
            }

            info!(%environment, scope = %scope, "priming environment");
            lifecycle.refresh(scope, surface);
        }
    }

    pub fn has_processed_path(&self, path: &Path) -> bool {
        self.processed_paths.contains(path)
    }

    pub fn has_processed_environment(&self, environment: &EnvironmentKey) -> bool {
        self.processed_environments.contains(environment)
    }
}

impl Default for SelectionPrefetcher {
    fn default() -> Self {
        Self::new()
    }
}
