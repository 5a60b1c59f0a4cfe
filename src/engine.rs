use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use crate::events::{EventRegistry, HostEvent, HostEventBus};
use crate::focus::{FocusTracker, RefreshPlan};
use crate::prefetch::SelectionPrefetcher;
use crate::scope::{PathScopeSource, Scope, ScopeResolver};
use crate::session::{SessionBackend, SessionLifecycle};
use crate::surface::{CommandSurface, SurfaceCoordinator};
use crate::util::panic_summary;

/// The concrete host-side services the bridge drives. Everything behind
/// these traits is external plumbing; the bridge owns only the switching
/// logic.
pub struct HostAdapters {
    pub scopes: Box<dyn PathScopeSource>,
    pub sessions: Box<dyn SessionBackend>,
    pub surface: Box<dyn CommandSurface>,
    pub events: Box<dyn HostEventBus>,
}

/// Binds the single running session to whatever scope the host's event
/// stream says the user is working in.
///
/// Constructed exactly once per process and fed every host event through
/// [`ScopeBridge::handle_event`]. All state that used to be tempting to make
/// global (the suppression flag, the registration table) lives on this one
/// object instead. Single-threaded by contract: the host delivers events
/// serially, and every call here runs to completion before the next one.
pub struct ScopeBridge {
    resolver: ScopeResolver,
    lifecycle: SessionLifecycle,
    surface: SurfaceCoordinator,
    tracker: FocusTracker,
    prefetcher: SelectionPrefetcher,
    registry: EventRegistry,
}

impl ScopeBridge {
    /// `inherited_scope` is the startup handoff from the process that
    /// spawned this one, if any.
    pub fn new(adapters: HostAdapters, inherited_scope: Option<Scope>) -> Self {
        Self {
            resolver: ScopeResolver::new(adapters.scopes),
            lifecycle: SessionLifecycle::new(adapters.sessions),
            surface: SurfaceCoordinator::new(adapters.surface),
            tracker: FocusTracker::new(inherited_scope),
            prefetcher: SelectionPrefetcher::new(),
            registry: EventRegistry::new(adapters.events),
        }
    }

    /// Idempotent; call as often as convenient.
    pub fn ensure_registered(&mut self) {
        self.registry.ensure_registered();
    }

    /// The one entry point the host's event dispatch calls into.
    ///
    /// Nothing may escape back into the host's event loop: expected failures
    /// are handled as data further down, and anything that panics is caught
    /// here and converted into a disabled surface carrying the fault
    /// summary.
    pub fn handle_event(&mut self, event: HostEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&event)));
        if let Err(payload) = outcome {
            let summary = panic_summary(payload.as_ref());
            error!(summary, "internal fault while handling host event");
            self.surface.force_disable(&format!(
                "There was a problem with the pipeline integration. Details: {summary}"
            ));
        }
    }

    fn dispatch(&mut self, event: &HostEvent) {
        if let HostEvent::SelectionChanged { paths } = event {
            self.prefetcher.on_selection_changed(
                paths,
                &mut self.resolver,
                &mut self.lifecycle,
                &mut self.surface,
            );
            return;
        }

        let Some(plan) = self.tracker.plan(event) else {
            return;
        };

        match plan {
            RefreshPlan::FromPath(path) => {
                let previous = self.lifecycle.current_scope().cloned();
                match self.resolver.resolve(&path, previous.as_ref()) {
                    Ok(scope) => {
                        self.lifecycle.refresh(scope, &mut self.surface);
                    }
                    // Degrade, don't propagate: the old session (if any)
                    // stays alive, the surface explains the situation, and
                    // the next recognizable document recovers everything.
                    Err(err) => {
                        warn!(path = %path.display(), %err, "scope resolution failed");
                        self.surface
                            .disable(&format!("{err}. Try opening another file."));
                    }
                }
            }
            RefreshPlan::Known(scope) => {
                self.lifecycle.refresh(scope, &mut self.surface);
            }
        }
    }

    pub fn current_scope(&self) -> Option<&Scope> {
        self.lifecycle.current_scope()
    }

    pub fn is_disabled(&self) -> bool {
        self.lifecycle.is_disabled()
    }

    /// The value a host integration should hand to processes it spawns, so
    /// a child created by file-new/file-open inherits this scope.
    pub fn handoff_value(&self) -> Option<String> {
        self.lifecycle
            .current_scope()
            .and_then(|scope| serde_json::to_string(scope).ok())
    }

    pub fn shutdown(&mut self) {
        self.registry.unregister_all();
        self.lifecycle.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::scope::{EnvironmentKey, ResolutionError};
    use crate::session::{Session, StartError};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Default)]
    struct HostLog {
        starts: Vec<Scope>,
        destroys: Vec<Scope>,
        rebuilds: Vec<Scope>,
        disables: Vec<String>,
        resolves: usize,
    }

    struct FakeSession {
        scope: Scope,
        log: Rc<RefCell<HostLog>>,
    }

    impl Session for FakeSession {
        fn scope(&self) -> &Scope {
            &self.scope
        }
        fn destroy(&mut self) {
            self.log.borrow_mut().destroys.push(self.scope.clone());
        }
    }

    struct FakeBackend(Rc<RefCell<HostLog>>);

    impl SessionBackend for FakeBackend {
        fn start(&mut self, scope: &Scope) -> Result<Box<dyn Session>, StartError> {
            if !scope.has_project() {
                return Err(StartError::InsufficientScope {
                    scope: scope.clone(),
                });
            }
            self.0.borrow_mut().starts.push(scope.clone());
            Ok(Box::new(FakeSession {
                scope: scope.clone(),
                log: Rc::clone(&self.0),
            }))
        }
    }

    struct FakeSurface(Rc<RefCell<HostLog>>);

    impl CommandSurface for FakeSurface {
        fn rebuild(&mut self, scope: &Scope) {
            self.0.borrow_mut().rebuilds.push(scope.clone());
        }
        fn disable(&mut self, reason: &str) {
            self.0.borrow_mut().disables.push(reason.to_string());
        }
    }

    /// /jobs/<project>/<entity>/<task>/<file>, panicking on "poison".
    struct FakeScopes(Rc<RefCell<HostLog>>);

    impl PathScopeSource for FakeScopes {
        fn resolve_scope(
            &self,
            path: &Path,
            _previous: Option<&Scope>,
        ) -> Result<Scope, ResolutionError> {
            self.0.borrow_mut().resolves += 1;
            if path.to_string_lossy().contains("poison") {
                panic!("template engine fault on {}", path.display());
            }
            let parts: Vec<String> = path
                .iter()
                .skip(2)
                .map(|part| part.to_string_lossy().to_string())
                .collect();
            if parts.len() < 4 {
                return Err(ResolutionError::Unresolvable {
                    path: path.to_path_buf(),
                    reason: "no template matched".to_string(),
                });
            }
            Ok(Scope::new(
                parts[0].clone(),
                Some(parts[1].clone()),
                Some(parts[2].clone()),
            ))
        }

        fn classify_environment(&self, scope: &Scope) -> EnvironmentKey {
            EnvironmentKey(scope.task.clone().unwrap_or_else(|| "general".to_string()))
        }
    }

    struct FakeBus;

    impl HostEventBus for FakeBus {
        fn subscribe(&mut self, _kind: EventKind) {}
        fn unsubscribe(&mut self, _kind: EventKind) {}
    }

    fn bridge(inherited: Option<Scope>) -> (ScopeBridge, Rc<RefCell<HostLog>>) {
        let log = Rc::new(RefCell::new(HostLog::default()));
        let bridge = ScopeBridge::new(
            HostAdapters {
                scopes: Box::new(FakeScopes(Rc::clone(&log))),
                sessions: Box::new(FakeBackend(Rc::clone(&log))),
                surface: Box::new(FakeSurface(Rc::clone(&log))),
                events: Box::new(FakeBus),
            },
            inherited,
        );
        (bridge, log)
    }

    fn saved(path: &str) -> HostEvent {
        HostEvent::DocumentSaved {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn new_unsaved_document_inherits_startup_scope_once() {
        // Scenario A: process starts with an inherited project scope; two
        // consecutive "new document" events start exactly one session.
        let inherited = Scope::for_project("P1");
        let (mut bridge, log) = bridge(Some(inherited.clone()));

        bridge.handle_event(HostEvent::DocumentOpened { path: None });
        bridge.handle_event(HostEvent::DocumentOpened { path: None });

        assert_eq!(log.borrow().starts, vec![inherited.clone()]);
        assert!(log.borrow().destroys.is_empty());
        assert_eq!(bridge.current_scope(), Some(&inherited));
    }

    #[test]
    fn new_unsaved_document_without_handoff_disables_not_panics() {
        let (mut bridge, log) = bridge(None);

        bridge.handle_event(HostEvent::DocumentOpened { path: None });

        // the empty scope cannot start a session, so the surface degrades
        assert!(bridge.is_disabled());
        assert_eq!(log.borrow().disables.len(), 1);
    }

    #[test]
    fn save_in_same_scope_does_not_restart_session() {
        let (mut bridge, log) = bridge(None);

        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));
        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));

        assert_eq!(log.borrow().starts.len(), 1);
        // second save hit the scope cache; resolver consulted only once
        assert_eq!(log.borrow().resolves, 1);
    }

    #[test]
    fn save_into_other_scope_swaps_session() {
        let (mut bridge, log) = bridge(None);

        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));
        bridge.handle_event(saved("/jobs/P2/S9/comp/work.v001.ext"));

        let log = log.borrow();
        assert_eq!(log.starts.len(), 2);
        assert_eq!(log.destroys.len(), 1);
        assert_eq!(log.rebuilds.len(), 2);
    }

    #[test]
    fn unrecognized_save_disables_surface_but_keeps_session() {
        let (mut bridge, log) = bridge(None);
        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));
        let scope = bridge.current_scope().cloned().expect("active scope");

        bridge.handle_event(saved("/elsewhere/notes.txt"));

        assert_eq!(bridge.current_scope(), Some(&scope));
        let disables = &log.borrow().disables;
        assert_eq!(disables.len(), 1);
        assert!(disables[0].contains("Try opening another file"));
    }

    #[test]
    fn focus_flood_causes_no_extra_refreshes() {
        let (mut bridge, log) = bridge(None);
        let event = HostEvent::ViewFocusChanged {
            detail_view: true,
            path: Some(PathBuf::from("/jobs/P1/S1/comp/work.v001.ext")),
        };

        bridge.handle_event(event.clone());
        bridge.handle_event(event.clone());
        bridge.handle_event(event);

        assert_eq!(log.borrow().starts.len(), 1);
        assert_eq!(log.borrow().resolves, 1);
    }

    #[test]
    fn selection_prefetch_keeps_committed_scope_and_rebuilds_once() {
        // Scenario C: five candidates over two environments.
        let (mut bridge, log) = bridge(None);
        bridge.handle_event(saved("/jobs/P0/S0/comp/base.ext"));
        let committed = bridge.current_scope().cloned().expect("committed");
        log.borrow_mut().rebuilds.clear();
        log.borrow_mut().starts.clear();

        bridge.handle_event(HostEvent::SelectionChanged {
            paths: vec![
                PathBuf::from("/jobs/P1/S1/light/a.ext"),
                PathBuf::from("/jobs/P1/S2/light/b.ext"),
                PathBuf::from("/jobs/P1/S3/light/c.ext"),
                PathBuf::from("/jobs/P1/S4/fx/d.ext"),
                PathBuf::from("/jobs/P1/S5/fx/e.ext"),
            ],
        });

        let log = log.borrow();
        assert_eq!(log.starts.len(), 3, "2 transient + 1 restore");
        assert_eq!(log.rebuilds.len(), 1, "only the restore rebuild");
        drop(log);
        assert_eq!(bridge.current_scope(), Some(&committed));
    }

    #[test]
    fn panic_in_collaborator_degrades_surface_and_recovers() {
        let (mut bridge, log) = bridge(None);
        bridge.handle_event(saved("/jobs/P0/S0/comp/base.ext"));
        let committed = bridge.current_scope().cloned().expect("committed");

        bridge.handle_event(HostEvent::SelectionChanged {
            paths: vec![PathBuf::from("/jobs/P1/poison/fx/c.ext")],
        });

        // fault reported, suppression cleared, committed scope intact
        let last_disable = log.borrow().disables.last().cloned().expect("disable");
        assert!(last_disable.contains("template engine fault"));
        assert_eq!(bridge.current_scope(), Some(&committed));

        // and a later ordinary event still works
        bridge.handle_event(saved("/jobs/P2/S1/comp/next.ext"));
        assert_eq!(
            bridge.current_scope(),
            Some(&Scope::new(
                "P2",
                Some("S1".to_string()),
                Some("comp".to_string())
            ))
        );
    }

    #[test]
    fn long_non_ascii_fault_message_stays_contained() {
        // A fault whose message overflows the summary limit and carries
        // multibyte text must still end as a disabled surface, not as a
        // panic escaping back into the host's event dispatch.
        let (mut bridge, log) = bridge(None);
        let noisy = format!("/jobs/P1/poison-{}/fx/c.ext", "é".repeat(150));

        bridge.handle_event(HostEvent::SelectionChanged {
            paths: vec![PathBuf::from(noisy)],
        });

        let last_disable = log.borrow().disables.last().cloned().expect("disable");
        assert!(last_disable.contains("template engine fault"));
        assert!(last_disable.ends_with("..."));
    }

    #[test]
    fn handoff_value_carries_current_scope_as_json() {
        let (mut bridge, _) = bridge(None);
        assert_eq!(bridge.handoff_value(), None);

        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));

        let raw = bridge.handoff_value().expect("handoff");
        let parsed: Scope = serde_json::from_str(&raw).expect("json scope");
        assert_eq!(parsed, Scope::new("P1", Some("S1".to_string()), Some("comp".to_string())));
    }

    #[test]
    fn shutdown_destroys_session_and_unregisters() {
        let (mut bridge, log) = bridge(None);
        bridge.ensure_registered();
        bridge.handle_event(saved("/jobs/P1/S1/comp/work.v001.ext"));

        bridge.shutdown();

        assert_eq!(bridge.current_scope(), None);
        assert_eq!(log.borrow().destroys.len(), 1);
    }
}
