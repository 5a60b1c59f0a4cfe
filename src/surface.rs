use tracing::debug;

use crate::scope::Scope;

/// The host-side command menu. Building its content is the host
/// integration's problem; the core only decides when to regenerate it.
pub trait CommandSurface {
    /// Regenerate the full command set for the given scope.
    fn rebuild(&mut self, scope: &Scope);

    /// Replace the command set with a single entry explaining why the
    /// pipeline is unavailable.
    fn disable(&mut self, reason: &str);
}

/// Reentrancy guard around surface regeneration.
///
/// While the suppression flag is set (only during a prefetch scan), rebuild
/// and disable requests are dropped. The surface becomes correct again when
/// the prefetcher's final restore refresh runs unsuppressed.
pub struct SurfaceCoordinator {
    surface: Box<dyn CommandSurface>,
    rebuild_suppressed: bool,
}

impl SurfaceCoordinator {
    pub fn new(surface: Box<dyn CommandSurface>) -> Self {
        Self {
            surface,
            rebuild_suppressed: false,
        }
    }

    pub fn rebuild(&mut self, scope: &Scope) {
        if self.rebuild_suppressed {
            debug!(scope = %scope, "surface rebuild suppressed during prefetch");
            return;
        }
        self.surface.rebuild(scope);
    }

    pub fn disable(&mut self, reason: &str) {
        if self.rebuild_suppressed {
            debug!(reason, "surface disable suppressed during prefetch");
            return;
        }
        self.surface.disable(reason);
    }

    /// Bypasses suppression. Used by the outermost fault handler, which must
    /// leave a visible diagnostic no matter what state a scan died in.
    pub fn force_disable(&mut self, reason: &str) {
        self.rebuild_suppressed = false;
        self.surface.disable(reason);
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.rebuild_suppressed = suppressed;
    }

    pub fn is_suppressed(&self) -> bool {
        self.rebuild_suppressed
    }
}
