use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identity of "what the user is working on", resolved from a document path.
///
/// Scopes are plain values: compared field-by-field, never mutated after
/// construction. Only the resolver (and the startup handoff) produce
/// non-empty ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Scope {
    pub project: Option<String>,
    pub entity: Option<String>,
    pub task: Option<String>,
}

impl Scope {
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            entity: None,
            task: None,
        }
    }

    pub fn new(
        project: impl Into<String>,
        entity: Option<String>,
        task: Option<String>,
    ) -> Self {
        Self {
            project: Some(project.into()),
            entity,
            task,
        }
    }

    /// A session can only start under a scope that carries at least a
    /// top-level project reference.
    pub fn has_project(&self) -> bool {
        self.project
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.entity.is_none() && self.task.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty scope>");
        }
        let mut parts = Vec::new();
        if let Some(project) = &self.project {
            parts.push(format!("project={project}"));
        }
        if let Some(entity) = &self.entity {
            parts.push(format!("entity={entity}"));
        }
        if let Some(task) = &self.task {
            parts.push(format!("task={task}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Coarse classification of a scope, used to deduplicate prefetch work.
/// Two scopes in different tasks of the same kind of work share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentKey(pub String);

impl fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    /// The path does not map to anything the pipeline knows about.
    #[error("path is not recognized by the pipeline: {path} ({reason})")]
    Unresolvable { path: PathBuf, reason: String },
    /// The path resolved, but not to a scope a session could start under.
    #[error("path resolved to an incomplete scope ({scope}); a project reference is required")]
    InsufficientScope { scope: Scope },
}

/// External path-template resolution service, consumed behind a trait so the
/// core never sees template internals.
pub trait PathScopeSource {
    /// Resolve a document path into a scope. `previous` is a disambiguation
    /// hint: on ties the source should prefer a scope matching prior state.
    fn resolve_scope(
        &self,
        path: &Path,
        previous: Option<&Scope>,
    ) -> Result<Scope, ResolutionError>;

    fn classify_environment(&self, scope: &Scope) -> EnvironmentKey;
}

/// Caching front for [`PathScopeSource`].
///
/// Successful resolutions are cached per path for the process lifetime;
/// failures are never cached, so every failure is retried on next use.
pub struct ScopeResolver {
    source: Box<dyn PathScopeSource>,
    cache: HashMap<PathBuf, Scope>,
}

impl ScopeResolver {
    pub fn new(source: Box<dyn PathScopeSource>) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(
        &mut self,
        path: &Path,
        previous: Option<&Scope>,
    ) -> Result<Scope, ResolutionError> {
        if let Some(hit) = self.cache.get(path) {
            debug!(path = %path.display(), scope = %hit, "scope cache hit");
            return Ok(hit.clone());
        }

        let scope = self.source.resolve_scope(path, previous)?;
        if !scope.has_project() {
            return Err(ResolutionError::InsufficientScope { scope });
        }

        debug!(path = %path.display(), scope = %scope, "resolved scope");
        self.cache.insert(path.to_path_buf(), scope.clone());
        Ok(scope)
    }

    pub fn classify(&self, scope: &Scope) -> EnvironmentKey {
        self.source.classify_environment(scope)
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }
}
