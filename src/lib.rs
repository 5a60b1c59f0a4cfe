//! Scope-aware session switching for pipeline-integrated editor hosts.
//!
//! The host fires noisy, partially redundant events (document opens, saves,
//! focus moves between its project view and its embedded node-graph view,
//! selection changes). This crate decides, per event, what scope the user is
//! actually working in, whether the single running pipeline session has to
//! be torn down and replaced, and when the command surface needs to be
//! regenerated, without restarting sessions for events that change nothing.

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod events;
pub mod focus;
pub mod prefetch;
pub mod replay;
pub mod scope;
pub mod session;
pub mod surface;
pub mod util;

pub use engine::{HostAdapters, ScopeBridge};
pub use events::{EventKind, HostEvent};
pub use scope::{EnvironmentKey, PathScopeSource, ResolutionError, Scope};
pub use session::{RefreshOutcome, Session, SessionBackend, StartError};
pub use surface::CommandSurface;
