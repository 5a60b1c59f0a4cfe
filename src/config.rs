use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scope::Scope;

const DEFAULT_FOLLOW_POLL_MILLIS: u64 = 500;
const MIN_FOLLOW_POLL_MILLIS: u64 = 50;
const CONFIG_SCHEMA_VERSION: u32 = 2;

/// Env var carrying the scope handed down by the process that spawned this
/// one, as a JSON `Scope`. Read once at startup; a host integration sets it
/// (from [`crate::engine::ScopeBridge::handoff_value`]) before spawning a
/// child on file-new/file-open.
pub const HANDOFF_ENV: &str = "SCOPE_BRIDGE_INIT_SCOPE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub schema_version: u32,
    /// Root directory the demo directory-convention resolver works under.
    /// `None` means "parent of the replayed event log".
    pub project_root: Option<PathBuf>,
    pub follow_poll_millis: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            project_root: None,
            follow_poll_millis: DEFAULT_FOLLOW_POLL_MILLIS,
        }
    }
}

impl BridgeConfig {
    pub fn load_or_init() -> Result<Self> {
        let cfg_path = config_path();
        if let Some(parent) = cfg_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        if cfg_path.exists() {
            let raw = fs::read_to_string(&cfg_path)
                .with_context(|| format!("failed to read {}", cfg_path.display()))?;
            let mut parsed: BridgeConfig = serde_json::from_str(&raw)
                .with_context(|| format!("invalid JSON in {}", cfg_path.display()))?;
            if parsed.normalize_and_migrate() {
                parsed.save()?;
            }
            Ok(parsed)
        } else {
            let cfg = BridgeConfig::default();
            cfg.save()?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn normalize_and_migrate(&mut self) -> bool {
        let mut changed = false;

        if self.schema_version < CONFIG_SCHEMA_VERSION {
            self.schema_version = CONFIG_SCHEMA_VERSION;
            changed = true;
        }

        if self
            .project_root
            .as_deref()
            .is_some_and(|root| root.as_os_str().is_empty())
        {
            self.project_root = None;
            changed = true;
        }

        if self.follow_poll_millis < MIN_FOLLOW_POLL_MILLIS {
            self.follow_poll_millis = DEFAULT_FOLLOW_POLL_MILLIS;
            changed = true;
        }

        changed
    }

    pub fn follow_poll_interval(&self) -> Duration {
        Duration::from_millis(
            env_u64("SCOPE_BRIDGE_POLL_MILLIS", self.follow_poll_millis)
                .max(MIN_FOLLOW_POLL_MILLIS),
        )
    }
}

/// The inherited startup scope, if the parent process handed one down.
/// Unparseable values degrade to "no inherited scope"; they never fail the
/// launch.
pub fn inherited_scope() -> Option<Scope> {
    let raw = env::var(HANDOFF_ENV).ok()?;
    parse_handoff(&raw)
}

fn parse_handoff(raw: &str) -> Option<Scope> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Scope>(trimmed) {
        Ok(scope) if !scope.is_empty() => Some(scope),
        Ok(_) => None,
        Err(err) => {
            warn!(%err, "ignoring malformed startup scope handoff");
            None
        }
    }
}

pub fn bridge_home() -> PathBuf {
    if let Ok(custom) = env::var("SCOPE_BRIDGE_HOME") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scope-bridge")
}

pub fn config_path() -> PathBuf {
    bridge_home().join("config.json")
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
