use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{self, BridgeConfig};
use crate::engine::{HostAdapters, ScopeBridge};
use crate::replay::{
    AnnouncingSurface, DirectoryScopeSource, EventLogReader, NullEventBus, ReplaySessionBackend,
    TimedEvent,
};

/// Feed a recorded host event log through the bridge, either in one pass or
/// tailing the log as the host appends to it.
pub fn run_replay(config: &BridgeConfig, file: Option<PathBuf>, follow: bool) -> Result<()> {
    let mut bridge = build_bridge(config, file.as_deref());
    bridge.ensure_registered();
    let started = Instant::now();

    let handled = match file {
        Some(path) => replay_file(&mut bridge, config, &path, follow)?,
        None => {
            if follow {
                warn!("--follow has no effect when reading from stdin");
            }
            replay_stdin(&mut bridge)?
        }
    };

    bridge.shutdown();
    info!(
        handled,
        elapsed = %crate::util::human_duration(started.elapsed()),
        "replay finished"
    );
    Ok(())
}

fn build_bridge(config: &BridgeConfig, log_path: Option<&Path>) -> ScopeBridge {
    let root = config
        .project_root
        .clone()
        .or_else(|| log_path.and_then(|p| p.parent().map(Path::to_path_buf)))
        .unwrap_or_else(|| PathBuf::from("."));
    info!(root = %root.display(), "using project root");

    ScopeBridge::new(
        HostAdapters {
            scopes: Box::new(DirectoryScopeSource::new(root)),
            sessions: Box::new(ReplaySessionBackend),
            surface: Box::new(AnnouncingSurface),
            events: Box::new(NullEventBus),
        },
        config::inherited_scope(),
    )
}

fn replay_file(
    bridge: &mut ScopeBridge,
    config: &BridgeConfig,
    path: &Path,
    follow: bool,
) -> Result<usize> {
    let mut reader = EventLogReader::new(path);
    let mut handled = 0usize;

    if !follow {
        for timed in reader.read_new()? {
            handle(bridge, timed, &mut handled);
        }
        return Ok(handled);
    }

    let stop = install_stop_signal()?;
    println!("Following {}; press Ctrl+C to stop.", path.display());
    while !stop.load(Ordering::Relaxed) {
        for timed in reader.read_new()? {
            handle(bridge, timed, &mut handled);
        }
        thread::sleep(config.follow_poll_interval());
    }
    Ok(handled)
}

fn replay_stdin(bridge: &mut ScopeBridge) -> Result<usize> {
    let stdin = io::stdin();
    let mut handled = 0usize;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read event from stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TimedEvent>(trimmed) {
            Ok(timed) => handle(bridge, timed, &mut handled),
            Err(err) => warn!(%err, "skipping malformed event line"),
        }
    }
    Ok(handled)
}

fn handle(bridge: &mut ScopeBridge, timed: TimedEvent, handled: &mut usize) {
    if let Some(timestamp) = timed.timestamp {
        info!(%timestamp, event = ?timed.event.kind(), "host event");
    } else {
        info!(event = ?timed.event.kind(), "host event");
    }
    bridge.handle_event(timed.event);
    *handled += 1;
}

pub fn doctor(config: &BridgeConfig) -> Result<u8> {
    let mut issues = 0u8;

    println!("scope-bridge doctor");
    println!("config_path: {}", config::config_path().display());

    match &config.project_root {
        Some(root) if root.exists() => {
            println!("[OK] project root exists: {}", root.display());
        }
        Some(root) => {
            issues += 1;
            println!("[WARN] configured project root missing: {}", root.display());
        }
        None => {
            println!("[INFO] no project root configured; replay infers it from the event log.");
        }
    }

    match std::env::var(config::HANDOFF_ENV) {
        Ok(_) => match config::inherited_scope() {
            Some(scope) => println!("[OK] startup scope handoff present: {scope}"),
            None => {
                issues += 1;
                println!(
                    "[WARN] {} is set but does not parse as a scope.",
                    config::HANDOFF_ENV
                );
            }
        },
        Err(_) => println!(
            "[INFO] no startup scope handoff ({} unset); new documents fall back to an empty scope.",
            config::HANDOFF_ENV
        ),
    }

    if issues == 0 {
        println!("Doctor: healthy");
        Ok(0)
    } else {
        println!("Doctor: {issues} issue(s) found");
        Ok(1)
    }
}

fn install_stop_signal() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(stop)
}
