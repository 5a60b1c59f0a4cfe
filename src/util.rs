use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).without_time().try_init();
}

/// Flattens a panic payload into a one-line diagnostic for the disabled
/// surface. Payloads are `&str` or `String` in practice.
pub fn panic_summary(payload: &(dyn Any + Send)) -> String {
    let text = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown internal fault".to_string()
    };
    truncate(text.trim(), 200)
}

/// Rewrites any separator style to the host's native one. Event logs are
/// written on whatever platform the host ran on; the core compares paths
/// byte-wise, so they have to agree before resolution.
pub fn normalize_separators(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let normalized: String = text
        .chars()
        .map(|ch| {
            if ch == '/' || ch == '\\' {
                std::path::MAIN_SEPARATOR
            } else {
                ch
            }
        })
        .collect();
    PathBuf::from(normalized)
}

pub fn truncate(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }
    // back up until the cut lands on a char boundary; slicing mid-character
    // would panic on multibyte text
    let mut cut = max_len.saturating_sub(3);
    while !input.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &input[..cut])
}

pub fn human_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
