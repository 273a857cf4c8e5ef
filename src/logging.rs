use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const RETENTION_DAYS: u64 = 30;
const LOG_FILE_PREFIX: &str = "taskdeck";

pub struct LoggingSettings<'a> {
    pub level: Option<&'a str>,
    pub directory: Option<&'a str>,
    pub retention_days: Option<u64>,
    /// The TUI owns the terminal, so only the file layer may write.
    pub suppress_stdout: bool,
}

pub fn setup_tracing_with_settings(settings: LoggingSettings<'_>) -> Option<PathBuf> {
    let log_dir = resolve_log_dir(settings.directory).ok()?;
    let retention_days = settings.retention_days.unwrap_or(RETENTION_DAYS);
    let _ = cleanup_old_logs(&log_dir, retention_days);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Dropping the guard would stop the writer thread.
    let _ = LOG_GUARD.set(guard);

    let stdout_layer = (!settings.suppress_stdout).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .compact()
            .boxed()
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .compact();

    let filter = build_filter(settings.level);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Some(log_dir)
}

fn default_directives(level: &str) -> String {
    format!("taskdeck={level},reqwest=warn,hyper=warn,hyper_util=warn,mio=warn")
}

fn build_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(default_directives(level)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives("info"))),
    }
}

fn resolve_log_dir(configured: Option<&str>) -> Result<PathBuf> {
    let dir = if let Some(path) = configured {
        expand_tilde(path)
    } else {
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .ok_or_else(|| anyhow!("Could not find data directory"))?;
        base.join("taskdeck").join("logs")
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> Result<usize> {
    let now = SystemTime::now();
    let max_age = Duration::from_secs(60 * 60 * 24 * retention_days);
    let mut removed = 0;
    for entry in std::fs::read_dir(log_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };
        if age > max_age && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/logs");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs"));
        }
        assert_eq!(expand_tilde("/var/log/x"), PathBuf::from("/var/log/x"));
    }

    #[test]
    fn configured_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("logs");
        let dir = resolve_log_dir(target.to_str()).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn cleanup_only_touches_own_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("taskdeck.2020-01-01"), "old").unwrap();
        std::fs::write(tmp.path().join("other.log"), "keep").unwrap();
        // Zero retention makes anything older than "now" eligible.
        std::thread::sleep(Duration::from_millis(20));
        let removed = cleanup_old_logs(tmp.path(), 0).unwrap();
        assert_eq!(removed, 1);
        assert!(tmp.path().join("other.log").exists());
    }

    #[test]
    fn explicit_level_builds_directives() {
        assert!(default_directives("debug").starts_with("taskdeck=debug"));
    }
}
