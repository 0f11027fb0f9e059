use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

const LOG_ENV: &str = "MARKSYNC_LOG";
const ROTATE_BYTES: u64 = 2 * 1024 * 1024;
const KEEP_LOGS: usize = 5;

/// Set up `<data_dir>/logs`, the panic hook and the tracing subscriber.
/// Verbosity comes from `MARKSYNC_LOG` (default `info`). Safe to call twice.
pub fn init(data_dir: &Path) {
    let log_dir = data_dir.join("logs");
    let _ = fs::create_dir_all(&log_dir);
    rotate_logs(&log_dir);

    if LOG_DIR.set(log_dir).is_ok() {
        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let msg = format_panic(info);
            append(&msg);
            eprintln!("{}", msg);
            prev_hook(info);
        }));
    }

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

/// Path of the active crash log, once `init` has run.
pub fn crash_log_path() -> Option<PathBuf> {
    LOG_DIR.get().map(|d| d.join("crash.log"))
}

pub fn read_crash_log() -> io::Result<String> {
    fs::read_to_string(require_log_path()?)
}

pub fn clear_crash_log() -> io::Result<()> {
    fs::write(require_log_path()?, "")
}

fn require_log_path() -> io::Result<PathBuf> {
    crash_log_path().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "log dir not initialized"))
}

fn append(msg: &str) {
    if let Some(path) = crash_log_path() {
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&path) {
            let _ = f.write_all(msg.as_bytes());
            let _ = f.write_all(b"\n");
        }
    }
}

fn format_panic(info: &std::panic::PanicHookInfo) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown".into());
    let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".into()
    };
    let bt = std::backtrace::Backtrace::force_capture();

    format!(
        "=== MARKSYNC CRASH ===\n\
         Timestamp: {}\n\
         Location:  {}\n\
         Message:   {}\n\
         Thread:    {}\n\
         \n\
         Backtrace:\n{}\n\
         === END CRASH ===\n",
        timestamp,
        location,
        payload,
        std::thread::current().name().unwrap_or("unnamed"),
        bt
    )
}

// crash.log -> crash.1.log -> ... -> crash.5.log, oldest dropped
fn rotate_logs(log_dir: &Path) {
    let crash_log = log_dir.join("crash.log");
    let Ok(meta) = fs::metadata(&crash_log) else {
        return;
    };
    if meta.len() <= ROTATE_BYTES {
        return;
    }
    for i in (1..KEEP_LOGS).rev() {
        let from = log_dir.join(format!("crash.{}.log", i));
        let to = log_dir.join(format!("crash.{}.log", i + 1));
        let _ = fs::rename(&from, &to);
    }
    let _ = fs::rename(&crash_log, log_dir.join("crash.1.log"));
}
