//! Non-interactive coding-agent runner.
//!
//! Spawns the agent CLI (`claude -p` by default), feeds the prompt on stdin,
//! and drains stdout/stderr on two reader threads while the caller polls for
//! exit against a wall-clock timeout.

use crate::redact::redact_secrets;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const BIN_NAMES: &[&str] = &["claude", "claude-code", "anthropic"];

#[derive(Error, Debug)]
pub enum RunError {
    #[error("coding agent CLI not found: {0}. Install it or set claude.bin")]
    NotFound(String),

    #[error("coding agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub bin: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub add_dirs: Vec<PathBuf>,
    /// Pass `-p` and send the prompt on stdin.
    pub print_mode: bool,
    pub pass_prompt_as_arg: bool,
    pub skip_permissions: bool,
    pub timeout: Duration,
    /// Streaming runs tee `[stdout]`/`[stderr]` lines here.
    pub log_path: Option<PathBuf>,
    /// Streaming runs echo lines to stderr.
    pub echo: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            bin: None,
            cwd: None,
            extra_args: Vec::new(),
            add_dirs: Vec::new(),
            print_mode: true,
            pass_prompt_as_arg: false,
            skip_permissions: false,
            timeout: DEFAULT_TIMEOUT,
            log_path: None,
            echo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub ok: bool,
    pub returncode: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Known binary names found on PATH, then the usual per-user install
/// locations.
pub fn discover_bins() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = BIN_NAMES.iter().filter_map(|n| which(n)).collect();
    if let Some(home) = dirs::home_dir() {
        found.extend(
            [
                home.join(".local").join("bin").join("claude"),
                home.join(".claude").join("bin").join("claude"),
            ]
            .into_iter()
            .filter(|p| p.is_file()),
        );
    }
    found
}

/// First discovered binary, or plain `claude` to let spawning report it.
pub fn default_bin() -> PathBuf {
    discover_bins()
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from("claude"))
}

fn which(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

fn build_argv(prompt: &str, opts: &RunOptions) -> Vec<String> {
    let bin = opts.bin.clone().unwrap_or_else(default_bin);
    let mut argv = vec![bin.to_string_lossy().into_owned()];
    if opts.print_mode {
        argv.push("-p".into());
    }
    if opts.skip_permissions {
        argv.push("--dangerously-skip-permissions".into());
    }
    for dir in &opts.add_dirs {
        argv.push("--add-dir".into());
        argv.push(dir.to_string_lossy().into_owned());
    }
    argv.extend(opts.extra_args.iter().cloned());
    if opts.pass_prompt_as_arg {
        argv.push(prompt.to_string());
    }
    argv
}

fn spawn(argv: &[String], opts: &RunOptions) -> Result<Child, RunError> {
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdin(if opts.print_mode {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Allow nesting inside an agent session.
        .env_remove("CLAUDE_CODE")
        .env_remove("CLAUDECODE");
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RunError::NotFound(argv[0].clone()),
        _ => RunError::Io(e),
    })
}

type Tee = Option<Arc<Mutex<File>>>;

fn drain<R: Read + Send + 'static>(
    stream: R,
    label: &'static str,
    tee: Tee,
    echo: bool,
) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut captured = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&buf);
            captured.push_str(&line);
            if tee.is_none() && !echo {
                continue;
            }
            let shown = format!("[{label}] {}", redact_secrets(line.trim_end()));
            if echo {
                eprintln!("{shown}");
            }
            if let Some(file) = &tee {
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(f, "{shown}");
                }
            }
        }
        captured
    })
}

fn feed_prompt(child: &mut Child, prompt: &str) -> Result<(), RunError> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    let mut payload = prompt.to_string();
    if !payload.ends_with('\n') {
        payload.push('\n');
    }
    match stdin.write_all(payload.as_bytes()) {
        // The agent may exit without reading its input.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}

fn execute(prompt: &str, opts: &RunOptions, tee: Tee, echo: bool) -> Result<RunOutcome, RunError> {
    let argv = build_argv(prompt, opts);
    tracing::debug!(cmd = ?argv.first(), "spawning coding agent");
    let mut child = spawn(&argv, opts)?;

    let stdout = child.stdout.take().map(|s| drain(s, "stdout", tee.clone(), echo));
    let stderr = child.stderr.take().map(|s| drain(s, "stderr", tee, echo));
    feed_prompt(&mut child, prompt)?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > opts.timeout {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(timeout = ?opts.timeout, "coding agent killed after timeout");
            return Err(RunError::Timeout(opts.timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let join = |h: Option<JoinHandle<String>>| h.and_then(|h| h.join().ok()).unwrap_or_default();
    let outcome = RunOutcome {
        ok: status.success(),
        returncode: status.code(),
        stdout: join(stdout),
        stderr: join(stderr),
        cmd: argv,
        cwd: opts.cwd.clone(),
    };
    tracing::info!(ok = outcome.ok, returncode = ?outcome.returncode, "coding agent finished");
    Ok(outcome)
}

/// Run the agent to completion and capture its output.
pub fn run(prompt: &str, opts: &RunOptions) -> Result<RunOutcome, RunError> {
    execute(prompt, opts, None, false)
}

/// Like [`run`], but tees each output line to `opts.log_path` and, with
/// `opts.echo`, to stderr as it arrives.
pub fn run_stream(prompt: &str, opts: &RunOptions) -> Result<RunOutcome, RunError> {
    let tee = match &opts.log_path {
        Some(path) => Some(Arc::new(Mutex::new(open_log(path)?))),
        None => None,
    };
    execute(prompt, opts, tee, opts.echo)
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}
