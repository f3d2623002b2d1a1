use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use warden_core::model::{ProcessState, SupervisorInfo};

/// How to launch the game server.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

/// Rules applied to each server console line.
///
/// The vanilla server announces readiness with `Done (…)!` and answers the
/// `list` command with `There are N of a max M players online`.
pub struct OutputRules {
    ready: Regex,
    player_list: Regex,
}

impl OutputRules {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ready: Regex::new(r"Done \(.+\)!")?,
            player_list: Regex::new(r"There are (\d+) of a max \d+ players online")?,
        })
    }

    pub fn is_ready(&self, line: &str) -> bool {
        self.ready.is_match(line)
    }

    pub fn parse_player_count(&self, line: &str) -> Option<u32> {
        let caps = self.player_list.captures(line)?;
        caps.get(1)?.as_str().parse().ok()
    }
}

/// The wrapped game-server child process.
///
/// Holds the state the daemon polls: the console-derived sub-state and the
/// last sampled occupancy.
#[derive(Clone)]
pub struct GameProcess {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<ProcessState>,
    players: AtomicU32,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    // Flips to true once a *requested* stop has run to completion.
    done: watch::Sender<bool>,
}

impl GameProcess {
    /// Spawns the server and the tasks that watch it.
    pub fn spawn(cmd: &ServerCommand, sample_interval: Duration) -> Result<Self> {
        let rules = OutputRules::new()?;

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .current_dir(&cmd.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", cmd.program))?;

        let stdin = child.stdin.take().context("child stdin unavailable")?;
        let stdout = child.stdout.take().context("child stdout unavailable")?;
        let stderr = child.stderr.take().context("child stderr unavailable")?;

        let (done, _) = watch::channel(false);
        let proc = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ProcessState::Starting),
                players: AtomicU32::new(0),
                stdin: tokio::sync::Mutex::new(Some(stdin)),
                done,
            }),
        };

        proc.spawn_stdout_reader(stdout, rules);
        proc.spawn_stderr_reader(stderr);
        proc.spawn_sampler(sample_interval);

        // Reaper: the supervisor only follows the server down when the
        // stop was asked for; an unexpected exit keeps us serving the
        // last known state.
        let inner = proc.inner.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let requested = inner.current_state() == ProcessState::Stopping;
                    if requested {
                        info!("server exited ({status}); supervisor winding down");
                        let _ = inner.done.send(true);
                    } else {
                        warn!("server exited unexpectedly ({status})");
                    }
                }
                Err(e) => warn!("waiting on server process failed: {e:?}"),
            }
        });

        Ok(proc)
    }

    /// Snapshot served on `GET /`.
    pub fn info(&self) -> SupervisorInfo {
        SupervisorInfo {
            count: self.inner.players.load(Ordering::Relaxed),
            state: self.inner.current_state(),
        }
    }

    /// Asks the server to wind down gracefully. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.lock_state();
            if *state == ProcessState::Stopping {
                return;
            }
            *state = ProcessState::Stopping;
        }
        info!("stop requested; sending stop command to server");

        let mut guard = self.inner.stdin.lock().await;
        if let Some(stdin) = guard.as_mut() {
            if let Err(e) = stdin.write_all(b"stop\n").await {
                warn!("writing stop command failed: {e:?}");
            }
            let _ = stdin.flush().await;
        }
    }

    /// Resolves once a requested stop has completed.
    pub fn stopped(&self) -> watch::Receiver<bool> {
        self.inner.done.subscribe()
    }

    fn spawn_stdout_reader(&self, stdout: ChildStdout, rules: OutputRules) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(count) = rules.parse_player_count(&line) {
                    // Sampler noise, not server log output.
                    inner.players.store(count, Ordering::Relaxed);
                    continue;
                }
                if rules.is_ready(&line) {
                    let mut state = inner.lock_state();
                    if *state == ProcessState::Starting {
                        *state = ProcessState::Running;
                    }
                    drop(state);
                    info!("server ready");
                }
                info!("server: {line}");
            }
        });
    }

    fn spawn_stderr_reader(&self, stderr: ChildStderr) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("server: {line}");
            }
        });
    }

    /// Periodically asks the running server for its player list; the
    /// stdout reader picks the answer up.
    fn spawn_sampler(&self, every: Duration) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut tick = interval(every);
            loop {
                tick.tick().await;
                if inner.current_state() != ProcessState::Running {
                    continue;
                }
                let mut guard = inner.stdin.lock().await;
                if let Some(stdin) = guard.as_mut() {
                    if let Err(e) = stdin.write_all(b"list\n").await {
                        warn!("player sample failed: {e:?}");
                    }
                }
            }
        });
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_state(&self) -> ProcessState {
        *self.lock_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> OutputRules {
        OutputRules::new().unwrap()
    }

    #[test]
    fn recognizes_the_ready_line() {
        let line = r#"[12:34:56] [Server thread/INFO]: Done (9.282s)! For help, type "help""#;
        assert!(rules().is_ready(line));
    }

    #[test]
    fn ordinary_log_lines_are_not_ready() {
        assert!(!rules().is_ready("[12:34:50] [Server thread/INFO]: Preparing spawn area: 85%"));
        assert!(!rules().is_ready("Done loading chunk cache"));
    }

    #[test]
    fn parses_the_player_count_from_a_list_response() {
        let line = "[12:40:01] [Server thread/INFO]: There are 3 of a max 20 players online: a, b, c";
        assert_eq!(rules().parse_player_count(line), Some(3));
    }

    #[test]
    fn parses_an_empty_player_list() {
        let line = "There are 0 of a max 20 players online:";
        assert_eq!(rules().parse_player_count(line), Some(0));
    }

    #[test]
    fn chat_lines_do_not_parse_as_counts() {
        let line = "<alice> There are dragons here";
        assert_eq!(rules().parse_player_count(line), None);
    }
}
