//! External scraper runner.
//!
//! Spawns the configured program once per call, streams its stdout/stderr
//! into the log line by line, and waits for it under a timeout.

use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use async_trait::async_trait;
use filingwatch_core::config::ScraperConfig;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::FlagGuard;
use crate::gate::ScrapeStage;

/// Result of one scraper invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Another invocation was still running.
    Skipped,
    /// The process exited. Nonzero codes land here too; `-1` means killed by a signal.
    Completed { exit_code: i32, duration_ms: u64 },
    FailedToStart { error: String },
    /// Spawned, but its exit status could not be collected.
    WaitFailed { error: String, duration_ms: u64 },
    TimedOut { duration_ms: u64 },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { exit_code: 0, .. })
    }
}

/// Runs the scraper subprocess, at most one at a time per runner.
pub struct ScraperRunner {
    config: ScraperConfig,
    running: AtomicBool,
}

impl ScraperRunner {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn run(&self) -> RunOutcome {
        let Some(_guard) = FlagGuard::acquire(&self.running) else {
            tracing::info!("⏭️ Scraper already running, skipping");
            return RunOutcome::Skipped;
        };

        let started = Instant::now();
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.config.resolved_working_dir() {
            cmd.current_dir(dir);
        }

        tracing::info!(
            "🕷️ Starting scraper: {} {}",
            self.config.program,
            self.config.args.join(" ")
        );
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("❌ Scraper failed to start ({}): {e}", self.config.program);
                return RunOutcome::FailedToStart {
                    error: e.to_string(),
                };
            }
        };

        // Loggers are detached: grandchildren may hold the pipes open past exit.
        if let Some(out) = child.stdout.take() {
            spawn_line_logger("stdout", out);
        }
        if let Some(err) = child.stderr.take() {
            spawn_line_logger("stderr", err);
        }

        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let duration_ms = elapsed_ms(started);
                let exit_code = status.code().unwrap_or(-1);
                if status.success() {
                    tracing::info!("✅ Scraper finished in {duration_ms}ms");
                } else {
                    tracing::warn!("⚠️ Scraper exited with {status} after {duration_ms}ms");
                }
                RunOutcome::Completed {
                    exit_code,
                    duration_ms,
                }
            }
            Ok(Err(e)) => wait_failed(started, e),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("⚠️ Could not kill timed-out scraper: {e}");
                }
                let duration_ms = elapsed_ms(started);
                tracing::error!("⏰ Scraper timed out after {}s, killed", timeout.as_secs());
                RunOutcome::TimedOut { duration_ms }
            }
        }
    }
}

#[async_trait]
impl ScrapeStage for ScraperRunner {
    async fn run(&self) -> RunOutcome {
        ScraperRunner::run(self).await
    }
}

fn spawn_line_logger<R>(stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(reader).lines());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if stream == "stderr" => tracing::warn!("🕷️ [scraper:{stream}] {line}"),
                Ok(line) => tracing::info!("🕷️ [scraper:{stream}] {line}"),
                Err(e) => {
                    tracing::debug!("scraper {stream} closed: {e}");
                    break;
                }
            }
        }
    });
}

fn wait_failed(started: Instant, e: std::io::Error) -> RunOutcome {
    let duration_ms = elapsed_ms(started);
    tracing::error!("❌ Waiting on scraper failed after {duration_ms}ms: {e}");
    RunOutcome::WaitFailed {
        error: e.to_string(),
        duration_ms,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shell(script: &str, timeout_secs: u64) -> ScraperRunner {
        ScraperRunner::new(ScraperConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: None,
            timeout_secs,
        })
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_completed() {
        let runner = shell("echo scraping; echo oops >&2; exit 3", 10);
        match runner.run().await {
            RunOutcome::Completed { exit_code, .. } => assert_eq!(exit_code, 3),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_success() {
        let outcome = shell("exit 0", 10).run().await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let runner = ScraperRunner::new(ScraperConfig {
            program: "/definitely/not/a/scraper".into(),
            args: vec![],
            working_dir: None,
            timeout_secs: 5,
        });
        assert!(matches!(runner.run().await, RunOutcome::FailedToStart { .. }));
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let runner = Arc::new(shell("sleep 1", 10));
        let first = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(runner.is_running());
        assert_eq!(runner.run().await, RunOutcome::Skipped);
        assert!(matches!(first.await.unwrap(), RunOutcome::Completed { exit_code: 0, .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = shell("exec sleep 30", 1);
        let started = Instant::now();
        assert!(matches!(runner.run().await, RunOutcome::TimedOut { .. }));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(!runner.is_running());
    }

    #[test]
    fn test_wait_error_is_not_a_start_failure() {
        let outcome = wait_failed(Instant::now(), std::io::Error::other("ECHILD"));
        assert!(matches!(&outcome, RunOutcome::WaitFailed { error, .. } if error == "ECHILD"));
        assert!(!outcome.is_success());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "wait_failed");
        assert_eq!(json["error"], "ECHILD");
    }
}
