//! Streaming subprocess runner.
//!
//! [`run_process`] spawns an [`Invocation`] directly (no shell), reads
//! both output streams line by line in background tasks, and feeds each
//! line either through the classifier onto the job's event stream or into
//! a capture buffer. It returns once the child has exited or been
//! terminated through its cancellation token.

use std::process::Stdio;
use std::time::Duration;

use mediarelay_core::classifier::{Classification, ClassifierRules, StreamOrigin};
use mediarelay_core::types::Invocation;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::emitter::JobEmitter;

/// Default maximum bytes of stdout kept in [`StdoutMode::Capture`] (10 MiB).
pub const DEFAULT_CAPTURE_LIMIT: usize = 10 * 1024 * 1024;

/// How long a terminated process group gets to exit after SIGTERM
/// before it is sent SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Lines buffered between the stream readers and the job loop.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// What to do with standard output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StdoutMode {
    /// Classify and publish, like stderr.
    Classify,
    /// Keep verbatim for the caller to decode. Stderr is still classified.
    Capture,
}

/// How the subprocess ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProcessStatus {
    /// Exited on its own. Signal deaths report `-1`.
    Exited(i32),
    /// Killed because the job was cancelled.
    Terminated,
    /// Could not be started. Carries the diagnostic message.
    SpawnFailed(String),
}

#[derive(Debug)]
pub(crate) struct ProcessReport {
    pub status: ProcessStatus,
    /// Stdout lines, only populated in [`StdoutMode::Capture`].
    pub captured: Vec<String>,
    /// Set when captured output exceeded the capture limit. `captured`
    /// is then incomplete and must not be decoded.
    pub overflowed: bool,
}

impl ProcessReport {
    fn without_output(status: ProcessStatus) -> Self {
        Self {
            status,
            captured: Vec::new(),
            overflowed: false,
        }
    }
}

/// Knobs shared by every subprocess of a job.
pub(crate) struct ProcessContext<'a> {
    pub rules: &'a ClassifierRules,
    pub cancel: &'a CancellationToken,
    /// How long to keep reading buffered output after the child exits.
    pub drain_timeout: Duration,
    /// Captured stdout beyond this many bytes marks the report overflowed.
    pub capture_limit: usize,
}

/// Routes output lines to the emitter or the capture buffer.
struct LineSink<'a> {
    mode: StdoutMode,
    rules: &'a ClassifierRules,
    emitter: &'a mut JobEmitter,
    captured: Vec<String>,
    captured_bytes: usize,
    capture_limit: usize,
    overflowed: bool,
}

impl LineSink<'_> {
    fn accept(&mut self, origin: StreamOrigin, line: String) {
        if origin == StreamOrigin::Stdout && self.mode == StdoutMode::Capture {
            self.capture(line);
            return;
        }
        if let Classification::Emit { severity, message } = self.rules.classify(&line, origin) {
            self.emitter.emit(severity, message);
        }
    }

    fn capture(&mut self, line: String) {
        if self.overflowed || self.captured_bytes + line.len() > self.capture_limit {
            self.overflowed = true;
            return;
        }
        self.captured_bytes += line.len();
        self.captured.push(line);
    }
}

/// Run `invocation` to completion or cancellation.
///
/// Never fails: spawn errors are reported as [`ProcessStatus::SpawnFailed`].
/// If the token is already cancelled the process is not spawned at all.
pub(crate) async fn run_process(
    invocation: &Invocation,
    mode: StdoutMode,
    ctx: &ProcessContext<'_>,
    emitter: &mut JobEmitter,
) -> ProcessReport {
    if ctx.cancel.is_cancelled() {
        return ProcessReport::without_output(ProcessStatus::Terminated);
    }

    let mut cmd = Command::new(&invocation.program);
    // `kill_on_drop(true)` guarantees the child dies with its handle.
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so termination also reaches whatever the tool
    // spawns itself (ffmpeg merges, shell pipelines).
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %invocation.program, error = %e, "Failed to spawn process");
            return ProcessReport::without_output(ProcessStatus::SpawnFailed(spawn_diagnostic(
                &invocation.program,
                &e,
            )));
        }
    };

    tracing::debug!(pid = child.id(), command = %invocation, "Process spawned");

    // Read stdout/stderr in spawned tasks so `child.wait()` can still
    // borrow the child.
    let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(read_lines(stdout, StreamOrigin::Stdout, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(read_lines(stderr, StreamOrigin::Stderr, tx.clone())));
    }
    drop(tx);

    let mut sink = LineSink {
        mode,
        rules: ctx.rules,
        emitter,
        captured: Vec::new(),
        captured_bytes: 0,
        capture_limit: ctx.capture_limit,
        overflowed: false,
    };

    let status = loop {
        tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => {
                terminate(&mut child, TERMINATE_GRACE).await;
                break ProcessStatus::Terminated;
            }
            Some((origin, line)) = rx.recv() => sink.accept(origin, line),
            result = child.wait() => {
                break match result {
                    Ok(status) => ProcessStatus::Exited(status.code().unwrap_or(-1)),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to wait for process");
                        ProcessStatus::Exited(-1)
                    }
                };
            }
        }
    };

    if let ProcessStatus::Exited(_) = status {
        // The child is gone but its pipes may still hold buffered lines.
        let drain = async {
            while let Some((origin, line)) = rx.recv().await {
                sink.accept(origin, line);
            }
        };
        tokio::select! {
            _ = drain => {}
            _ = tokio::time::sleep(ctx.drain_timeout) => {
                tracing::warn!(command = %invocation, "Output still open after exit, giving up");
            }
            _ = ctx.cancel.cancelled() => {}
        }
    }

    for reader in readers {
        reader.abort();
    }

    if sink.overflowed {
        tracing::warn!(command = %invocation, limit = ctx.capture_limit, "Captured output truncated");
    }

    ProcessReport {
        status,
        captured: sink.captured,
        overflowed: sink.overflowed,
    }
}

/// Stop the child and every process in its group.
///
/// SIGTERM goes to the whole group first; whatever is left after `grace`
/// gets SIGKILL. The group is swept once more after the leader is reaped
/// because descendants can outlive it.
#[cfg(unix)]
async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        // Already reaped.
        return;
    };

    signal_group(pid, libc::SIGTERM);
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        tracing::debug!(pid, "Process group ignored SIGTERM, killing");
    }
    signal_group(pid, libc::SIGKILL);
    let _ = child.wait().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _grace: Duration) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Process already gone at termination");
    }
    let _ = child.wait().await;
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // Safety: killpg only delivers a signal. A group that no longer
    // exists yields ESRCH, which is ignored.
    let ret = unsafe { libc::killpg(pgid, signal) };
    if ret != 0 {
        tracing::trace!(pgid, signal, "killpg found no process group");
    }
}

fn spawn_diagnostic(program: &str, err: &std::io::Error) -> String {
    if err.kind() == std::io::ErrorKind::NotFound {
        format!("{program}: command not found")
    } else {
        format!("Failed to start {program}: {err}")
    }
}

/// Forward newline-delimited output to the job loop. Invalid UTF-8 is
/// replaced rather than dropped.
async fn read_lines<R: AsyncRead + Unpin>(
    reader: R,
    origin: StreamOrigin,
    tx: mpsc::Sender<(StreamOrigin, String)>,
) {
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes).into_owned();
                if tx.send((origin, line)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(?origin, error = %e, "Output stream read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use mediarelay_core::types::Severity;
    use mediarelay_events::EventBus;

    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    async fn run(
        invocation: Invocation,
        mode: StdoutMode,
        cancel: &CancellationToken,
    ) -> (ProcessReport, Vec<(Severity, String)>) {
        run_with_limit(invocation, mode, cancel, DEFAULT_CAPTURE_LIMIT).await
    }

    async fn run_with_limit(
        invocation: Invocation,
        mode: StdoutMode,
        cancel: &CancellationToken,
        capture_limit: usize,
    ) -> (ProcessReport, Vec<(Severity, String)>) {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let mut emitter = JobEmitter::new("p".into(), Arc::clone(&bus));
        let rules = ClassifierRules::default();
        let ctx = ProcessContext {
            rules: &rules,
            cancel,
            drain_timeout: Duration::from_secs(2),
            capture_limit,
        };

        let report = run_process(&invocation, mode, &ctx, &mut emitter).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((event.severity, event.message));
        }
        (report, events)
    }

    #[tokio::test]
    async fn classifies_both_streams() {
        let (report, events) = run(
            sh("echo hello; echo 'ERROR: boom' >&2; echo '[download]  50.0%'"),
            StdoutMode::Classify,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.status, ProcessStatus::Exited(0));
        assert!(events.contains(&(Severity::Info, "hello".into())));
        assert!(events.contains(&(Severity::Error, "ERROR: boom".into())));
        assert!(events.contains(&(Severity::Progress, "[download]  50.0%".into())));
    }

    #[tokio::test]
    async fn capture_mode_keeps_stdout_verbatim() {
        let (report, events) = run(
            sh("echo '{\"a\":1}'; echo note >&2"),
            StdoutMode::Capture,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.captured, vec![r#"{"a":1}"#.to_string()]);
        assert!(!report.overflowed);
        assert_eq!(events, vec![(Severity::Info, "note".to_string())]);
    }

    #[tokio::test]
    async fn capture_past_the_limit_is_flagged() {
        let (report, _) = run_with_limit(
            sh("echo aaaa; echo bbbb; echo cccc"),
            StdoutMode::Capture,
            &CancellationToken::new(),
            9,
        )
        .await;

        assert_eq!(report.status, ProcessStatus::Exited(0));
        assert!(report.overflowed);
        assert_eq!(report.captured, vec!["aaaa".to_string(), "bbbb".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_reaches_the_whole_process_group() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let pidfile = scratch.path().join("grandchild.pid");
        let script = format!("sleep 300 & echo $! > '{}'; wait", pidfile.display());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let watched = pidfile.clone();
        tokio::spawn(async move {
            while !watched.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.cancel();
        });

        let (report, _) = run(sh(&script), StdoutMode::Classify, &cancel).await;
        assert_eq!(report.status, ProcessStatus::Terminated);

        let pid: libc::pid_t = std::fs::read_to_string(&pidfile)
            .expect("pidfile")
            .trim()
            .parse()
            .expect("pid");
        assert!(
            wait_until_gone(pid).await,
            "grandchild {pid} survived termination"
        );
    }

    /// Poll until `pid` is gone or a zombie. An orphaned zombie may never
    /// be reaped inside a container without a real init.
    #[cfg(unix)]
    async fn wait_until_gone(pid: libc::pid_t) -> bool {
        for _ in 0..100 {
            // Safety: signal 0 only checks for existence.
            if unsafe { libc::kill(pid, 0) } != 0 || is_zombie(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(unix)]
    fn is_zombie(pid: libc::pid_t) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                let (_, rest) = stat.rsplit_once(')')?;
                rest.trim_start().chars().next()
            })
            .is_some_and(|state| state == 'Z')
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let (report, _) = run(sh("exit 7"), StdoutMode::Classify, &CancellationToken::new()).await;
        assert_eq!(report.status, ProcessStatus::Exited(7));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let invocation = Invocation::new("definitely-not-a-real-binary-42", Vec::new());
        let (report, events) =
            run(invocation, StdoutMode::Classify, &CancellationToken::new()).await;

        assert_matches!(
            report.status,
            ProcessStatus::SpawnFailed(ref msg)
                if msg == "definitely-not-a-real-binary-42: command not found"
        );
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let (report, _) = run(sh("sleep 30"), StdoutMode::Classify, &cancel).await;

        assert_eq!(report.status, ProcessStatus::Terminated);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (report, events) = run(sh("echo never"), StdoutMode::Classify, &cancel).await;

        assert_eq!(report.status, ProcessStatus::Terminated);
        assert!(events.is_empty());
    }
}
