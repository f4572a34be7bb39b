use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::kill;
use super::task::{TaskRecord, TaskStatus};
use crate::command::format;
use crate::command::CommandLine;
use crate::config::SettingsProvider;
use crate::error::{Result, StudioError};
use crate::parse::ProgressTracker;

/// How many matching diagnostic lines are kept for the failure detail
pub const DIAGNOSTIC_LINES: usize = 10;

/// Time allowed for buffered output to arrive after the process exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const ERROR_KEYWORDS: [&str; 3] = ["error", "failed", "invalid"];

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// What to run and how to label it
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    /// Full command line, tool token included
    pub command: String,
    /// Shown as the task's source file
    pub source_label: String,
    /// Enables percentage progress; otherwise progress is estimated
    pub expected_duration: Option<Duration>,
    /// Adopt a `Duration:` line from the output when no duration was given
    pub discover_duration: bool,
}

impl JobRequest {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source_label = source.into();
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.expected_duration = duration;
        self
    }

    /// Only for jobs whose input reports the real media duration; image
    /// sequence inputs do not
    pub fn discovering_duration(mut self) -> Self {
        self.discover_duration = true;
        self
    }

    fn tracker(&self) -> ProgressTracker {
        if self.discover_duration {
            ProgressTracker::discovering(self.expected_duration)
        } else {
            ProgressTracker::new(self.expected_duration)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The executable could not be started
    Spawn(String),
    /// Non-zero exit; `detail` holds the matching diagnostic lines
    Exit { code: Option<i32>, detail: String },
    /// Waiting on the process failed
    Wait(String),
}

impl JobFailure {
    pub fn detail(&self) -> String {
        match self {
            JobFailure::Spawn(message) | JobFailure::Wait(message) => message.clone(),
            JobFailure::Exit { detail, .. } => detail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(JobFailure),
    Cancelled,
}

impl JobOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            JobOutcome::Completed => TaskStatus::Completed,
            JobOutcome::Failed(_) => TaskStatus::Failed,
            JobOutcome::Cancelled => TaskStatus::Cancelled,
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            JobOutcome::Completed => Ok(()),
            JobOutcome::Cancelled => Err(StudioError::Cancelled),
            JobOutcome::Failed(JobFailure::Spawn(message)) => Err(StudioError::Spawn(message)),
            JobOutcome::Failed(failure) => Err(StudioError::Runtime(failure.detail())),
        }
    }
}

/// A started job: its observable record and the task driving it
pub struct Job {
    record: TaskRecord,
    driver: JoinHandle<JobOutcome>,
    inner: Arc<Inner>,
}

impl Job {
    pub fn record(&self) -> &TaskRecord {
        &self.record
    }

    pub fn id(&self) -> Uuid {
        self.record.id()
    }

    /// Wait for the terminal outcome
    pub async fn wait(self) -> JobOutcome {
        match self.driver.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Job driver for {} aborted: {}", self.record.id(), e);
                // The child went down with the driver (kill_on_drop)
                self.inner.claim(self.record.id());
                self.inner.set_idle();
                let failure = JobFailure::Wait(e.to_string());
                self.record.finish(TaskStatus::Failed, Some(failure.detail()));
                JobOutcome::Failed(failure)
            }
        }
    }
}

/// Ownership of the live process. Whoever takes it out of the controller
/// is responsible for tearing the process down.
struct JobHandle {
    id: Uuid,
    pid: Option<u32>,
    cancel_tx: oneshot::Sender<()>,
}

struct Inner {
    settings: Arc<dyn SettingsProvider>,
    state: Mutex<ControllerState>,
    live: Mutex<Option<JobHandle>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> MutexGuard<'_, Option<JobHandle>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_idle(&self) {
        *self.state() = ControllerState::Idle;
    }

    /// Take the handle only if it still belongs to job `id`
    fn claim(&self, id: Uuid) -> Option<JobHandle> {
        let mut live = self.live();
        if live.as_ref().is_some_and(|h| h.id == id) {
            live.take()
        } else {
            None
        }
    }
}

/// Runs one job at a time and resolves it to a terminal status.
///
/// Clones drive the same controller.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                state: Mutex::new(ControllerState::Idle),
                live: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state()
    }

    /// Spawn the command and start streaming its output into a new task record.
    ///
    /// Empty commands and a second concurrent start are refused. A process that
    /// cannot be spawned still yields a job, already failed.
    pub fn start(&self, request: JobRequest) -> Result<Job> {
        let command = CommandLine::parse(&request.command);
        if command.is_empty() {
            return Err(StudioError::EmptyCommand);
        }

        {
            let mut state = self.inner.state();
            if *state == ControllerState::Running {
                warn!("Refusing to start a job while another is running");
                return Err(StudioError::AlreadyRunning);
            }
            *state = ControllerState::Running;
        }

        let output_file = format::extract_output_path(&request.command).unwrap_or_default();
        let record = TaskRecord::new(request.source_label.clone(), output_file, request.command.clone());
        let tool = self.inner.settings.tool_path();
        let args = command.program_args(&tool);

        info!("Starting job {}: {}", record.id(), request.command);
        debug!("Spawning {} with {} arguments", tool, args.len());

        let mut cmd = Command::new(&tool);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let failure = JobFailure::Spawn(format!("{}: {}", tool, e));
                error!("Job {} failed to start: {}", record.id(), failure.detail());
                self.inner.set_idle();
                record.finish(TaskStatus::Failed, Some(failure.detail()));
                let driver = tokio::spawn(async move { JobOutcome::Failed(failure) });
                return Ok(Job {
                    record,
                    driver,
                    inner: self.inner.clone(),
                });
            }
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, line_tx));
        }

        *self.inner.live() = Some(JobHandle {
            id: record.id(),
            pid: child.id(),
            cancel_tx,
        });
        record.mark_running();

        let driver = tokio::spawn(drive(
            self.inner.clone(),
            record.clone(),
            child,
            line_rx,
            cancel_rx,
            request.tracker(),
        ));

        Ok(Job {
            record,
            driver,
            inner: self.inner.clone(),
        })
    }

    /// Start and wait for the outcome
    pub async fn run(&self, request: JobRequest) -> Result<(TaskRecord, JobOutcome)> {
        let job = self.start(request)?;
        let record = job.record().clone();
        let outcome = job.wait().await;
        Ok((record, outcome))
    }

    /// Cancel the running job, if any. Returns whether a job was cancelled.
    ///
    /// Safe to call from any state and any number of times; only the caller
    /// that takes the live handle acts on it.
    pub async fn cancel(&self) -> bool {
        let Some(handle) = self.inner.live().take() else {
            debug!("Cancel requested with no live job");
            return false;
        };

        info!("Cancelling job {}", handle.id);
        if let Some(pid) = handle.pid {
            if let Err(e) = kill::kill_tree(pid).await {
                warn!("Process tree kill failed, falling back to the direct child: {}", e);
            }
        }
        let _ = handle.cancel_tx.send(());
        true
    }
}

/// Output lines seen while the job runs
struct LineSink {
    record: TaskRecord,
    tracker: ProgressTracker,
    diagnostics: VecDeque<String>,
}

impl LineSink {
    fn feed(&mut self, line: &str) {
        if let Some(progress) = self.tracker.observe(line) {
            self.record.advance(progress);
        }
        if is_diagnostic(line) {
            if self.diagnostics.len() == DIAGNOSTIC_LINES {
                self.diagnostics.pop_front();
            }
            self.diagnostics.push_back(line.trim().to_string());
        }
    }

    fn failure_detail(&self, status: &ExitStatus) -> String {
        if self.diagnostics.is_empty() {
            match status.code() {
                Some(code) => format!("exit code {}", code),
                None => format!("terminated ({})", status),
            }
        } else {
            self.diagnostics.iter().cloned().collect::<Vec<_>>().join("\n")
        }
    }
}

fn is_diagnostic(line: &str) -> bool {
    let lower = line.to_lowercase();
    ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

async fn drive(
    inner: Arc<Inner>,
    record: TaskRecord,
    mut child: Child,
    mut lines: mpsc::UnboundedReceiver<String>,
    mut cancel_rx: oneshot::Receiver<()>,
    tracker: ProgressTracker,
) -> JobOutcome {
    let id = record.id();
    let mut sink = LineSink {
        record: record.clone(),
        tracker,
        diagnostics: VecDeque::new(),
    };

    let exited = loop {
        tokio::select! {
            _ = &mut cancel_rx => break None,
            Some(line) = lines.recv() => sink.feed(&line),
            status = child.wait() => break Some(status),
        }
    };

    // Claim the handle as soon as the exit is seen so a late cancel finds
    // nothing to kill. A missing handle means a cancel claimed it first.
    let (cancelled, status) = match exited {
        Some(status) => (inner.claim(id).is_none(), status),
        None => {
            if let Err(e) = kill::kill_child(&mut child) {
                warn!("{}", e);
            }
            (true, child.wait().await)
        }
    };

    if !cancelled {
        let drain = async {
            while let Some(line) = lines.recv().await {
                sink.feed(&line);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            debug!("Output of job {} still open after exit", id);
        }
    }

    let outcome = match status {
        _ if cancelled => JobOutcome::Cancelled,
        Ok(status) if status.success() => JobOutcome::Completed,
        Ok(status) => JobOutcome::Failed(JobFailure::Exit {
            code: status.code(),
            detail: sink.failure_detail(&status),
        }),
        Err(e) => JobOutcome::Failed(JobFailure::Wait(e.to_string())),
    };

    inner.set_idle();
    let detail = match &outcome {
        JobOutcome::Failed(failure) => Some(failure.detail()),
        _ => None,
    };
    record.finish(outcome.status(), detail);

    match &outcome {
        JobOutcome::Completed => info!("Job {} completed", id),
        JobOutcome::Cancelled => info!("Job {} cancelled", id),
        JobOutcome::Failed(failure) => warn!("Job {} failed: {}", id, failure.detail()),
    }
    outcome
}

/// Forward each line of `reader` to `tx`. Both `\r` and `\n` end a line since
/// live statistics are rewritten in place with carriage returns.
async fn pump_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let buf = match reader.fill_buf().await {
            Ok(buf) if !buf.is_empty() => buf,
            Ok(_) => break,
            Err(e) => {
                debug!("Output stream closed: {}", e);
                break;
            }
        };

        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\r' || byte == b'\n' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).to_string();
                    pending.clear();
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).to_string());
    }
}
