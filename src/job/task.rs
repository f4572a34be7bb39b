use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Running => "Running",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub source_file: String,
    pub output_file: String,
    pub status: TaskStatus,
    /// 0..=100
    pub progress: u8,
    pub created_at: DateTime<Local>,
    pub completed_at: Option<DateTime<Local>>,
    pub command: String,
    /// Failure summary, set only for failed jobs
    pub detail: Option<String>,
}

impl TaskSnapshot {
    pub fn progress_text(&self) -> String {
        format!("{}%", self.progress)
    }
}

/// Observable status of one job.
///
/// Clones share the same state. Only the controller mutates it; everyone else
/// reads a snapshot or subscribes to changes.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    inner: Arc<watch::Sender<TaskSnapshot>>,
}

impl TaskRecord {
    pub(crate) fn new(source_file: String, output_file: String, command: String) -> Self {
        let snapshot = TaskSnapshot {
            id: Uuid::new_v4(),
            source_file,
            output_file,
            status: TaskStatus::Pending,
            progress: 0,
            created_at: Local::now(),
            completed_at: None,
            command,
            detail: None,
        };
        let (sender, _) = watch::channel(snapshot);
        Self {
            inner: Arc::new(sender),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.borrow().id
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.inner.borrow().clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.borrow().status
    }

    pub fn progress(&self) -> u8 {
        self.inner.borrow().progress
    }

    /// Receiver that is notified on every status or progress change
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.inner.subscribe()
    }

    pub(crate) fn mark_running(&self) {
        self.inner.send_if_modified(|s| {
            if s.status != TaskStatus::Pending {
                return false;
            }
            s.status = TaskStatus::Running;
            true
        });
    }

    /// Raise progress; lower values and updates outside `Running` are ignored
    pub(crate) fn advance(&self, progress: u8) {
        let progress = progress.min(100);
        self.inner.send_if_modified(|s| {
            if s.status != TaskStatus::Running || progress <= s.progress {
                return false;
            }
            s.progress = progress;
            true
        });
    }

    /// Move to a terminal status. The first terminal transition wins.
    pub(crate) fn finish(&self, status: TaskStatus, detail: Option<String>) {
        debug_assert!(status.is_terminal());
        self.inner.send_if_modified(|s| {
            if s.status.is_terminal() {
                return false;
            }
            s.status = status;
            s.progress = if status == TaskStatus::Completed { 100 } else { 0 };
            s.completed_at = Some(Local::now());
            s.detail = if status == TaskStatus::Failed { detail } else { None };
            true
        });
    }
}
