use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Result, StudioError};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[cfg(windows)]
fn tree_kill_command(pid: u32) -> Option<Command> {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string(), "/T", "/F"]);
    cmd.creation_flags(CREATE_NO_WINDOW);
    Some(cmd)
}

/// Jobs are spawned as their own process group, so the group id is the pid
#[cfg(unix)]
fn tree_kill_command(pid: u32) -> Option<Command> {
    let mut cmd = Command::new("kill");
    cmd.args(["-s", "KILL", "--", &format!("-{}", pid)]);
    Some(cmd)
}

#[cfg(not(any(unix, windows)))]
fn tree_kill_command(_pid: u32) -> Option<Command> {
    None
}

/// Forcefully terminate a process and everything it spawned
pub async fn kill_tree(pid: u32) -> Result<()> {
    let Some(mut cmd) = tree_kill_command(pid) else {
        return Err(StudioError::Runtime("process tree termination is not supported on this platform".to_string()));
    };

    debug!("Terminating process tree of {}", pid);
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| StudioError::Runtime(format!("Failed to run tree kill for {}: {}", pid, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(StudioError::Runtime(format!("Tree kill for {} exited with {}", pid, status)))
    }
}

/// Kill only the direct child. A child that already exited is not an error.
pub fn kill_child(child: &mut Child) -> Result<()> {
    match child.try_wait() {
        Ok(Some(_)) => Ok(()),
        _ => child
            .start_kill()
            .map_err(|e| StudioError::Runtime(format!("Failed to kill child process: {}", e))),
    }
}
