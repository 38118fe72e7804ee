//! Fire-and-forget external actions triggered by input edges.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

/// Runs the action attached to a call entry.
///
/// Implementations must not block the caller; the outcome only matters
/// for logging.
pub trait ActionInvoker: Send + Sync + 'static {
    fn invoke(&self, action: &str);
}

/// Spawns the action as a child process.
///
/// The action is a command line split on whitespace; the first word is the
/// program, resolved through `PATH` or relative to `working_dir`.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    working_dir: Option<PathBuf>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

impl ActionInvoker for ProcessInvoker {
    fn invoke(&self, action: &str) {
        let mut words = action.split_whitespace();
        let Some(program) = words.next() else {
            warn!("Ignoring empty action");
            return;
        };

        let mut command = Command::new(program);
        command
            .args(words)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(action, "Failed to launch action: {}", e);
                return;
            }
        };

        info!(action, pid = ?child.id(), "Action launched");
        let action = action.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!(action = %action, "Action finished"),
                Ok(status) => warn!(action = %action, %status, "Action exited with failure"),
                Err(e) => warn!(action = %action, "Failed to wait for action: {}", e),
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every invocation instead of running anything.
    #[derive(Default)]
    pub(crate) struct RecordingInvoker {
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl RecordingInvoker {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ActionInvoker for RecordingInvoker {
        fn invoke(&self, action: &str) {
            self.calls.lock().unwrap().push(action.to_string());
        }
    }

    #[tokio::test]
    async fn test_process_invoker_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("fired");
        let invoker = ProcessInvoker::with_working_dir(dir.path());

        invoker.invoke(&format!("touch {}", marker.display()));

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_process_invoker_survives_missing_program() {
        let invoker = ProcessInvoker::new();
        invoker.invoke("definitely-not-a-real-program-4710");
        invoker.invoke("   ");
    }
}
