use std::path::Path;
use std::process::Command;

use depot_core::ServiceResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::absolute_path;

pub const INSTALL_SCRIPT_NAME: &str = "Install.ps1";
pub const UNINSTALL_SCRIPT_NAME: &str = "Uninstall.ps1";

/// Runs packaged scripts. Implementations report every fault as a failure
/// result instead of returning an error.
pub trait ScriptExecutor {
    fn execute_script(&self, path: &Path, args: &[String]) -> ServiceResult;
}

/// Interpreter invocation: `program args... <script> <script args...>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptHost {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self {
            program: "pwsh".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-File".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessScriptExecutor {
    host: ScriptHost,
}

impl ProcessScriptExecutor {
    pub fn new(host: ScriptHost) -> Self {
        Self { host }
    }
}

impl ScriptExecutor for ProcessScriptExecutor {
    fn execute_script(&self, path: &Path, args: &[String]) -> ServiceResult {
        let script = absolute_path(path);
        let mut command = Command::new(&self.host.program);
        command.args(&self.host.args).arg(&script).args(args);
        if let Some(folder) = script.parent() {
            command.current_dir(folder);
        }

        let context_message = format!("script {}", script.display());
        debug!(program = %self.host.program, script = %script.display(), ?args, "running script");
        run_command(&mut command, &context_message)
    }
}

fn run_command(command: &mut Command, context_message: &str) -> ServiceResult {
    let output = match command.output() {
        Ok(output) => output,
        Err(err) => {
            return ServiceResult::failure(format!(
                "{context_message}: command failed to start: {err}"
            ))
        }
    };
    if output.status.success() {
        return ServiceResult::success();
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    ServiceResult::failure(format!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
