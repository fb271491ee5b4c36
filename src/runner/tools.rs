use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::{ApiforgeError, Result};

/// 运行前必须具备的外部依赖
pub trait RequiredTool {
    fn name(&self) -> &str;

    /// 检查依赖是否存在且可用
    fn check_if_installed(&mut self) -> bool;
}

/// 依次检查所有依赖，任何一个缺失都是致命的环境错误
pub fn check_tools(tools: &mut [Box<dyn RequiredTool>]) -> Result<()> {
    for tool in tools.iter_mut() {
        debug!("Checking {}", tool.name());
        if !tool.check_if_installed() {
            return Err(ApiforgeError::Environment(format!(
                "{} is not available. Automatic installation is not implemented, install it manually",
                tool.name()
            )));
        }
    }
    Ok(())
}

/// 解释器：通过 PATH 解析并执行 `--version`
pub struct Interpreter {
    candidate: PathBuf,
}

impl Interpreter {
    pub fn new(candidate: impl Into<PathBuf>) -> Self {
        Self {
            candidate: candidate.into(),
        }
    }
}

impl RequiredTool for Interpreter {
    fn name(&self) -> &str {
        "Interpreter"
    }

    fn check_if_installed(&mut self) -> bool {
        let resolved = match which::which(&self.candidate) {
            Ok(path) => path,
            Err(e) => {
                debug!("{} is not installed: {}", self.candidate.display(), e);
                return false;
            }
        };

        let output = Command::new(&resolved)
            .arg("--version")
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) if output.status.success() => {
                debug!(
                    "{} output: {}{}",
                    resolved.display(),
                    String::from_utf8_lossy(&output.stdout).trim(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                true
            }
            Ok(output) => {
                debug!("{} --version exited with {}", resolved.display(), output.status);
                false
            }
            Err(e) => {
                debug!("Failed to run {}: {}", resolved.display(), e);
                false
            }
        }
    }
}

/// worker 入口脚本
pub struct WorkerScript {
    path: PathBuf,
}

impl WorkerScript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RequiredTool for WorkerScript {
    fn name(&self) -> &str {
        "Worker script"
    }

    fn check_if_installed(&mut self) -> bool {
        let exists = self.path.is_file();
        if !exists {
            debug!("Worker script not found at {}", self.path.display());
        }
        exists
    }
}
