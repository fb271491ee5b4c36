use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::generator::compile;
use crate::runner::aggregator::Aggregator;
use crate::runner::invocation::RunnerInvocation;
use crate::runner::process::{Clock, Launcher, SystemClock, SystemLauncher, WorkerProcess};
use crate::runner::reader::{SamplesReader, SharedReader};
use crate::runner::tools::{Interpreter, RequiredTool, WorkerScript, check_tools};
use crate::runner::types::{RunMode, SampleRecord};
use crate::scenario::{Scenario, ScenarioSource};
use crate::{ApiforgeError, Result};

/// 运行状态
///
/// `NotStarted → Running → {Succeeded, Failed} → ShutDown`，
/// 取消或超时时 `Running → ShutDown`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    ShutDown,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::NotStarted => "not-started",
            RunnerState::Running => "running",
            RunnerState::Succeeded => "succeeded",
            RunnerState::Failed => "failed",
            RunnerState::ShutDown => "shut-down",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行上限
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSettings {
    /// 迭代次数（`-i`）
    pub iterations: Option<u64>,

    /// 持续时间（`-d`）
    pub hold: Option<Duration>,

    /// 整个运行的超时时间，由监管方强制执行
    pub max_duration: Option<Duration>,
}

/// 一次运行分配的文件
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub report: PathBuf,
}

impl ArtifactPaths {
    fn allocate(dir: &Path, id: &str) -> Self {
        Self {
            stdout: dir.join(format!("nose-{}.out", id)),
            stderr: dir.join(format!("nose-{}.err", id)),
            report: dir.join(format!("report-{}.ldjson", id)),
        }
    }
}

/// worker 进程的监管者
pub struct TestRunner {
    label: String,
    scenario: Scenario,
    settings: RunnerSettings,
    load: LoadSettings,
    launcher: Box<dyn Launcher>,
    clock: Box<dyn Clock>,
    required_tools: Vec<Box<dyn RequiredTool>>,
    state: RunnerState,
    invocation: Option<RunnerInvocation>,
    paths: Option<ArtifactPaths>,
    process: Option<Box<dyn WorkerProcess>>,
    stdout: Option<File>,
    stderr: Option<File>,
    reader: Option<SharedReader>,
    failure: Option<ApiforgeError>,
    started_at: Option<Instant>,
}

impl TestRunner {
    pub fn new(label: impl Into<String>, scenario: Scenario, settings: RunnerSettings) -> Self {
        let required_tools: Vec<Box<dyn RequiredTool>> = vec![
            Box::new(Interpreter::new(&settings.interpreter)),
            Box::new(WorkerScript::new(&settings.worker_script)),
        ];

        Self {
            label: label.into(),
            scenario,
            settings,
            load: LoadSettings::default(),
            launcher: Box::new(SystemLauncher::new()),
            clock: Box::new(SystemClock),
            required_tools,
            state: RunnerState::NotStarted,
            invocation: None,
            paths: None,
            process: None,
            stdout: None,
            stderr: None,
            reader: None,
            failure: None,
            started_at: None,
        }
    }

    pub fn with_load(mut self, load: LoadSettings) -> Self {
        self.load = load;
        self
    }

    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 替换运行前检查的依赖列表
    pub fn with_required_tools(mut self, tools: Vec<Box<dyn RequiredTool>>) -> Self {
        self.required_tools = tools;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn mode(&self) -> RunMode {
        if self.settings.functional {
            RunMode::Functional
        } else {
            RunMode::Load
        }
    }

    pub fn invocation(&self) -> Option<&RunnerInvocation> {
        self.invocation.as_ref()
    }

    pub fn paths(&self) -> Option<&ArtifactPaths> {
        self.paths.as_ref()
    }

    /// worker 失败的原因（非零退出码）
    pub fn failure(&self) -> Option<&ApiforgeError> {
        self.failure.as_ref()
    }

    /// 准备运行：检查环境、生成测试程序、分配输出文件
    ///
    /// 编译在写入任何文件之前完成，配置错误不会留下半成品。
    pub fn prepare(&mut self, aggregator: Option<&mut dyn Aggregator>) -> Result<()> {
        self.expect_state(RunnerState::NotStarted)?;
        if self.invocation.is_some() {
            return Err(ApiforgeError::InvalidState {
                expected: "unprepared",
                actual: "prepared",
            });
        }

        check_tools(&mut self.required_tools)?;

        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let dir = self.settings.artifacts_dir.clone();

        let (program, generated) = match self.scenario.source()? {
            ScenarioSource::Requests(_) => {
                let compiled = compile(&self.scenario)?;
                for name in compiled.method_names() {
                    debug!("Generated test method: {}", name);
                }
                let path = dir.join(format!("test_api-{}.py", id));
                compiled.save(&path)?;
                (path, true)
            }
            ScenarioSource::Script(script) => (script.to_path_buf(), false),
        };

        fs::create_dir_all(&dir)?;
        let paths = ArtifactPaths::allocate(&dir, &id);

        let mode = self.mode();
        let reader = SamplesReader::new(&paths.report, mode).shared();
        if let Some(aggregator) = aggregator
            && aggregator.accepts(mode)
        {
            aggregator.add_underling(reader.clone());
        }

        self.invocation = Some(RunnerInvocation {
            interpreter: self.settings.interpreter.clone(),
            worker_script: self.settings.worker_script.clone(),
            report_path: paths.report.clone(),
            iterations: self.load.iterations,
            hold: self.load.hold,
            program,
            generated,
        });
        self.paths = Some(paths);
        self.reader = Some(reader);

        info!("Prepared worker '{}' in {} mode", self.label, mode);
        Ok(())
    }

    /// 启动 worker 进程
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(RunnerState::NotStarted)?;
        let (Some(invocation), Some(paths)) = (&self.invocation, &self.paths) else {
            return Err(ApiforgeError::InvalidState {
                expected: "prepared",
                actual: "unprepared",
            });
        };

        let stdout = File::create(&paths.stdout)?;
        let stderr = File::create(&paths.stderr)?;
        let command = invocation.command_line();
        info!("Starting worker '{}': {}", self.label, invocation.display());

        let process = self
            .launcher
            .launch(&command, stdout.try_clone()?, stderr.try_clone()?)
            .map_err(|e| {
                ApiforgeError::Environment(format!(
                    "Failed to launch worker '{}': {}",
                    self.label, e
                ))
            })?;

        debug!("Worker '{}' started with pid {}", self.label, process.id());
        self.process = Some(process);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self.started_at = Some(self.clock.now());
        self.state = RunnerState::Running;
        Ok(())
    }

    /// 检查 worker 是否已结束，不阻塞
    ///
    /// 非零退出码不作为错误返回：记录在 [`failure`](Self::failure) 中，
    /// 调用方仍需汇总已产生的结果。超时只发出停止信号并返回 `Timeout`，
    /// 等待与强制结束留给 [`shutdown`](Self::shutdown)。
    pub fn poll(&mut self) -> Result<bool> {
        match self.state {
            RunnerState::Running => {}
            RunnerState::Succeeded | RunnerState::Failed => return Ok(true),
            other => {
                return Err(ApiforgeError::InvalidState {
                    expected: RunnerState::Running.as_str(),
                    actual: other.as_str(),
                });
            }
        }

        let status = match self.process.as_mut() {
            Some(process) => process.try_wait()?,
            None => {
                return Err(ApiforgeError::InvalidState {
                    expected: "launched",
                    actual: "no process",
                });
            }
        };

        match status {
            None => {
                if let (Some(limit), Some(started)) = (self.load.max_duration, self.started_at)
                    && self.clock.now().saturating_duration_since(started) >= limit
                {
                    warn!("Worker '{}' exceeded {:?}, shutting down", self.label, limit);
                    self.request_stop();
                    return Err(ApiforgeError::Timeout(limit));
                }
                Ok(false)
            }
            Some(0) => {
                info!("Worker '{}' finished", self.label);
                self.state = RunnerState::Succeeded;
                Ok(true)
            }
            Some(code) => {
                let failure = ApiforgeError::ToolFailed {
                    label: self.label.clone(),
                    code,
                    stderr: self.captured_stderr(),
                };
                warn!("{}", failure);
                self.failure = Some(failure);
                self.state = RunnerState::Failed;
                Ok(true)
            }
        }
    }

    /// 向 worker 发送停止信号并进入 shut-down，不等待进程退出
    fn request_stop(&mut self) {
        if let Some(process) = self.process.as_mut()
            && let Err(e) = process.request_stop()
        {
            warn!("Failed to stop worker '{}' ({}): {}", self.label, process.id(), e);
        }
        self.stdout = None;
        self.stderr = None;
        debug!("Worker '{}' {} -> shut-down", self.label, self.state);
        self.state = RunnerState::ShutDown;
    }

    /// 终止进程并关闭输出文件；任何状态下都可以调用，重复调用无副作用
    ///
    /// 进程忽略停止信号时会阻塞至多一个宽限期。
    pub fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            let pid = process.id();
            if let Err(e) = process.terminate(self.settings.grace_period) {
                warn!("Failed to terminate worker '{}' ({}): {}", self.label, pid, e);
            }
        }
        self.stdout = None;
        self.stderr = None;

        if self.state != RunnerState::ShutDown {
            debug!("Worker '{}' {} -> shut-down", self.label, self.state);
            self.state = RunnerState::ShutDown;
        }
    }

    /// reader 已挂载并且读到过记录
    pub fn has_results(&self) -> bool {
        self.reader
            .as_ref()
            .and_then(|reader| reader.lock().ok().map(|r| r.read_records() > 0))
            .unwrap_or(false)
    }

    /// 直接从 reader 读取新记录，适用于没有注册聚合器的情况
    pub fn drain_samples(&self) -> Result<Vec<SampleRecord>> {
        let Some(reader) = &self.reader else {
            return Ok(Vec::new());
        };
        let mut reader = reader
            .lock()
            .map_err(|_| ApiforgeError::Other("samples reader lock poisoned".to_string()))?;
        reader.read_new()
    }

    fn expect_state(&self, expected: RunnerState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ApiforgeError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    fn captured_stderr(&self) -> String {
        let Some(paths) = &self.paths else {
            return String::new();
        };
        match fs::read(&paths.stderr) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(e) => {
                warn!("Failed to read {}: {}", paths.stderr.display(), e);
                String::new()
            }
        }
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
