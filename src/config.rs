use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::Result;
use crate::scenario::DurationValue;

/// `apiforge.toml` 的内容，所有字段可选
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsFile {
    pub interpreter: Option<PathBuf>,
    pub worker_script: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    pub poll_interval: Option<DurationValue>,
    pub functional: Option<bool>,
    pub grace_period: Option<DurationValue>,
}

/// 运行 worker 所需的最终设置
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub interpreter: PathBuf,
    pub worker_script: PathBuf,
    pub artifacts_dir: PathBuf,
    pub poll_interval: Duration,
    /// 功能测试模式；否则为负载模式
    pub functional: bool,
    /// 终止 worker 时 SIGTERM 之后等待的时间
    pub grace_period: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            worker_script: PathBuf::from("nose_plugin.py"),
            artifacts_dir: PathBuf::from("artifacts"),
            poll_interval: Duration::from_millis(500),
            functional: false,
            grace_period: Duration::from_secs(5),
        }
    }
}

impl RunnerSettings {
    /// 在默认值之上应用配置文件
    pub fn from_file(file: &SettingsFile) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(interpreter) = &file.interpreter {
            settings.interpreter = interpreter.clone();
        }
        if let Some(worker) = &file.worker_script {
            settings.worker_script = worker.clone();
        }
        if let Some(dir) = &file.artifacts_dir {
            settings.artifacts_dir = dir.clone();
        }
        if let Some(interval) = &file.poll_interval {
            settings.poll_interval = interval.resolve()?;
        }
        if let Some(functional) = file.functional {
            settings.functional = functional;
        }
        if let Some(grace) = &file.grace_period {
            settings.grace_period = grace.resolve()?;
        }

        Ok(settings)
    }
}

/// 配置文件加载器
pub struct SettingsLoader;

impl SettingsLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "apiforge.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<SettingsFile> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// 查找配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/apiforge/
    pub fn find() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        Self::find_upwards(&cwd).or_else(Self::user_config_path)
    }

    /// 查找并加载；找不到时返回默认设置
    pub fn find_and_load() -> Result<RunnerSettings> {
        match Self::find() {
            Some(path) => {
                debug!("Loading settings from {}", path.display());
                RunnerSettings::from_file(&Self::load_from_path(&path)?)
            }
            None => Ok(RunnerSettings::default()),
        }
    }

    fn find_upwards(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("apiforge")
            .join(Self::CONFIG_FILE);
        config_path.is_file().then_some(config_path)
    }
}
