use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiforgeError {
    /// 场景配置错误，在启动任何进程之前抛出
    #[error("配置错误: {0}")]
    Config(String),

    /// 被监管的 worker 进程以非零退出码结束
    #[error("Worker '{label}' has failed with exit code {code}\n{stderr}")]
    ToolFailed {
        label: String,
        code: i32,
        stderr: String,
    },

    /// 缺少解释器、worker 脚本等外部依赖
    #[error("环境错误: {0}")]
    Environment(String),

    #[error("无效的状态: 期望 {expected}, 实际 {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("运行超时: 超过 {0:?}")]
    Timeout(Duration),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl ApiforgeError {
    /// 构造配置错误
    pub fn config(message: impl Into<String>) -> Self {
        ApiforgeError::Config(message.into())
    }

    /// 是否为配置类错误（编译阶段）
    pub fn is_config(&self) -> bool {
        matches!(self, ApiforgeError::Config(_) | ApiforgeError::TomlError(_))
    }
}

// Add conversion from anyhow::Error
impl From<anyhow::Error> for ApiforgeError {
    fn from(err: anyhow::Error) -> Self {
        ApiforgeError::Other(err.to_string())
    }
}

/// Result type for apiforge crate
pub type Result<T> = std::result::Result<T, ApiforgeError>;
