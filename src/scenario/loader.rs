use std::fs;
use std::path::Path;

use tracing::debug;

use crate::scenario::types::Scenario;
use crate::{ApiforgeError, Result};

/// 场景文件加载器
pub struct ScenarioLoader;

impl ScenarioLoader {
    /// 从文件加载场景，按扩展名选择 TOML 或 JSON
    ///
    /// 相对的 `script` 路径按场景文件所在目录解析。
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Scenario> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        let mut scenario = match extension.as_deref() {
            Some("toml") => Self::parse_toml(&content)?,
            Some("json") => Self::parse_json(&content)?,
            _ => {
                return Err(ApiforgeError::config(format!(
                    "Unsupported scenario file '{}': expected .toml or .json",
                    path.display()
                )));
            }
        };

        if let (Some(script), Some(base)) = (scenario.script.as_mut(), path.parent())
            && script.is_relative()
        {
            *script = base.join(&*script);
        }

        debug!(
            "Loaded scenario from {} ({} request blocks)",
            path.display(),
            scenario.requests().len()
        );
        Ok(scenario)
    }

    /// 解析失败统一归为配置错误，与文件格式无关
    pub fn parse_toml(content: &str) -> Result<Scenario> {
        toml::from_str(content)
            .map_err(|e| ApiforgeError::config(format!("Invalid TOML scenario: {}", e)))
    }

    pub fn parse_json(content: &str) -> Result<Scenario> {
        serde_json::from_str(content)
            .map_err(|e| ApiforgeError::config(format!("Invalid JSON scenario: {}", e)))
    }
}
