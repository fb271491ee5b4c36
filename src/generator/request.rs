use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::scenario::{DurationValue, Method, RequestSpec, Scenario};
use crate::{ApiforgeError, Result};

/// 单个请求的生效选项：请求级 > 场景级 > 内置默认值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveOptions {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub think_time: Option<Duration>,
}

impl EffectiveOptions {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn resolve(request: &RequestSpec, scenario: &Scenario) -> Result<Self> {
        let timeout = pick(request.timeout.as_ref(), scenario.timeout.as_ref())
            .map(DurationValue::resolve)
            .transpose()?
            .unwrap_or(Self::DEFAULT_TIMEOUT);

        let follow_redirects = request
            .follow_redirects
            .or(scenario.follow_redirects)
            .unwrap_or(true);

        let think_time = pick(request.think_time.as_ref(), scenario.think_time.as_ref())
            .map(DurationValue::resolve)
            .transpose()?;

        Ok(Self {
            timeout,
            follow_redirects,
            think_time,
        })
    }
}

fn pick<'a, T>(request: Option<&'a T>, scenario: Option<&'a T>) -> Option<&'a T> {
    request.or(scenario)
}

/// 合并 headers：请求级覆盖场景级，key 区分大小写
pub fn merge_headers(
    scenario: &BTreeMap<String, String>,
    request: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = scenario.clone();
    merged.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// 不区分大小写地查找 Content-Type
///
/// 多个大小写不同的 key 同时存在时，按 key 排序后最后一个生效。
pub fn content_type(headers: &BTreeMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
        .last()
}

/// 请求体的分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyKind<'a> {
    /// JSON 请求体（Content-Type 为 application/json 且 body 是结构化数据）
    Json(&'a Value),
    /// GET 请求的 URL 参数
    QueryParams(&'a Map<String, Value>),
    /// 表单数据
    Form(&'a Map<String, Value>),
    /// 原始字符串
    Raw(&'a str),
    Absent,
}

/// 将请求体归类为唯一的一种形式；无法处理的类型返回配置错误
pub fn classify_body<'a>(
    method: Method,
    body: Option<&'a Value>,
    content_type: Option<&str>,
) -> Result<BodyKind<'a>> {
    let Some(body) = body else {
        return Ok(BodyKind::Absent);
    };

    let is_json = content_type == Some("application/json");
    match body {
        Value::Null => Ok(BodyKind::Absent),
        Value::Object(_) | Value::Array(_) if is_json => Ok(BodyKind::Json(body)),
        Value::Object(map) if method == Method::Get => Ok(BodyKind::QueryParams(map)),
        Value::Object(map) => Ok(BodyKind::Form(map)),
        Value::String(text) => Ok(BodyKind::Raw(text)),
        other => Err(ApiforgeError::config(format!(
            "Cannot handle 'body' option of type {}: {}",
            type_name(other),
            other
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
