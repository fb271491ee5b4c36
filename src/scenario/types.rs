use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::utils::parse_duration;
use crate::{ApiforgeError, Result};

/// 场景：有序的请求列表以及场景级默认值
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Scenario {
    /// 是否复用连接（未指定时运行时默认为 true）
    pub keepalive: Option<bool>,

    /// 默认地址，拼接在每个请求 URL 之前
    pub default_address: Option<String>,

    /// 路径前缀，拼接在默认地址之后
    pub path_prefix: Option<String>,

    /// 场景级 headers，会被请求级 headers 覆盖
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub timeout: Option<DurationValue>,

    pub follow_redirects: Option<bool>,

    pub think_time: Option<DurationValue>,

    /// 请求块列表
    pub requests: Option<Vec<RequestBlock>>,

    /// 外部提供的测试程序
    pub script: Option<PathBuf>,
}

/// 测试程序的来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioSource<'a> {
    Requests(&'a [RequestBlock]),
    Script(&'a Path),
}

impl Scenario {
    /// 创建只包含请求列表的场景
    pub fn with_requests(requests: Vec<RequestBlock>) -> Self {
        Self {
            requests: Some(requests),
            ..Self::default()
        }
    }

    /// 请求列表优先于外部脚本；两者都没有时是配置错误
    pub fn source(&self) -> Result<ScenarioSource<'_>> {
        if let Some(requests) = &self.requests {
            Ok(ScenarioSource::Requests(requests))
        } else if let Some(script) = &self.script {
            Ok(ScenarioSource::Script(script))
        } else {
            Err(ApiforgeError::config(
                "You must specify either 'requests' or 'script' in the scenario",
            ))
        }
    }

    /// 所有请求块（没有 requests 时为空）
    pub fn requests(&self) -> &[RequestBlock] {
        self.requests.as_deref().unwrap_or_default()
    }
}

/// 时间值：数字（秒）或者 "30s" 这样的字符串
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(f64),
    Text(String),
}

impl DurationValue {
    pub fn resolve(&self) -> Result<Duration> {
        match self {
            DurationValue::Seconds(secs) => parse_duration(&secs.to_string()),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}

impl From<&str> for DurationValue {
    fn from(s: &str) -> Self {
        DurationValue::Text(s.to_string())
    }
}

/// 场景中的一个请求块
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawBlock")]
pub enum RequestBlock {
    /// HTTP 请求
    Http(RequestSpec),
    /// 非 HTTP 块（transaction、include-scenario 等），编译器不支持
    Other { kind: String },
}

impl RequestBlock {
    pub fn as_http(&self) -> Option<&RequestSpec> {
        match self {
            RequestBlock::Http(spec) => Some(spec),
            RequestBlock::Other { .. } => None,
        }
    }

    /// 块类型名称，用于日志
    pub fn kind(&self) -> &str {
        match self {
            RequestBlock::Http(_) => "request",
            RequestBlock::Other { kind } => kind,
        }
    }
}

impl From<RequestSpec> for RequestBlock {
    fn from(spec: RequestSpec) -> Self {
        RequestBlock::Http(spec)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBlock {
    Url(String),
    Fields(Map<String, Value>),
}

const NON_HTTP_BLOCKS: [&str; 5] = [
    "transaction",
    "include-scenario",
    "set-variables",
    "action",
    "if",
];

impl TryFrom<RawBlock> for RequestBlock {
    type Error = ApiforgeError;

    fn try_from(raw: RawBlock) -> Result<Self> {
        match raw {
            RawBlock::Url(url) => Ok(RequestBlock::Http(RequestSpec::new("GET", url))),
            RawBlock::Fields(fields) if fields.contains_key("url") => {
                let spec = serde_json::from_value(Value::Object(fields))?;
                Ok(RequestBlock::Http(spec))
            }
            RawBlock::Fields(fields) => {
                let kind = NON_HTTP_BLOCKS
                    .iter()
                    .find(|name| fields.contains_key(**name))
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(RequestBlock::Other { kind })
            }
        }
    }
}

/// 单个 HTTP 请求定义
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestSpec {
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    pub label: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// 请求体：字符串、映射或者序列
    #[serde(default)]
    pub body: Option<Value>,

    pub timeout: Option<DurationValue>,

    pub follow_redirects: Option<bool>,

    pub think_time: Option<DurationValue>,

    #[serde(default, rename = "assert")]
    pub assertions: Vec<AssertionSpec>,

    #[serde(default, rename = "assert-jsonpath")]
    pub jsonpath_assertions: Vec<JsonPathAssertion>,

    #[serde(default, rename = "assert-xpath")]
    pub xpath_assertions: Vec<XPathAssertion>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestSpec {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.to_string(),
            label: None,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            follow_redirects: None,
            think_time: None,
            assertions: Vec::new(),
            jsonpath_assertions: Vec::new(),
            xpath_assertions: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_assertion(mut self, assertion: AssertionSpec) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_jsonpath(mut self, assertion: JsonPathAssertion) -> Self {
        self.jsonpath_assertions.push(assertion);
        self
    }

    pub fn with_xpath(mut self, assertion: XPathAssertion) -> Self {
        self.xpath_assertions.push(assertion);
        self
    }

    /// 解析 HTTP 方法
    pub fn parsed_method(&self) -> Result<Method> {
        self.method.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl FromStr for Method {
    type Err = ApiforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(ApiforgeError::config(format!("Invalid HTTP method: {}", s))),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// 运行时为该方法提供的快捷调用名；OPTIONS 没有快捷方法
    pub fn runtime_shortcut(&self) -> Option<&'static str> {
        match self {
            Method::Get => Some("get"),
            Method::Post => Some("post"),
            Method::Put => Some("put"),
            Method::Delete => Some("delete"),
            Method::Patch => Some("patch"),
            Method::Head => Some("head"),
            Method::Options => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 断言检查的对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    #[default]
    Body,
    Headers,
    #[serde(alias = "status-code")]
    HttpCode,
}

/// 断言中的单个成员值
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Member {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Member {
    fn from(s: &str) -> Self {
        Member::Text(s.to_string())
    }
}

impl From<i64> for Member {
    fn from(n: i64) -> Self {
        Member::Integer(n)
    }
}

/// 普通断言（body / headers / 状态码）
///
/// `contains` 总是规范化为序列，即使配置里只写了一个标量。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAssertion")]
pub struct AssertionSpec {
    pub contains: Vec<Member>,
    pub subject: Subject,
    pub regexp: bool,
    pub not: bool,
}

impl AssertionSpec {
    /// 默认断言：检查 body，按正则匹配
    pub fn contains(members: Vec<Member>) -> Self {
        Self {
            contains: members,
            subject: Subject::Body,
            regexp: true,
            not: false,
        }
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn regexp(mut self, regexp: bool) -> Self {
        self.regexp = regexp;
        self
    }

    pub fn negate(mut self, not: bool) -> Self {
        self.not = not;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAssertion {
    Short(Member),
    Fields(Map<String, Value>),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AssertionFields {
    contains: OneOrMany<Member>,
    #[serde(default)]
    subject: Subject,
    #[serde(default = "default_true")]
    regexp: bool,
    #[serde(default)]
    not: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<RawAssertion> for AssertionSpec {
    type Error = ApiforgeError;

    fn try_from(raw: RawAssertion) -> Result<Self> {
        match raw {
            RawAssertion::Short(member) => Ok(AssertionSpec::contains(vec![member])),
            RawAssertion::Fields(fields) => {
                let parsed: AssertionFields = serde_json::from_value(Value::Object(fields))
                    .map_err(|e| ApiforgeError::config(format!("Invalid assertion: {}", e)))?;
                Ok(AssertionSpec {
                    contains: parsed.contains.into(),
                    subject: parsed.subject,
                    regexp: parsed.regexp,
                    not: parsed.not,
                })
            }
        }
    }
}

/// JSONPath 断言；缺少 query 时在编译阶段报错
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawQueryAssertion<JsonPathAssertionFields>")]
pub struct JsonPathAssertion {
    pub jsonpath: Option<String>,
    pub expected_value: Option<Value>,
    pub invert: bool,
}

impl JsonPathAssertion {
    pub fn new(query: &str) -> Self {
        Self {
            jsonpath: Some(query.to_string()),
            ..Self::default()
        }
    }

    pub fn expected(mut self, value: Value) -> Self {
        self.expected_value = Some(value);
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

/// XPath 断言
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawQueryAssertion<XPathAssertionFields>")]
pub struct XPathAssertion {
    pub xpath: Option<String>,
    pub invert: bool,
}

impl XPathAssertion {
    pub fn new(query: &str) -> Self {
        Self {
            xpath: Some(query.to_string()),
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQueryAssertion<F> {
    Short(String),
    Fields(F),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JsonPathAssertionFields {
    jsonpath: Option<String>,
    expected_value: Option<Value>,
    #[serde(default)]
    invert: bool,
}

#[derive(Deserialize)]
struct XPathAssertionFields {
    xpath: Option<String>,
    #[serde(default)]
    invert: bool,
}

impl From<RawQueryAssertion<JsonPathAssertionFields>> for JsonPathAssertion {
    fn from(raw: RawQueryAssertion<JsonPathAssertionFields>) -> Self {
        match raw {
            RawQueryAssertion::Short(query) => JsonPathAssertion::new(&query),
            RawQueryAssertion::Fields(fields) => JsonPathAssertion {
                jsonpath: fields.jsonpath,
                expected_value: fields.expected_value,
                invert: fields.invert,
            },
        }
    }
}

impl From<RawQueryAssertion<XPathAssertionFields>> for XPathAssertion {
    fn from(raw: RawQueryAssertion<XPathAssertionFields>) -> Self {
        match raw {
            RawQueryAssertion::Short(query) => XPathAssertion::new(&query),
            RawQueryAssertion::Fields(fields) => XPathAssertion {
                xpath: fields.xpath,
                invert: fields.invert,
            },
        }
    }
}
