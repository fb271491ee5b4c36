use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::generator::literal::PyExpr;
use crate::generator::request::{
    BodyKind, EffectiveOptions, classify_body, content_type, merge_headers,
};
use crate::generator::statement::{SourceWriter, Stmt};
use crate::generator::verbs::{Verb, jsonpath_verb, plain_verb, xpath_verb};
use crate::scenario::{RequestBlock, RequestSpec, Scenario};
use crate::{ApiforgeError, Result};

const PROLOGUE: [&str; 3] = ["import time", "", "import apiritif"];
const CLASS_NAME: &str = "TestRequests";
const BASE_CLASS: &str = "apiritif.APITestCase";
const RESPONSE: &str = "response";
/// 方法名中保留的 URL 前缀长度
const URL_LABEL_CHARS: usize = 30;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9a-zA-Z]+").unwrap());

/// 根据请求序号和 URL 生成测试方法名
///
/// 零填充的序号保证唯一性，并在按字典序排序时保持请求顺序。
pub fn method_name(index: usize, url: &str) -> String {
    let prefix: String = url.chars().take(URL_LABEL_CHARS).collect();
    let label = NON_ALNUM.replace_all(&prefix, "_");
    format!("test_{:05}_{}", index, label)
}

/// 一个请求对应的测试方法
#[derive(Debug, Clone, PartialEq)]
pub struct TestMethod {
    pub name: String,
    /// 请求在场景中的序号（包括被跳过的块）
    pub index: usize,
    pub statements: Vec<Stmt>,
}

/// 编译结果：setUp 语句加上按请求顺序排列的测试方法
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub setup: Vec<Stmt>,
    pub methods: Vec<TestMethod>,
}

impl CompiledProgram {
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.name.as_str())
    }

    /// 渲染为完整的源码文本
    pub fn render(&self) -> String {
        let mut w = SourceWriter::new();
        for line in PROLOGUE {
            if line.is_empty() {
                w.blank();
            } else {
                w.line(line);
            }
        }
        w.blank();
        w.blank();

        w.line(&format!("class {}({}):", CLASS_NAME, BASE_CLASS));
        w.indented(|w| {
            w.line("def setUp(self):");
            w.indented(|w| {
                for stmt in &self.setup {
                    w.stmt(stmt);
                }
            });
            w.blank();

            for method in &self.methods {
                w.line(&format!("def {}(self):", method.name));
                w.indented(|w| {
                    for stmt in &method.statements {
                        w.stmt(stmt);
                    }
                });
                w.blank();
            }
        });

        w.finish()
    }

    /// 写入文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        debug!("Saved generated test program to {}", path.display());
        Ok(())
    }
}

/// 场景编译器：场景模型 → 测试程序
pub struct ScenarioCompiler<'a> {
    scenario: &'a Scenario,
}

impl<'a> ScenarioCompiler<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self { scenario }
    }

    pub fn compile(&self) -> Result<CompiledProgram> {
        debug!("Generating test case methods");
        let setup = self.setup_statements();

        let mut methods = Vec::new();
        for (index, block) in self.scenario.requests().iter().enumerate() {
            let RequestBlock::Http(spec) = block else {
                warn!(
                    "Script generator doesn't support '{}' blocks, skipping",
                    block.kind()
                );
                continue;
            };
            methods.push(self.compile_request(index, spec)?);
        }

        Ok(CompiledProgram { setup, methods })
    }

    fn setup_statements(&self) -> Vec<Stmt> {
        let mut setup = vec![
            Stmt::call(format!("super({}, self).setUp", CLASS_NAME), vec![]),
            Stmt::assign(
                "self.keep_alive",
                PyExpr::Bool(self.scenario.keepalive.unwrap_or(true)),
            ),
        ];
        if let Some(address) = &self.scenario.default_address {
            setup.push(Stmt::assign("self.default_address", PyExpr::str(address)));
        }
        if let Some(prefix) = &self.scenario.path_prefix {
            setup.push(Stmt::assign("self.path_prefix", PyExpr::str(prefix)));
        }
        setup
    }

    fn compile_request(&self, index: usize, spec: &RequestSpec) -> Result<TestMethod> {
        let name = method_name(index, &spec.url);
        debug!("Generating test method {}", name);

        let options = EffectiveOptions::resolve(spec, self.scenario)?;
        let mut statements = vec![
            Stmt::assign(RESPONSE, self.request_call(spec, &options)?),
            Stmt::call(Verb::Ok.method(), vec![PyExpr::name(RESPONSE)]),
        ];
        statements.extend(plain_assertions(spec));
        statements.extend(jsonpath_assertions(spec)?);
        statements.extend(xpath_assertions(spec)?);

        if let Some(think_time) = options.think_time.filter(|t| !t.is_zero()) {
            statements.push(Stmt::Sleep(think_time));
        }

        Ok(TestMethod {
            name,
            index,
            statements,
        })
    }

    fn request_call(&self, spec: &RequestSpec, options: &EffectiveOptions) -> Result<PyExpr> {
        let method = spec.parsed_method()?;
        let url = PyExpr::str(&spec.url);

        let mut call = match method.runtime_shortcut() {
            Some(shortcut) => PyExpr::call(format!("self.{}", shortcut), vec![url]),
            None => PyExpr::call("self.request", vec![url])
                .kwarg("method", PyExpr::str(method.as_str())),
        };
        call = call
            .kwarg(
                "timeout",
                PyExpr::Float(options.timeout.as_secs_f64()),
            )
            .kwarg("allow_redirects", PyExpr::Bool(options.follow_redirects));

        let headers = merge_headers(&self.scenario.headers, &spec.headers);
        if !headers.is_empty() {
            let dict = headers
                .iter()
                .map(|(k, v)| (PyExpr::str(k), PyExpr::str(v)))
                .collect();
            call = call.kwarg("headers", PyExpr::Dict(dict));
        }

        call = match classify_body(method, spec.body.as_ref(), content_type(&headers))? {
            BodyKind::Json(body) => call.kwarg("json", PyExpr::from(body)),
            BodyKind::QueryParams(params) => {
                call.kwarg("params", PyExpr::from(&Value::Object(params.clone())))
            }
            BodyKind::Form(fields) => {
                let pairs = fields
                    .iter()
                    .map(|(k, v)| PyExpr::Tuple(vec![PyExpr::str(k), PyExpr::from(v)]))
                    .collect();
                call.kwarg("data", PyExpr::List(pairs))
            }
            BodyKind::Raw(text) => call.kwarg("data", PyExpr::str(text)),
            BodyKind::Absent => call,
        };

        Ok(call)
    }
}

/// 便捷函数：编译场景
pub fn compile(scenario: &Scenario) -> Result<CompiledProgram> {
    ScenarioCompiler::new(scenario).compile()
}

fn plain_assertions(spec: &RequestSpec) -> Vec<Stmt> {
    spec.assertions
        .iter()
        .flat_map(|assertion| {
            let verb = plain_verb(assertion.subject, assertion.regexp, assertion.not);
            assertion.contains.iter().map(move |member| {
                Stmt::call(
                    verb.method(),
                    vec![PyExpr::from(member), PyExpr::name(RESPONSE)],
                )
            })
        })
        .collect()
}

fn jsonpath_assertions(spec: &RequestSpec) -> Result<Vec<Stmt>> {
    spec.jsonpath_assertions
        .iter()
        .map(|assertion| {
            let query = assertion.jsonpath.as_deref().ok_or_else(|| {
                ApiforgeError::config(format!(
                    "JSON Path not found in assertion for '{}'",
                    spec.url
                ))
            })?;
            let expected = match &assertion.expected_value {
                None | Some(Value::Null) => PyExpr::None,
                Some(Value::String(s)) if s.is_empty() => PyExpr::None,
                Some(value) => PyExpr::from(value),
            };
            let call = PyExpr::call(
                jsonpath_verb(assertion.invert).method(),
                vec![PyExpr::str(query), PyExpr::name(RESPONSE)],
            )
            .kwarg("expected_value", expected);
            Ok(Stmt::Expr(call))
        })
        .collect()
}

fn xpath_assertions(spec: &RequestSpec) -> Result<Vec<Stmt>> {
    spec.xpath_assertions
        .iter()
        .map(|assertion| {
            let query = assertion.xpath.as_deref().ok_or_else(|| {
                ApiforgeError::config(format!("XPath not found in assertion for '{}'", spec.url))
            })?;
            Ok(Stmt::call(
                xpath_verb(assertion.invert).method(),
                vec![PyExpr::str(query), PyExpr::name(RESPONSE)],
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{AssertionSpec, JsonPathAssertion, Member, Subject, XPathAssertion};
    use serde_json::json;

    fn lines(method: &TestMethod) -> Vec<String> {
        method.statements.iter().map(Stmt::render).collect()
    }

    #[test]
    fn test_method_name() {
        assert_eq!(method_name(0, "http://x/api"), "test_00000_http_x_api");
        assert_eq!(method_name(12, "/a//b?c=d"), "test_00012__a_b_c_d");

        let long = "http://example.com/very/long/path/that/keeps/going";
        assert_eq!(method_name(3, long), "test_00003_http_example_com_very_long_p");
    }

    #[test]
    fn test_setup_defaults() {
        let scenario = Scenario::with_requests(vec![]);
        let program = compile(&scenario).unwrap();
        let setup: Vec<String> = program.setup.iter().map(Stmt::render).collect();
        assert_eq!(
            setup,
            vec![
                "super(TestRequests, self).setUp()".to_string(),
                "self.keep_alive = True".to_string(),
            ]
        );
    }

    #[test]
    fn test_setup_configured() {
        let mut scenario = Scenario::with_requests(vec![]);
        scenario.keepalive = Some(false);
        scenario.default_address = Some("http://x".to_string());
        scenario.path_prefix = Some("/api".to_string());

        let program = compile(&scenario).unwrap();
        let setup: Vec<String> = program.setup.iter().map(Stmt::render).collect();
        assert_eq!(setup[1], "self.keep_alive = False");
        assert_eq!(setup[2], "self.default_address = 'http://x'");
        assert_eq!(setup[3], "self.path_prefix = '/api'");
    }

    #[test]
    fn test_skips_non_http_blocks() {
        let scenario = Scenario::with_requests(vec![
            RequestSpec::new("GET", "/first").into(),
            RequestBlock::Other {
                kind: "transaction".to_string(),
            },
            RequestSpec::new("GET", "/third").into(),
        ]);

        let program = compile(&scenario).unwrap();
        let names: Vec<&str> = program.method_names().collect();
        assert_eq!(names, vec!["test_00000__first", "test_00002__third"]);
    }

    #[test]
    fn test_request_statement_and_order() {
        let spec = RequestSpec::new("GET", "/items")
            .with_header("Accept", "application/json")
            .with_body(json!({"page": 2}))
            .with_xpath(XPathAssertion::new("//title"))
            .with_jsonpath(JsonPathAssertion::new("$.items"))
            .with_assertion(
                AssertionSpec::contains(vec![Member::from("ok"), Member::from("fine")])
                    .regexp(false),
            )
            .with_assertion(
                AssertionSpec::contains(vec![Member::Integer(200)]).subject(Subject::HttpCode),
            );
        let mut scenario = Scenario::with_requests(vec![spec.into()]);
        scenario.think_time = Some("750ms".into());

        let program = compile(&scenario).unwrap();
        assert_eq!(
            lines(&program.methods[0]),
            vec![
                "response = self.get('/items', timeout=30.0, allow_redirects=True, \
                 headers={'Accept': 'application/json'}, params={'page': 2})",
                "self.assertOk(response)",
                "self.assertInBody('ok', response)",
                "self.assertInBody('fine', response)",
                "self.assertStatusCode(200, response)",
                "self.assertJSONPath('$.items', response, expected_value=None)",
                "self.assertXPath('//title', response)",
                "time.sleep(0.75)",
            ]
        );
    }

    #[test]
    fn test_form_and_raw_bodies() {
        let scenario = Scenario::with_requests(vec![
            RequestSpec::new("POST", "/form")
                .with_body(json!({"user": "bob", "age": 7}))
                .into(),
            RequestSpec::new("PUT", "/raw").with_body(json!("a=1")).into(),
        ]);

        let program = compile(&scenario).unwrap();
        assert_eq!(
            program.methods[0].statements[0].render(),
            "response = self.post('/form', timeout=30.0, allow_redirects=True, \
             data=[('user', 'bob'), ('age', 7)])"
        );
        assert_eq!(
            program.methods[1].statements[0].render(),
            "response = self.put('/raw', timeout=30.0, allow_redirects=True, data='a=1')"
        );
    }

    #[test]
    fn test_options_method_uses_generic_request() {
        let mut spec = RequestSpec::new("OPTIONS", "/");
        spec.follow_redirects = Some(false);
        let program = compile(&Scenario::with_requests(vec![spec.into()])).unwrap();
        assert_eq!(
            program.methods[0].statements[0].render(),
            "response = self.request('/', method='OPTIONS', timeout=30.0, allow_redirects=False)"
        );
    }

    #[test]
    fn test_jsonpath_expected_and_inverted() {
        let spec = RequestSpec::new("GET", "/")
            .with_jsonpath(JsonPathAssertion::new("$.id").expected(json!(5)))
            .with_jsonpath(JsonPathAssertion::new("$.name").expected(json!("")).inverted())
            .with_xpath(XPathAssertion::new("//a").inverted());

        let program = compile(&Scenario::with_requests(vec![spec.into()])).unwrap();
        let rendered = lines(&program.methods[0]);
        assert_eq!(
            rendered[2],
            "self.assertJSONPath('$.id', response, expected_value=5)"
        );
        assert_eq!(
            rendered[3],
            "self.assertNotJSONPath('$.name', response, expected_value=None)"
        );
        assert_eq!(rendered[4], "self.assertNotXPath('//a', response)");
    }

    #[test]
    fn test_missing_queries_are_config_errors() {
        let jsonpath = RequestSpec::new("GET", "/").with_jsonpath(JsonPathAssertion::default());
        let err = compile(&Scenario::with_requests(vec![jsonpath.into()])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("JSON Path not found"));

        let xpath = RequestSpec::new("GET", "/").with_xpath(XPathAssertion::default());
        let err = compile(&Scenario::with_requests(vec![xpath.into()])).unwrap_err();
        assert!(err.to_string().contains("XPath not found"));
    }

    #[test]
    fn test_invalid_method_is_config_error() {
        let spec = RequestSpec::new("FETCH", "/");
        let err = compile(&Scenario::with_requests(vec![spec.into()])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_negated_assertions_and_special_floats() {
        let spec = RequestSpec::new("GET", "/")
            .with_assertion(
                AssertionSpec::contains(vec![Member::from("X-Debug")])
                    .subject(Subject::Headers)
                    .negate(true),
            )
            .with_assertion(
                AssertionSpec::contains(vec![Member::Float(f64::NAN)])
                    .regexp(false)
                    .negate(true),
            );

        let program = compile(&Scenario::with_requests(vec![spec.into()])).unwrap();
        let rendered = lines(&program.methods[0]);
        assert_eq!(rendered[2], "self.assertRegexNotInHeaders('X-Debug', response)");
        assert_eq!(rendered[3], "self.assertNotInBody(float('nan'), response)");
    }

    #[test]
    fn test_out_of_range_timeout_is_config_error() {
        let mut spec = RequestSpec::new("GET", "/");
        spec.timeout = Some("99999999999999999999s".into());
        let err = compile(&Scenario::with_requests(vec![spec.into()])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_zero_think_time_not_emitted() {
        let mut spec = RequestSpec::new("GET", "/");
        spec.think_time = Some("0s".into());
        let program = compile(&Scenario::with_requests(vec![spec.into()])).unwrap();
        assert_eq!(program.methods[0].statements.len(), 2);
    }

    #[test]
    fn test_render_layout() {
        let scenario = Scenario::with_requests(vec![RequestSpec::new("GET", "/").into()]);
        let source = compile(&scenario).unwrap().render();
        let expected = "\
import time

import apiritif


class TestRequests(apiritif.APITestCase):
    def setUp(self):
        super(TestRequests, self).setUp()
        self.keep_alive = True

    def test_00000__(self):
        response = self.get('/', timeout=30.0, allow_redirects=True)
        self.assertOk(response)

";
        assert_eq!(source, expected);
    }
}
