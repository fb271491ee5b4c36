//! 场景编译器 - 将场景模型生成为测试程序源码

mod compiler;
mod literal;
mod request;
mod statement;
mod verbs;

pub use compiler::{CompiledProgram, ScenarioCompiler, TestMethod, compile, method_name};
pub use literal::{PyExpr, quote};
pub use request::{BodyKind, EffectiveOptions, classify_body, content_type, merge_headers};
pub use statement::{SourceWriter, Stmt};
pub use verbs::{Verb, jsonpath_verb, plain_verb, xpath_verb};
