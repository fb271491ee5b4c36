use std::time::Duration;

use crate::generator::literal::PyExpr;
use crate::utils::format_seconds;

const INDENT: &str = "    ";

/// 生成代码中的语句节点
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `target = value`
    Assign { target: String, value: PyExpr },
    /// 单独的表达式语句（通常是方法调用）
    Expr(PyExpr),
    /// `time.sleep(<seconds>)`
    Sleep(Duration),
}

impl Stmt {
    pub fn assign(target: impl Into<String>, value: PyExpr) -> Self {
        Stmt::Assign {
            target: target.into(),
            value,
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<PyExpr>) -> Self {
        Stmt::Expr(PyExpr::call(func, args))
    }

    /// 渲染为单行源码（不含缩进）
    pub fn render(&self) -> String {
        match self {
            Stmt::Assign { target, value } => format!("{} = {}", target, value),
            Stmt::Expr(expr) => expr.to_string(),
            Stmt::Sleep(duration) => format!("time.sleep({})", format_seconds(*duration)),
        }
    }
}

/// 带缩进的源码输出
#[derive(Debug, Default)]
pub struct SourceWriter {
    buf: String,
    level: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输出一行，自动添加当前缩进
    pub fn line(&mut self, text: &str) {
        for _ in 0..self.level {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        self.line(&stmt.render());
    }

    /// 在缩进块内执行输出
    pub fn indented<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.level += 1;
        f(self);
        self.level -= 1;
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
