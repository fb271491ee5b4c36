use std::fmt;

use serde_json::Value;

use crate::scenario::Member;

/// 生成代码中的表达式节点
///
/// 所有字面量的引号和转义都集中在这里处理，渲染结果与 Python 的 `repr` 一致。
#[derive(Debug, Clone, PartialEq)]
pub enum PyExpr {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<PyExpr>),
    Tuple(Vec<PyExpr>),
    Dict(Vec<(PyExpr, PyExpr)>),
    /// 变量或属性引用，原样输出，例如 `response`
    Name(String),
    /// 函数调用: `func(args..., key=value...)`
    Call {
        func: String,
        args: Vec<PyExpr>,
        kwargs: Vec<(String, PyExpr)>,
    },
}

impl PyExpr {
    pub fn str(s: impl Into<String>) -> Self {
        PyExpr::Str(s.into())
    }

    pub fn name(s: impl Into<String>) -> Self {
        PyExpr::Name(s.into())
    }

    pub fn call(func: impl Into<String>, args: Vec<PyExpr>) -> Self {
        PyExpr::Call {
            func: func.into(),
            args,
            kwargs: Vec::new(),
        }
    }

    /// 追加关键字参数（仅对 Call 有效）
    pub fn kwarg(mut self, key: &str, value: PyExpr) -> Self {
        if let PyExpr::Call { kwargs, .. } = &mut self {
            kwargs.push((key.to_string(), value));
        }
        self
    }
}

impl From<&Value> for PyExpr {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => PyExpr::None,
            Value::Bool(b) => PyExpr::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PyExpr::Int(i as i128)
                } else if let Some(u) = n.as_u64() {
                    PyExpr::Int(u as i128)
                } else {
                    PyExpr::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => PyExpr::Str(s.clone()),
            Value::Array(items) => PyExpr::List(items.iter().map(PyExpr::from).collect()),
            Value::Object(map) => PyExpr::Dict(
                map.iter()
                    .map(|(k, v)| (PyExpr::Str(k.clone()), PyExpr::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Member> for PyExpr {
    fn from(member: &Member) -> Self {
        match member {
            Member::Text(s) => PyExpr::Str(s.clone()),
            Member::Integer(i) => PyExpr::Int(*i as i128),
            Member::Float(f) => PyExpr::Float(*f),
            Member::Bool(b) => PyExpr::Bool(*b),
        }
    }
}

impl fmt::Display for PyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyExpr::None => write!(f, "None"),
            PyExpr::Bool(true) => write!(f, "True"),
            PyExpr::Bool(false) => write!(f, "False"),
            PyExpr::Int(i) => write!(f, "{}", i),
            PyExpr::Float(x) => write!(f, "{}", format_float(*x)),
            PyExpr::Str(s) => write!(f, "{}", quote(s)),
            PyExpr::Name(name) => write!(f, "{}", name),
            PyExpr::List(items) => {
                write!(f, "[")?;
                write_separated(f, items)?;
                write!(f, "]")
            }
            PyExpr::Tuple(items) => {
                write!(f, "(")?;
                write_separated(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            PyExpr::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            PyExpr::Call { func, args, kwargs } => {
                write!(f, "{}(", func)?;
                write_separated(f, args)?;
                for (i, (key, value)) in kwargs.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, items: &[PyExpr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Python 没有 NaN 和无穷大的字面量，只能通过 `float()` 构造
fn format_float(x: f64) -> String {
    if x.is_nan() {
        "float('nan')".to_string()
    } else if x.is_infinite() {
        if x > 0.0 {
            "float('inf')".to_string()
        } else {
            "-float('inf')".to_string()
        }
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else if x.fract() == 0.0 {
        // 保持浮点类型，否则会被当成整数
        format!("{:e}", x)
    } else {
        format!("{}", x)
    }
}

/// 生成 Python 字符串字面量
///
/// 默认使用单引号；字符串中只有单引号而没有双引号时改用双引号。
pub fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code < 0x100 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}
