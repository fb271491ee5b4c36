use std::fmt;

use crate::scenario::Subject;

/// 断言运行时提供的断言方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Ok,
    InBody,
    NotInBody,
    RegexInBody,
    RegexNotInBody,
    InHeaders,
    NotInHeaders,
    RegexInHeaders,
    RegexNotInHeaders,
    StatusCode,
    NotStatusCode,
    JsonPath,
    NotJsonPath,
    XPath,
    NotXPath,
}

impl Verb {
    /// 运行时中的方法名
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Ok => "assertOk",
            Verb::InBody => "assertInBody",
            Verb::NotInBody => "assertNotInBody",
            Verb::RegexInBody => "assertRegexInBody",
            Verb::RegexNotInBody => "assertRegexNotInBody",
            Verb::InHeaders => "assertInHeaders",
            Verb::NotInHeaders => "assertNotInHeaders",
            Verb::RegexInHeaders => "assertRegexInHeaders",
            Verb::RegexNotInHeaders => "assertRegexNotInHeaders",
            Verb::StatusCode => "assertStatusCode",
            Verb::NotStatusCode => "assertNotStatusCode",
            Verb::JsonPath => "assertJSONPath",
            Verb::NotJsonPath => "assertNotJSONPath",
            Verb::XPath => "assertXPath",
            Verb::NotXPath => "assertNotXPath",
        }
    }

    /// 生成代码中的调用目标，例如 `self.assertInBody`
    pub fn method(&self) -> String {
        format!("self.{}", self.as_str())
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 普通断言的方法选择表，键为 (subject, regexp, not)
///
/// 状态码不支持正则，regexp 标志被忽略。
pub fn plain_verb(subject: Subject, regexp: bool, not: bool) -> Verb {
    match (subject, regexp, not) {
        (Subject::Body, false, false) => Verb::InBody,
        (Subject::Body, false, true) => Verb::NotInBody,
        (Subject::Body, true, false) => Verb::RegexInBody,
        (Subject::Body, true, true) => Verb::RegexNotInBody,
        (Subject::Headers, false, false) => Verb::InHeaders,
        (Subject::Headers, false, true) => Verb::NotInHeaders,
        (Subject::Headers, true, false) => Verb::RegexInHeaders,
        (Subject::Headers, true, true) => Verb::RegexNotInHeaders,
        (Subject::HttpCode, _, false) => Verb::StatusCode,
        (Subject::HttpCode, _, true) => Verb::NotStatusCode,
    }
}

pub fn jsonpath_verb(invert: bool) -> Verb {
    if invert { Verb::NotJsonPath } else { Verb::JsonPath }
}

pub fn xpath_verb(invert: bool) -> Verb {
    if invert { Verb::NotXPath } else { Verb::XPath }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_verb_table() {
        let cases = [
            (Subject::Body, false, false, "assertInBody"),
            (Subject::Body, false, true, "assertNotInBody"),
            (Subject::Body, true, false, "assertRegexInBody"),
            (Subject::Body, true, true, "assertRegexNotInBody"),
            (Subject::Headers, false, false, "assertInHeaders"),
            (Subject::Headers, false, true, "assertNotInHeaders"),
            (Subject::Headers, true, false, "assertRegexInHeaders"),
            (Subject::Headers, true, true, "assertRegexNotInHeaders"),
        ];

        for (subject, regexp, not, expected) in cases {
            assert_eq!(plain_verb(subject, regexp, not).as_str(), expected);
        }
    }

    #[test]
    fn test_status_code_ignores_regexp() {
        for regexp in [true, false] {
            assert_eq!(plain_verb(Subject::HttpCode, regexp, false), Verb::StatusCode);
            assert_eq!(
                plain_verb(Subject::HttpCode, regexp, true),
                Verb::NotStatusCode
            );
        }
    }

    #[test]
    fn test_query_verbs() {
        assert_eq!(jsonpath_verb(false).method(), "self.assertJSONPath");
        assert_eq!(jsonpath_verb(true).method(), "self.assertNotJSONPath");
        assert_eq!(xpath_verb(false).to_string(), "assertXPath");
        assert_eq!(xpath_verb(true).to_string(), "assertNotXPath");
    }
}
