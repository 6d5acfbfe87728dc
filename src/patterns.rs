//! 敏感信息匹配规则
//!
//! 无状态的正则分类器：输入一页文本，输出零个或多个 [`Finding`]。
//! 不持有跨调用状态，可在多个工作线程间共享，无需加锁。

use crate::types::{Finding, PiiKind, Span};
use regex::Regex;

/// 邮箱地址（RFC-5322 简化文法）
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// 证件号的三种书写形式，彼此独立、逐一匹配
const NATIONAL_ID_PATTERNS: [&str; 3] = [
    r"\b\d{3}-\d{2}-\d{4}\b",
    r"\b\d{3}\s\d{2}\s\d{4}\b",
    r"\b\d{9}\b",
];

/// 已编译的检测规则集
pub struct PatternSet {
    email: Regex,
    national_id: Vec<Regex>,
}

impl PatternSet {
    pub fn new() -> Self {
        // 模式均为编译期常量，编译失败属于程序缺陷而非运行期输入问题
        let email = Regex::new(EMAIL_PATTERN).expect("邮箱正则编译失败");
        let national_id = NATIONAL_ID_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("证件号正则编译失败"))
            .collect();
        Self { email, national_id }
    }

    /// 对一页文本分类，返回命中列表
    ///
    /// 命中值保留原文；同一字面值的重复命中由扫描器统一去重。
    pub fn classify(&self, text: &str, page: u32) -> Vec<Finding> {
        let mut findings = Vec::new();

        for m in self.email.find_iter(text) {
            findings.push(Finding {
                kind: PiiKind::Email,
                value: m.as_str().to_string(),
                page,
                span: Some(char_span(text, m.start(), m.end())),
            });
        }

        for pattern in &self.national_id {
            for m in pattern.find_iter(text) {
                // 去掉分隔符后必须恰好 9 位数字，防止宽松的中间正则
                // 吞掉长度不同的无关数字串
                let digits = m.as_str().chars().filter(|c| c.is_ascii_digit()).count();
                if digits != 9 {
                    continue;
                }
                findings.push(Finding {
                    kind: PiiKind::NationalId,
                    value: m.as_str().to_string(),
                    page,
                    span: Some(char_span(text, m.start(), m.end())),
                });
            }
        }

        findings
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

/// 把正则返回的字节偏移换算为字符偏移
fn char_span(text: &str, start: usize, end: usize) -> Span {
    let start_chars = text[..start].chars().count();
    let value_chars = text[start..end].chars().count();
    Span {
        start: start_chars,
        end: start_chars + value_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(findings: &[Finding]) -> Vec<PiiKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_classify_emails_verbatim() {
        let set = PatternSet::new();
        let findings = set.classify("write to john.doe@example.com or a+b@test.org today", 1);
        assert_eq!(kinds(&findings), vec![PiiKind::Email, PiiKind::Email]);
        assert_eq!(findings[0].value, "john.doe@example.com");
        assert_eq!(findings[1].value, "a+b@test.org");
        assert_eq!(findings[0].page, 1);
    }

    #[test]
    fn test_classify_national_id_dashed() {
        let set = PatternSet::new();
        let findings = set.classify("SSN: 123-45-6789", 2);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, PiiKind::NationalId);
        assert_eq!(findings[0].value, "123-45-6789");
        assert_eq!(findings[0].page, 2);
    }

    #[test]
    fn test_classify_national_id_spaced() {
        let set = PatternSet::new();
        let findings = set.classify("number 123 45 6789 on file", 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].value, "123 45 6789");
    }

    #[test]
    fn test_classify_national_id_bare_nine_digits() {
        let set = PatternSet::new();
        let findings = set.classify("123456789", 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].value, "123456789");
    }

    #[test]
    fn test_classify_rejects_eight_digits() {
        let set = PatternSet::new();
        assert!(set.classify("12345678", 1).is_empty());
    }

    #[test]
    fn test_classify_rejects_ten_digits() {
        let set = PatternSet::new();
        assert!(set.classify("1234567890", 1).is_empty());
    }

    #[test]
    fn test_classify_empty_text() {
        let set = PatternSet::new();
        assert!(set.classify("", 1).is_empty());
    }

    #[test]
    fn test_span_is_char_offsets() {
        let set = PatternSet::new();
        let findings = set.classify("电话 a@b.de", 1);
        assert_eq!(findings.len(), 1);
        let span = findings[0].span.unwrap();
        assert_eq!(span.start, 3);
        assert_eq!(span.end, 3 + "a@b.de".chars().count());
    }
}
