//! lopdf 提取后端（回退）
//!
//! 直接解析页面内容流中的文字显示操作符，不依赖任何外部动态库。
//! 对复杂编码与版式的覆盖不如 pdfium，作为保底能力存在。

use super::{TextBackend, TextSource};
use crate::utils::{decode_text_bytes, get_page_content};
use anyhow::{anyhow, Result};
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::Path;

/// 基于 lopdf 的简单提取后端
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn TextSource>> {
        let doc = Document::load(path).map_err(|e| anyhow!("无法加载 PDF: {}", e))?;
        let page_ids: Vec<lopdf::ObjectId> = doc.page_iter().collect();
        Ok(Box::new(LopdfSource { doc, page_ids }))
    }
}

struct LopdfSource {
    doc: Document,
    page_ids: Vec<lopdf::ObjectId>,
}

impl TextSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_text(&mut self, index: usize) -> Result<Option<String>> {
        let page_id = *self
            .page_ids
            .get(index)
            .ok_or_else(|| anyhow!("页索引越界: {}", index))?;

        // 没有内容流的页面视为空页
        let content_data = match get_page_content(&self.doc, page_id) {
            Ok(data) => data,
            Err(_) => return Ok(None),
        };

        let text = extract_text_from_content(&content_data);
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

/// 从内容流中提取纯文本
///
/// 只关心文字显示操作符（Tj/TJ/'/"），字符串段之间以空格分隔；
/// 跨段拆分的词无法复原，属于该后端已知的保真度上限。
fn extract_text_from_content(content_data: &[u8]) -> String {
    let content = match Content::decode(content_data) {
        Ok(c) => c,
        Err(_) => return String::new(),
    };

    let mut text = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "'" => push_string_operand(op.operands.first(), &mut text),
            "\"" => push_string_operand(op.operands.get(2), &mut text),
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Object::String(bytes, format) = item {
                            push_decoded(bytes, *format, &mut text);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    text
}

fn push_string_operand(operand: Option<&Object>, out: &mut String) {
    if let Some(Object::String(bytes, format)) = operand {
        push_decoded(bytes, *format, out);
    }
}

fn push_decoded(bytes: &[u8], format: lopdf::StringFormat, out: &mut String) {
    let decoded = decode_text_bytes(bytes, format);
    if !decoded.trim().is_empty() {
        out.push_str(&decoded);
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_tj_operator() {
        let content = b"BT /F1 12 Tf 72 700 Td (Contact: john@example.com) Tj ET";
        let text = extract_text_from_content(content);
        assert_eq!(text.trim(), "Contact: john@example.com");
    }

    #[test]
    fn test_extract_text_from_tj_array() {
        let content = b"BT /F1 12 Tf 72 700 Td [(SSN:) -250 (123-45-6789)] TJ ET";
        let text = extract_text_from_content(content);
        assert_eq!(text.trim(), "SSN: 123-45-6789");
    }

    #[test]
    fn test_extract_text_empty_content() {
        assert_eq!(extract_text_from_content(b""), "");
    }

    #[test]
    fn test_extract_text_ignores_path_ops() {
        let content = b"10 10 100 100 re f";
        assert_eq!(extract_text_from_content(content), "");
    }
}
