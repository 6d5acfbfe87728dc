//! lopdf 底层辅助函数

use anyhow::{anyhow, Result};
use lopdf::{Document, Object, Stream, StringFormat};

/// 从 Object 获取数值
pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// 获取流内容（兼容压缩与未压缩的流）
pub(crate) fn get_stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// 获取页面的内容流数据
///
/// `Contents` 可能是单个流、流引用或引用数组，数组按顺序拼接。
pub(crate) fn get_page_content(doc: &Document, page_id: lopdf::ObjectId) -> Result<Vec<u8>> {
    let page = doc.get_object(page_id).map_err(|e| anyhow!("{}", e))?;

    if let Object::Dictionary(dict) = page {
        if let Ok(contents) = dict.get(b"Contents") {
            match contents {
                Object::Reference(ref_id) => {
                    if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                        return Ok(get_stream_content(stream));
                    }
                }
                Object::Array(arr) => {
                    let mut all_content = Vec::new();
                    for item in arr {
                        if let Object::Reference(ref_id) = item {
                            if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                                all_content.extend(get_stream_content(stream));
                                all_content.push(b'\n');
                            }
                        }
                    }
                    return Ok(all_content);
                }
                Object::Stream(stream) => {
                    return Ok(get_stream_content(stream));
                }
                _ => {}
            }
        }
    }

    Err(anyhow!("无法获取页面内容"))
}

/// 将 PDF 字符串对象的字节解码为文本
///
/// 十六进制字符串先尝试 UTF-16BE（常见于 CID 字体），解码结果全部
/// 可打印时采用；否则与字面量字符串一样按 Latin-1 逐字节解码。
pub(crate) fn decode_text_bytes(bytes: &[u8], format: StringFormat) -> String {
    if matches!(format, StringFormat::Hexadecimal) && bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let units: Vec<u16> = bytes
            .chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        if let Ok(decoded) = String::from_utf16(&units) {
            if decoded
                .chars()
                .all(|c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
            {
                return decoded;
            }
        }
    }

    let mut result = String::with_capacity(bytes.len());
    for &b in bytes {
        if (32..127).contains(&b) {
            result.push(b as char);
        } else if b >= 128 {
            result.push(char::from_u32(b as u32).unwrap_or('?'));
        }
    }
    result
}

/// 脱敏显示 snippet，日志中不出现完整敏感值
pub(crate) fn mask_snippet(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= 4 {
        "*".repeat(len)
    } else {
        let visible = 4.min(len / 3);
        let prefix: String = chars[..visible].iter().collect();
        let suffix: String = chars[len - visible..].iter().collect();
        format!("{}****{}", prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_literal_latin1() {
        let decoded = decode_text_bytes(b"john@example.com", StringFormat::Literal);
        assert_eq!(decoded, "john@example.com");
    }

    #[test]
    fn test_decode_hex_utf16be() {
        // "AB" 的 UTF-16BE 编码
        let decoded = decode_text_bytes(&[0x00, 0x41, 0x00, 0x42], StringFormat::Hexadecimal);
        assert_eq!(decoded, "AB");
    }

    #[test]
    fn test_decode_skips_control_bytes() {
        let decoded = decode_text_bytes(&[0x07, b'h', b'i'], StringFormat::Literal);
        assert_eq!(decoded, "hi");
    }

    #[test]
    fn test_mask_snippet() {
        assert_eq!(mask_snippet("abc"), "***");
        let masked = mask_snippet("john.doe@example.com");
        assert!(masked.starts_with("john"));
        assert!(masked.contains("****"));
        assert!(!masked.contains("@example"));
    }
}
