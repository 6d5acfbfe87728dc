//! 页面文本实例定位
//!
//! 优先用 pdfium 的文本搜索取得精确边界框；pdfium 不可用或对某个
//! 值没有命中时，回退到内容流扫描：跟踪文本矩阵与字号，按估算
//! 字宽推出每个实例的位置。提取层与搜索层对文字的切分可能不同，
//! 一个值定位到零个实例是允许的结果。

use super::content::{estimate_char_width, GraphicsState};
use crate::extract::pdfium::bind_pdfium;
use crate::types::MaskRect;
use crate::utils::{decode_text_bytes, get_page_content};
use anyhow::{anyhow, Result};
use lopdf::content::Content;
use lopdf::{Document, Object};
use pdfium_render::prelude::*;
use std::path::Path;

/// 遮蔽四周的留白（pt）
const MASK_PADDING: f32 = 1.0;

/// 定位一个字面值在页面上的全部实例
pub(crate) fn locate_instances(
    doc: &Document,
    path: &Path,
    page_id: lopdf::ObjectId,
    page_index: usize,
    needle: &str,
) -> Result<Vec<MaskRect>> {
    match locate_with_pdfium(path, page_index, needle) {
        Ok(instances) if !instances.is_empty() => return Ok(instances),
        Ok(_) => log::debug!("[Locate] pdfium 无命中, 改用内容流扫描"),
        Err(e) => log::debug!("[Locate] pdfium 搜索不可用: {}, 改用内容流扫描", e),
    }

    // 没有内容流的页面上自然没有实例可定位
    let content_data = match get_page_content(doc, page_id) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("[Locate] 页 {} 无内容流: {}", page_index + 1, e);
            return Ok(Vec::new());
        }
    };
    locate_in_content(&content_data, needle)
}

/// 用 pdfium 在页面中搜索文本的精确边界框
fn locate_with_pdfium(path: &Path, page_index: usize, needle: &str) -> Result<Vec<MaskRect>> {
    let pdfium = bind_pdfium()?;
    let path_str = path.to_string_lossy().to_string();

    let document = pdfium
        .load_pdf_from_file(path_str.as_str(), None)
        .map_err(|e| anyhow!("无法加载 PDF: {}", e))?;

    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| anyhow!("获取页面 {} 失败: {}", page_index, e))?;

    let text = page
        .text()
        .map_err(|e| anyhow!("提取文本失败: {}", e))?;

    let search = text
        .search(needle, &PdfSearchOptions::new())
        .map_err(|e| anyhow!("搜索失败: {}", e))?;

    let mut results = Vec::new();
    for segments in search.iter(PdfSearchDirection::SearchForward) {
        for segment in segments.iter() {
            let bounds = segment.bounds();
            let left = bounds.left().value;
            let bottom = bounds.bottom().value;
            let right = bounds.right().value;
            let top = bounds.top().value;

            results.push(MaskRect {
                x: left - MASK_PADDING,
                y: bottom - MASK_PADDING,
                width: (right - left) + MASK_PADDING * 2.0,
                height: (top - bottom) + MASK_PADDING * 2.0,
            });
        }
    }

    Ok(results)
}

/// 在内容流中定位字面值的实例
///
/// 与字符级移除共用同一套矩阵跟踪和字宽估算，保证定位出的遮蔽
/// 必然盖住后续被移除的字符。只在单个字符串段内搜索：跨段拆分
/// 的值在提取阶段同样不会成为命中。
pub(crate) fn locate_in_content(content_data: &[u8], needle: &str) -> Result<Vec<MaskRect>> {
    let content = Content::decode(content_data).map_err(|e| anyhow!("解码内容流失败: {}", e))?;

    let mut state = GraphicsState::new();
    let mut results = Vec::new();

    for op in &content.operations {
        state.track(op);

        match op.operator.as_str() {
            "Tj" | "'" if state.in_text => {
                if let Some(Object::String(bytes, format)) = op.operands.first() {
                    let (x, y) = state.text_origin();
                    find_in_segment(bytes, *format, x, y, state.font_size, needle, &mut results);
                }
            }
            "\"" if state.in_text && op.operands.len() >= 3 => {
                if let Object::String(bytes, format) = &op.operands[2] {
                    let (x, y) = state.text_origin();
                    find_in_segment(bytes, *format, x, y, state.font_size, needle, &mut results);
                }
            }
            "TJ" if state.in_text => {
                let (start_x, y) = state.text_origin();
                let mut current_x = start_x;

                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, format) => {
                                current_x += find_in_segment(
                                    bytes,
                                    *format,
                                    current_x,
                                    y,
                                    state.font_size,
                                    needle,
                                    &mut results,
                                );
                            }
                            Object::Integer(n) => {
                                current_x -= (*n as f32) / 1000.0 * state.font_size;
                            }
                            Object::Real(n) => {
                                current_x -= n / 1000.0 * state.font_size;
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(results)
}

/// 在单个字符串段内搜索 needle，命中则注册遮蔽；返回该段的估算宽度
fn find_in_segment(
    bytes: &[u8],
    format: lopdf::StringFormat,
    start_x: f32,
    start_y: f32,
    font_size: f32,
    needle: &str,
    results: &mut Vec<MaskRect>,
) -> f32 {
    let decoded = decode_text_bytes(bytes, format);
    let widths: Vec<f32> = decoded
        .chars()
        .map(|c| char_width(c, font_size))
        .collect();
    let segment_width: f32 = widths.iter().sum();

    if decoded.is_empty() || needle.is_empty() {
        return segment_width;
    }

    for (byte_idx, _) in decoded.match_indices(needle) {
        let prefix_chars = decoded[..byte_idx].chars().count();
        let needle_chars = needle.chars().count();

        let prefix_width: f32 = widths[..prefix_chars].iter().sum();
        let needle_width: f32 = widths[prefix_chars..prefix_chars + needle_chars].iter().sum();

        results.push(MaskRect {
            x: start_x + prefix_width - MASK_PADDING,
            y: start_y - MASK_PADDING,
            width: needle_width + MASK_PADDING * 2.0,
            height: font_size.abs().max(12.0) + MASK_PADDING * 2.0,
        });
    }

    segment_width
}

/// 解码后字符的估算宽度，与字节级估算保持一致
fn char_width(c: char, font_size: f32) -> f32 {
    if c.is_ascii() {
        estimate_char_width(c as u8, font_size)
    } else {
        font_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_single_instance_in_tj() {
        let content = b"BT /F1 12 Tf 72 700 Td (Email: a@b.com) Tj ET";
        let instances = locate_in_content(content, "a@b.com").unwrap();
        assert_eq!(instances.len(), 1);

        // "Email: " 共 7 个 ASCII 字符, 7 * 12 * 0.55 = 46.2
        let rect = instances[0];
        assert!((rect.x - (72.0 + 46.2 - 1.0)).abs() < 0.01);
        assert!((rect.y - 699.0).abs() < 0.01);
        assert!(rect.width > 0.0);
    }

    #[test]
    fn test_locate_repeated_value_counts_each_instance() {
        let content =
            b"BT /F1 12 Tf 72 700 Td (a@b.com) Tj 0 -20 Td (a@b.com) Tj ET";
        let instances = locate_in_content(content, "a@b.com").unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances[0].y > instances[1].y);
    }

    #[test]
    fn test_locate_missing_value_yields_empty() {
        let content = b"BT /F1 12 Tf 72 700 Td (nothing here) Tj ET";
        let instances = locate_in_content(content, "a@b.com").unwrap();
        assert!(instances.is_empty());
    }

    #[test]
    fn test_locate_in_tj_array_segments() {
        let content = b"BT /F1 12 Tf 72 700 Td [(SSN: ) (123-45-6789)] TJ ET";
        let instances = locate_in_content(content, "123-45-6789").unwrap();
        assert_eq!(instances.len(), 1);
        // 第二段起点 = 72 + "SSN: " 的宽度 (5 * 6.6 = 33)
        assert!((instances[0].x - (72.0 + 33.0 - 1.0)).abs() < 0.01);
    }
}
