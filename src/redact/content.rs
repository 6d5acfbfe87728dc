//! 内容流改写
//!
//! 遮蔽分两步落实：先把遮蔽区域内的字符替换为空格，使底层文字
//! 被结构性移除（不可提取、不可复制），再绘制不透明黑色矩形作为
//! 可见标记。仅覆盖不移除是不够的：叠加层下的文字仍可被提取。

use crate::types::MaskRect;
use crate::utils::{get_number, get_page_content};
use anyhow::{anyhow, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// 内容流遍历时的图形与文本状态
///
/// 跟踪 CTM、文本矩阵与字号，供位置估算使用。只建模本引擎
/// 关心的操作符子集。
pub(crate) struct GraphicsState {
    stack: Vec<[f32; 6]>,
    ctm: [f32; 6],
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    pub in_text: bool,
    pub font_size: f32,
}

impl GraphicsState {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            ctm: IDENTITY,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text: false,
            font_size: 12.0,
        }
    }

    /// 处理状态类操作符；文字显示操作符不在此处理
    pub fn track(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.stack.push(self.ctm),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.ctm = saved;
                }
            }
            "cm" if op.operands.len() >= 6 => {
                if let Some(m) = matrix_operands(&op.operands) {
                    self.ctm = concat_matrix(&m, &self.ctm);
                }
            }
            "BT" => {
                self.in_text = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tm" if op.operands.len() >= 6 => {
                if let Some(m) = matrix_operands(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "Td" | "TD" if op.operands.len() >= 2 => {
                if let (Some(tx), Some(ty)) =
                    (get_number(&op.operands[0]), get_number(&op.operands[1]))
                {
                    self.line_matrix[4] += tx;
                    self.line_matrix[5] += ty;
                    self.text_matrix = self.line_matrix;
                }
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Some(size) = get_number(&op.operands[1]) {
                    self.font_size = size.abs();
                }
            }
            _ => {}
        }
    }

    /// 当前文本起点在用户空间中的坐标
    pub fn text_origin(&self) -> (f32, f32) {
        let tm = &self.text_matrix;
        let ctm = &self.ctm;
        (
            ctm[0] * tm[4] + ctm[2] * tm[5] + ctm[4],
            ctm[1] * tm[4] + ctm[3] * tm[5] + ctm[5],
        )
    }
}

fn matrix_operands(operands: &[Object]) -> Option<[f32; 6]> {
    let mut m = [0.0f32; 6];
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = get_number(operands.get(i)?)?;
    }
    Some(m)
}

/// PDF 矩阵左乘：m 先作用，再作用 ctm
fn concat_matrix(m: &[f32; 6], ctm: &[f32; 6]) -> [f32; 6] {
    [
        ctm[0] * m[0] + ctm[2] * m[1],
        ctm[1] * m[0] + ctm[3] * m[1],
        ctm[0] * m[2] + ctm[2] * m[3],
        ctm[1] * m[2] + ctm[3] * m[3],
        ctm[0] * m[4] + ctm[2] * m[5] + ctm[4],
        ctm[1] * m[4] + ctm[3] * m[5] + ctm[5],
    ]
}

/// 估算单字符宽度
pub(crate) fn estimate_char_width(byte: u8, font_size: f32) -> f32 {
    if byte < 128 {
        font_size * 0.55
    } else {
        font_size
    }
}

/// 估算文字宽度
pub(crate) fn estimate_text_width(text: &[u8], font_size: f32) -> f32 {
    text.iter()
        .map(|&b| estimate_char_width(b, font_size))
        .sum()
}

/// 检查单个字符是否落在任何遮蔽区域内
fn char_in_mask(char_x: f32, char_y: f32, char_width: f32, font_size: f32, masks: &[MaskRect]) -> bool {
    let char_height = font_size.abs().max(12.0);
    masks
        .iter()
        .any(|m| m.intersects_text_bbox(char_x, char_y, char_width, char_height))
}

/// 字符级移除：落在遮蔽区域内的字符替换为空格
///
/// 空格保持后续字符的排版位置不变，同时让被移除的内容无法复制。
fn redact_text_chars(
    text: &[u8],
    start_x: f32,
    start_y: f32,
    font_size: f32,
    masks: &[MaskRect],
) -> (Vec<u8>, bool) {
    let mut result = Vec::with_capacity(text.len());
    let mut current_x = start_x;
    let mut any_redacted = false;

    for &byte in text {
        let char_width = estimate_char_width(byte, font_size);
        if char_in_mask(current_x, start_y, char_width, font_size, masks) {
            result.push(b' ');
            any_redacted = true;
        } else {
            result.push(byte);
        }
        current_x += char_width;
    }

    (result, any_redacted)
}

/// 改写内容流，移除遮蔽区域内的文字
fn strip_masked_text(content_data: &[u8], masks: &[MaskRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data).map_err(|e| anyhow!("解码内容流失败: {}", e))?;

    let mut state = GraphicsState::new();
    let mut new_operations: Vec<Operation> = Vec::with_capacity(content.operations.len());
    let mut removed_chars = 0usize;

    for op in content.operations {
        state.track(&op);

        match op.operator.as_str() {
            "Tj" | "'" if state.in_text => {
                let (x, y) = state.text_origin();
                let (bytes, format) = if let Some(Object::String(s, fmt)) = op.operands.first() {
                    (s.clone(), *fmt)
                } else {
                    (Vec::new(), lopdf::StringFormat::Literal)
                };

                let (redacted, changed) = redact_text_chars(&bytes, x, y, state.font_size, masks);
                if changed {
                    removed_chars += count_changed(&bytes, &redacted);
                    let operator = op.operator.clone();
                    new_operations.push(Operation::new(
                        &operator,
                        vec![Object::String(redacted, format)],
                    ));
                } else {
                    new_operations.push(op);
                }
            }
            "\"" if state.in_text && op.operands.len() >= 3 => {
                let (x, y) = state.text_origin();
                let (bytes, format) = if let Object::String(s, fmt) = &op.operands[2] {
                    (s.clone(), *fmt)
                } else {
                    (Vec::new(), lopdf::StringFormat::Literal)
                };

                let (redacted, changed) = redact_text_chars(&bytes, x, y, state.font_size, masks);
                if changed {
                    removed_chars += count_changed(&bytes, &redacted);
                    let mut operands = op.operands.clone();
                    operands[2] = Object::String(redacted, format);
                    new_operations.push(Operation::new("\"", operands));
                } else {
                    new_operations.push(op);
                }
            }
            "TJ" if state.in_text => {
                let (start_x, y) = state.text_origin();
                let mut current_x = start_x;
                let mut new_array: Vec<Object> = Vec::new();
                let mut any_redacted = false;

                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, format) => {
                                let (redacted, changed) = redact_text_chars(
                                    bytes,
                                    current_x,
                                    y,
                                    state.font_size,
                                    masks,
                                );
                                if changed {
                                    any_redacted = true;
                                    removed_chars += count_changed(bytes, &redacted);
                                }
                                current_x += estimate_text_width(bytes, state.font_size);
                                new_array.push(Object::String(redacted, *format));
                            }
                            Object::Integer(n) => {
                                current_x -= (*n as f32) / 1000.0 * state.font_size;
                                new_array.push(item.clone());
                            }
                            Object::Real(n) => {
                                current_x -= n / 1000.0 * state.font_size;
                                new_array.push(item.clone());
                            }
                            _ => new_array.push(item.clone()),
                        }
                    }
                }

                if any_redacted {
                    new_operations.push(Operation::new("TJ", vec![Object::Array(new_array)]));
                } else {
                    new_operations.push(op);
                }
            }
            _ => new_operations.push(op),
        }
    }

    if removed_chars > 0 {
        log::debug!("[Redact] 内容流移除 {} 个字符", removed_chars);
    }

    let new_content = Content {
        operations: new_operations,
    };
    new_content.encode().map_err(|e| anyhow!("编码内容流失败: {}", e))
}

fn count_changed(before: &[u8], after: &[u8]) -> usize {
    before
        .iter()
        .zip(after.iter())
        .filter(|(a, b)| a != b)
        .count()
}

/// 在内容流末尾追加不透明黑色矩形
fn draw_opaque_marks(content_data: &[u8], masks: &[MaskRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data).map_err(|e| anyhow!("解码内容流失败: {}", e))?;
    let mut new_operations = content.operations;

    new_operations.push(Operation::new("q", vec![]));

    // 填充与描边都置为纯黑，避免阅读器差异
    new_operations.push(Operation::new(
        "rg",
        vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
    ));
    new_operations.push(Operation::new(
        "RG",
        vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
    ));

    for rect in masks {
        new_operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ));
        new_operations.push(Operation::new("f", vec![]));
    }

    new_operations.push(Operation::new("Q", vec![]));

    let new_content = Content {
        operations: new_operations,
    };
    new_content.encode().map_err(|e| anyhow!("编码内容流失败: {}", e))
}

/// 落实一页的全部遮蔽
///
/// 该页所有遮蔽注册完后调用一次：改写内容流移除文字，叠加黑色
/// 标记，并用新流替换页面的 `Contents`。
pub(crate) fn commit_page(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    masks: &[MaskRect],
) -> Result<()> {
    let content_data = get_page_content(doc, page_id)?;

    let stripped = strip_masked_text(&content_data, masks)?;
    let marked = draw_opaque_marks(&stripped, masks)?;

    let stream = Stream::new(Dictionary::new(), marked);
    let stream_id = doc.add_object(stream);
    if let Ok(Object::Dictionary(ref mut dict)) = doc.get_object_mut(page_id) {
        dict.set(b"Contents", Object::Reference(stream_id));
    }

    Ok(())
}
