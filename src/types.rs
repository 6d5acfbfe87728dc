use serde::{Deserialize, Serialize};

/// 敏感信息类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    /// 邮箱地址
    Email,
    /// 证件号（9 位，多种书写形式）
    NationalId,
}

/// 页面文本中的字符区间
///
/// 仅供上层展示参考，脱敏定位不依赖它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// 一条敏感信息命中记录
///
/// `value` 保留命中原文，不做任何规范化，脱敏阶段按字面值搜索。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: PiiKind,
    pub value: String,
    /// 页码，从 1 开始
    pub page: u32,
    #[serde(rename = "position", skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// 操作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Success,
    Error,
}

/// 扫描结果
///
/// 每次扫描构造一次，返回后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub status: PipelineStatus,
    pub findings: Vec<Finding>,
    pub total_pages: usize,
    pub file_size: u64,
    pub findings_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub(crate) fn success(findings: Vec<Finding>, total_pages: usize, file_size: u64) -> Self {
        Self {
            status: PipelineStatus::Success,
            findings_count: findings.len(),
            findings,
            total_pages,
            file_size,
            error: None,
        }
    }

    pub(crate) fn failure(message: String, file_size: u64) -> Self {
        Self {
            status: PipelineStatus::Error,
            findings: Vec::new(),
            total_pages: 0,
            file_size,
            findings_count: 0,
            error: Some(message),
        }
    }
}

/// 脱敏结果
///
/// `redacted_count` 统计落实的遮蔽实例数：一条 Finding 的值在页面上
/// 出现多次时会产生多个遮蔽。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionResult {
    pub status: PipelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub redacted_count: usize,
    pub original_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 扫描加脱敏的组合结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAndRedactResult {
    #[serde(flatten)]
    pub scan: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction: Option<RedactionOutcome>,
}

/// 脱敏环节的去向：实际执行，或确认无需执行
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RedactionOutcome {
    Applied(RedactionResult),
    Skipped { status: String, message: String },
}

impl RedactionOutcome {
    pub(crate) fn not_needed() -> Self {
        Self::Skipped {
            status: "no_redaction_needed".to_string(),
            message: "No sensitive data found to redact".to_string(),
        }
    }
}

/// 文件基本信息（不含内容扫描）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_size: u64,
    pub total_pages: usize,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// PDF 用户空间中的遮蔽矩形（单位 pt）
#[derive(Debug, Clone, Copy)]
pub struct MaskRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MaskRect {
    /// 检查文字边界框是否与遮蔽区域相交
    pub fn intersects_text_bbox(
        &self,
        text_x: f32,
        text_y: f32,
        text_width: f32,
        text_height: f32,
    ) -> bool {
        let text_left = text_x;
        let text_right = text_x + text_width;
        let text_bottom = text_y;
        let text_top = text_y + text_height;

        let margin: f32 = 5.0;
        let mask_left = self.x - margin;
        let mask_right = self.x + self.width + margin;
        let mask_bottom = self.y - margin;
        let mask_top = self.y + self.height + margin;

        let x_overlap = text_left < mask_right && text_right > mask_left;
        let y_overlap = text_bottom < mask_top && text_top > mask_bottom;

        x_overlap && y_overlap
    }
}
