//! PDF 敏感信息扫描与脱敏引擎
//!
//! 核心管线：有界内存的按页文本提取（pdfium 优先、lopdf 保底的
//! 双后端回退）、基于规则的敏感信息检测（邮箱、证件号）、命中
//! 去重，以及按页落实的不可逆脱敏（字符级移除加不透明黑色标记）。
//!
//! 两个公开操作 [`PdfScanner::scan`] 与 [`PdfScanner::scan_and_redact`]
//! 从不向外抛错：所有内部故障都折叠为带 status 字段的结果。
//! HTTP 接口、结果持久化、指标采集与任务调度由上层调用方负责，
//! 管线本身单线程同步执行，并发由调用方的工作线程池施加。

pub mod error;
pub mod extract;
pub mod patterns;
pub mod redact;
pub mod scanner;
pub mod types;

mod metadata;
mod utils;

pub use error::PipelineError;
pub use patterns::PatternSet;
pub use redact::RedactConfig;
pub use scanner::{is_valid_pdf, PdfScanner, ScanConfig};
pub use types::{
    FileInfo, Finding, PiiKind, PipelineStatus, RedactionOutcome, RedactionResult,
    ScanAndRedactResult, ScanResult, Span,
};
