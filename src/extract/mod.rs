//! 文本提取适配层
//!
//! 以固定优先级尝试多个提取后端：版式感知的 pdfium 优先，失败后
//! 整体放弃，由调用方换用 lopdf 后端从第 1 页重新提取。后端句柄
//! 的生命周期限定在一次扫描调用内，退出路径上必然释放。

pub mod fallback;
pub mod pdfium;

use anyhow::Result;
use std::path::Path;

/// 文本提取后端
///
/// 所有后端都实现该 trait，扫描流程只依赖这一接口。
pub trait TextBackend: Send + Sync {
    /// 后端名称，用于日志与错误拼接
    fn name(&self) -> &'static str;

    /// 打开文档，返回可按页取文本的句柄
    fn open(&self, path: &Path) -> Result<Box<dyn TextSource>>;
}

/// 已打开文档的按页文本视图
pub trait TextSource {
    /// 结构页数（可能大于有可提取文本的页数）
    fn page_count(&self) -> usize;

    /// 提取指定页（0 起）的文本
    ///
    /// 图片页、空白页返回 `None`，不算错误；任何 `Err` 都意味着
    /// 该后端整体不可用。
    fn page_text(&mut self, index: usize) -> Result<Option<String>>;
}

/// 默认后端优先级列表
pub fn default_backends() -> Vec<Box<dyn TextBackend>> {
    vec![
        Box::new(pdfium::PdfiumBackend::new()),
        Box::new(fallback::LopdfBackend::new()),
    ]
}
