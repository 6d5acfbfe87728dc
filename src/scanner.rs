//! 批量扫描器
//!
//! 驱动提取后端按页产出文本，交给规则集分类，并以固定批大小
//! 处理页面：页文本在本页处理完即释放，批内命中在批结束时并入
//! 总表，任何中间缓冲都不跨批保留，以约束超大文档下的峰值内存。

use crate::error::{PipelineError, Result};
use crate::extract::{default_backends, TextBackend};
use crate::patterns::PatternSet;
use crate::redact::RedactConfig;
use crate::types::{FileInfo, Finding, PiiKind, ScanResult};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;

/// PDF 魔数
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 每批处理的页数
    ///
    /// 只影响内存行为，不影响检测结果。5 是针对数百页文档
    /// 实测得到的经验值。
    pub batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { batch_size: 5 }
    }
}

/// 扫描器
///
/// 由调用方显式构造并持有；内部只有编译好的规则集、后端优先级
/// 列表与配置，没有跨调用的可变状态，可在工作线程间共享。每次
/// `scan` 调用独占自己的文档句柄，调用结束即释放。
pub struct PdfScanner {
    pub(crate) patterns: PatternSet,
    pub(crate) backends: Vec<Box<dyn TextBackend>>,
    pub(crate) config: ScanConfig,
    pub(crate) redact_config: RedactConfig,
}

impl PdfScanner {
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self::with_backends(default_backends(), config)
    }

    /// 用自定义后端列表构造，按给定顺序作为优先级尝试
    pub fn with_backends(backends: Vec<Box<dyn TextBackend>>, config: ScanConfig) -> Self {
        Self {
            patterns: PatternSet::new(),
            backends,
            config,
            redact_config: RedactConfig::default(),
        }
    }

    /// 扫描 PDF 中的敏感信息
    ///
    /// 任何内部故障都转换为 status 为 error 的结果返回，
    /// 不向调用方抛出。
    pub fn scan(&self, path: impl AsRef<Path>) -> ScanResult {
        let path = path.as_ref();
        let file_size = file_size_of(path);

        match self.scan_raw(path) {
            Ok(raw) => {
                let findings = dedup_findings(raw.findings);
                log::info!(
                    "[Scanner] 扫描完成: {} 页, {} 条去重命中",
                    raw.total_pages,
                    findings.len()
                );
                ScanResult::success(findings, raw.total_pages, file_size)
            }
            Err(e) => {
                log::warn!("[Scanner] 扫描失败: {}", e);
                ScanResult::failure(e.to_string(), file_size)
            }
        }
    }

    /// 原始扫描：返回未去重的逐页命中与结构页数
    pub(crate) fn scan_raw(&self, path: &Path) -> Result<RawScan> {
        check_pdf_magic(path)?;

        let mut backend_errors: Vec<String> = Vec::new();
        for backend in &self.backends {
            match self.scan_with_backend(backend.as_ref(), path) {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    // 不做部分恢复：整体放弃该后端，换下一个从第 1 页重来
                    log::warn!("[Scanner] 后端 {} 失败: {}", backend.name(), e);
                    backend_errors.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        Err(PipelineError::Extraction(backend_errors.join("; ")))
    }

    fn scan_with_backend(&self, backend: &dyn TextBackend, path: &Path) -> anyhow::Result<RawScan> {
        let mut source = backend.open(path)?;
        let total_pages = source.page_count();
        log::info!("[Scanner] 使用后端 {}, 共 {} 页", backend.name(), total_pages);

        let batch_size = self.config.batch_size.max(1);
        let mut findings = Vec::new();
        let mut start = 0usize;

        while start < total_pages {
            let end = (start + batch_size).min(total_pages);

            let mut batch_findings = Vec::new();
            for page_idx in start..end {
                // 页文本只活到本次迭代结束
                if let Some(text) = source.page_text(page_idx)? {
                    log_page_text(page_idx, &text);
                    batch_findings.extend(self.patterns.classify(&text, (page_idx + 1) as u32));
                }
            }
            findings.append(&mut batch_findings);

            start = end;
        }

        Ok(RawScan {
            findings,
            total_pages,
        })
    }

    /// 文件基本信息（不做内容扫描）
    pub fn file_info(&self, path: impl AsRef<Path>) -> FileInfo {
        let path = path.as_ref();
        if !path.exists() {
            return FileInfo {
                file_size: 0,
                total_pages: 0,
                is_valid: false,
                error: Some("文件不存在".to_string()),
            };
        }

        let file_size = file_size_of(path);
        let mut errors = Vec::new();
        for backend in &self.backends {
            match backend.open(path) {
                Ok(source) => {
                    return FileInfo {
                        file_size,
                        total_pages: source.page_count(),
                        is_valid: true,
                        error: None,
                    }
                }
                Err(e) => errors.push(format!("{}: {}", backend.name(), e)),
            }
        }

        FileInfo {
            file_size,
            total_pages: 0,
            is_valid: false,
            error: Some(errors.join("; ")),
        }
    }
}

impl Default for PdfScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次提取遍历的原始产出
pub(crate) struct RawScan {
    pub findings: Vec<Finding>,
    pub total_pages: usize,
}

/// 校验文件是否为有效的 PDF（只看魔数）
pub fn is_valid_pdf(path: impl AsRef<Path>) -> bool {
    check_pdf_magic(path.as_ref()).is_ok()
}

/// 魔数检查，在昂贵的提取开始前廉价失败
fn check_pdf_magic(path: &Path) -> Result<()> {
    let mut file = fs::File::open(path)
        .map_err(|e| PipelineError::InvalidInput(format!("无法打开文件: {}", e)))?;

    let mut header = [0u8; 4];
    file.read_exact(&mut header)
        .map_err(|_| PipelineError::InvalidInput("文件过短, 不是有效的 PDF".to_string()))?;

    if &header != PDF_MAGIC {
        return Err(PipelineError::InvalidInput(
            "文件头不是 %PDF, 不是有效的 PDF".to_string(),
        ));
    }
    Ok(())
}

/// 按 (kind, value) 去重，保留首次出现的顺序与页码
pub(crate) fn dedup_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen: HashSet<(PiiKind, String)> = HashSet::new();
    let mut unique = Vec::new();
    for finding in findings {
        if seen.insert((finding.kind, finding.value.clone())) {
            unique.push(finding);
        }
    }
    unique
}

fn file_size_of(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn log_page_text(page_idx: usize, text: &str) {
    log::debug!("[Scanner] 页 {} 提取到文本长度: {}", page_idx + 1, text.len());
    if should_log_full_text() {
        log::debug!("[Scanner] 文本全文: {:?}", text);
    }
}

fn should_log_full_text() -> bool {
    match std::env::var("SCRUB_LOG_FULL_TEXT") {
        Ok(val) => {
            let val = val.to_ascii_lowercase();
            val == "1" || val == "true" || val == "yes"
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(kind: PiiKind, value: &str, page: u32) -> Finding {
        Finding {
            kind,
            value: value.to_string(),
            page,
            span: None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let findings = vec![
            finding(PiiKind::Email, "a@b.com", 2),
            finding(PiiKind::Email, "a@b.com", 5),
            finding(PiiKind::NationalId, "123-45-6789", 3),
        ];
        let unique = dedup_findings(findings);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].page, 2);
        assert_eq!(unique[1].value, "123-45-6789");
    }

    #[test]
    fn test_dedup_same_value_different_kind() {
        // 同一字面值、不同类别不合并
        let findings = vec![
            finding(PiiKind::Email, "x", 1),
            finding(PiiKind::NationalId, "x", 1),
        ];
        assert_eq!(dedup_findings(findings).len(), 2);
    }

    #[test]
    fn test_default_batch_size() {
        assert_eq!(ScanConfig::default().batch_size, 5);
    }
}
