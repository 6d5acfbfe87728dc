//! 脱敏引擎
//!
//! 用支持结构修改的 lopdf 后端独立打开文档（与扫描用的提取句柄
//! 互不共享），把 Finding 按页聚合，为每个字面值搜索页面上的全部
//! 实例并注册黑色遮蔽，然后逐页一次性落实：底层文字被真正移除，
//! 而非仅被覆盖。产物序列化到输出路径。

mod content;
mod locate;

use crate::error::PipelineError;
use crate::scanner::{dedup_findings, PdfScanner};
use crate::types::{
    Finding, PiiKind, PipelineStatus, RedactionOutcome, RedactionResult, ScanAndRedactResult,
    ScanResult,
};
use crate::metadata;
use crate::utils::mask_snippet;
use lopdf::Document;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// 脱敏配置
#[derive(Debug, Clone)]
pub struct RedactConfig {
    /// 未指定输出路径时, 插入在扩展名之前的文件名后缀
    pub suffix: String,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            suffix: "_redacted".to_string(),
        }
    }
}

impl PdfScanner {
    /// 按给定的 Finding 列表生成脱敏副本
    ///
    /// Finding 可以来自刚完成的扫描，也可以由持久化存储重建。
    /// 一个值在页面上出现多次会产生多个遮蔽；某个值定位不到实例
    /// 不算错误。任何内部故障都转换为 status 为 error 的结果。
    pub fn redact(
        &self,
        path: impl AsRef<Path>,
        findings: &[Finding],
        output_path: Option<&Path>,
    ) -> RedactionResult {
        let path = path.as_ref();
        let original_file = path.display().to_string();

        match redact_inner(path, findings, output_path, &self.redact_config) {
            Ok((output, redacted_count)) => {
                log::info!(
                    "[Redact] 完成: {} 处遮蔽, 输出 {}",
                    redacted_count,
                    output.display()
                );
                RedactionResult {
                    status: PipelineStatus::Success,
                    file_size: fs::metadata(&output).ok().map(|m| m.len()),
                    output_path: Some(output.display().to_string()),
                    redacted_count,
                    original_file,
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("[Redact] 脱敏失败: {}", e);
                RedactionResult {
                    status: PipelineStatus::Error,
                    output_path: None,
                    redacted_count: 0,
                    original_file,
                    file_size: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// 扫描并脱敏
    ///
    /// 一次提取同时得到两个视图：全局去重的报告, 以及逐页完整的
    /// 脱敏输入——同一个值出现在多页时, 每一页都会被处理。扫描
    /// 失败原样返回；扫描成功但没有命中时跳过脱敏环节。
    pub fn scan_and_redact(
        &self,
        path: impl AsRef<Path>,
        output_path: Option<&Path>,
    ) -> ScanAndRedactResult {
        let path = path.as_ref();
        let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let raw = match self.scan_raw(path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("[Scanner] 扫描失败: {}", e);
                return ScanAndRedactResult {
                    scan: ScanResult::failure(e.to_string(), file_size),
                    redaction: None,
                };
            }
        };

        let per_page = dedup_per_page(&raw.findings);
        let scan = ScanResult::success(dedup_findings(raw.findings), raw.total_pages, file_size);

        if scan.findings.is_empty() {
            log::info!("[Redact] 无敏感信息, 跳过脱敏");
            return ScanAndRedactResult {
                scan,
                redaction: Some(RedactionOutcome::not_needed()),
            };
        }

        let redaction = self.redact(path, &per_page, output_path);
        ScanAndRedactResult {
            scan,
            redaction: Some(RedactionOutcome::Applied(redaction)),
        }
    }
}

fn redact_inner(
    path: &Path,
    findings: &[Finding],
    output_path: Option<&Path>,
    config: &RedactConfig,
) -> Result<(PathBuf, usize), PipelineError> {
    let output = match output_path {
        Some(p) => p.to_path_buf(),
        None => default_output_path(path, &config.suffix),
    };

    // 修改后端独立打开自己的句柄, 离开本函数即释放
    let mut doc = Document::load(path)
        .map_err(|e| PipelineError::Redaction(format!("无法加载 PDF: {}", e)))?;
    let page_ids: Vec<lopdf::ObjectId> = doc.page_iter().collect();

    // 1 起页码转 0 起索引, 按页聚合, 越界页直接忽略
    let mut by_page: BTreeMap<usize, Vec<&Finding>> = BTreeMap::new();
    for finding in findings {
        if finding.page == 0 {
            continue;
        }
        let page_idx = (finding.page - 1) as usize;
        if page_idx >= page_ids.len() {
            continue;
        }
        by_page.entry(page_idx).or_default().push(finding);
    }

    let mut redacted_count = 0usize;
    for (page_idx, page_findings) in &by_page {
        let page_id = page_ids[*page_idx];

        // 先注册该页全部遮蔽, 再一次性落实；落实按页批量进行,
        // 页级缓冲在本次迭代结束即释放
        let mut masks = Vec::new();
        for finding in page_findings {
            let instances =
                locate::locate_instances(&doc, path, page_id, *page_idx, &finding.value)
                    .map_err(|e| PipelineError::Redaction(e.to_string()))?;

            if instances.is_empty() {
                // 提取层与搜索层的切分差异, 容忍而非报错
                log::warn!(
                    "[Redact] 页 {} 未定位到实例: {}",
                    page_idx + 1,
                    mask_snippet(&finding.value)
                );
                continue;
            }

            redacted_count += instances.len();
            masks.extend(instances);
        }

        if masks.is_empty() {
            continue;
        }

        content::commit_page(&mut doc, page_id, &masks)
            .map_err(|e| PipelineError::Redaction(e.to_string()))?;
        log::info!("[Redact] 页 {} 落实 {} 处遮蔽", page_idx + 1, masks.len());
    }

    metadata::stamp_redaction_info(&mut doc);
    doc.compress();

    let mut file = fs::File::create(&output)
        .map_err(|e| PipelineError::Redaction(format!("创建输出文件失败: {}", e)))?;
    doc.save_to(&mut file)
        .map_err(|e| PipelineError::Redaction(format!("保存失败: {}", e)))?;

    Ok((output, redacted_count))
}

/// 默认输出路径: 在扩展名之前插入后缀
fn default_output_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("pdf");
    path.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

/// 脱敏输入视图: 按 (kind, value, page) 去重
///
/// 与报告视图不同, 这里保留同一值在不同页上的记录, 保证每个
/// 出现过的页面都被处理。
fn dedup_per_page(findings: &[Finding]) -> Vec<Finding> {
    let mut seen: HashSet<(PiiKind, String, u32)> = HashSet::new();
    let mut result = Vec::new();
    for finding in findings {
        if seen.insert((finding.kind, finding.value.clone(), finding.page)) {
            result.push(finding.clone());
        }
    }
    result
}
