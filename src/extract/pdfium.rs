//! pdfium 提取后端（优先）
//!
//! 运行时动态绑定 pdfium 库，对多栏排版与复杂编码的还原度更好。
//! 库不存在时 `open` 直接失败，由适配层回退到 lopdf。

use super::{TextBackend, TextSource};
use anyhow::{anyhow, Result};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// 获取 pdfium 库的搜索路径
fn pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. 环境变量显式指定的目录
    if let Ok(dir) = std::env::var("SCRUB_PDFIUM_DIR") {
        paths.push(PathBuf::from(dir));
    }

    // 2. 可执行文件同级的 libs 目录及同级目录
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());
        }
    }

    // 3. 工作目录下的 libs
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// 尝试绑定 pdfium 库
pub(crate) fn bind_pdfium() -> Result<Pdfium> {
    for path in &pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(path);
        log::debug!("[Extract] 尝试加载 pdfium: {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Extract] 成功从 {:?} 加载 pdfium", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    // 最后尝试系统库
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| anyhow!("pdfium 库不可用: {}", e))
}

/// 版式感知的提取后端
pub struct PdfiumBackend;

impl PdfiumBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn TextSource>> {
        let pdfium = bind_pdfium()?;
        let path_str = path.to_string_lossy().to_string();

        // 先加载一次确认文件可解析，并取得结构页数
        let page_count = {
            let document = pdfium
                .load_pdf_from_file(path_str.as_str(), None)
                .map_err(|e| anyhow!("无法加载 PDF: {}", e))?;
            document.pages().len() as usize
        };

        Ok(Box::new(PdfiumSource {
            pdfium,
            path: path_str,
            page_count,
        }))
    }
}

/// pdfium 文档句柄
///
/// pdfium 的文档对象借用绑定实例，无法与其共存于同一结构体，
/// 因此每次取页文本时重新加载文档；pdfium 按需读取页面对象，
/// 不会整本载入内存。
struct PdfiumSource {
    pdfium: Pdfium,
    path: String,
    page_count: usize,
}

impl TextSource for PdfiumSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&mut self, index: usize) -> Result<Option<String>> {
        let document = self
            .pdfium
            .load_pdf_from_file(self.path.as_str(), None)
            .map_err(|e| anyhow!("无法加载 PDF: {}", e))?;

        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| anyhow!("获取页面 {} 失败: {}", index, e))?;

        let text = page
            .text()
            .map_err(|e| anyhow!("提取文本失败: {}", e))?
            .all();

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}
