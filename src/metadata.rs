//! 输出文件元信息标记
//!
//! 在脱敏产物的 Info 字典中写入处理工具与处理时间。

use chrono::Local;
use lopdf::{Document, Object, StringFormat};

/// 工具签名
const PRODUCER: &str = concat!("pdfscrub v", env!("CARGO_PKG_VERSION"));

/// 在 Info 字典中标记文档已脱敏
pub(crate) fn stamp_redaction_info(doc: &mut Document) {
    // 获取或创建 Info 字典
    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => *id,
        _ => {
            let new_id = doc.add_object(Object::Dictionary(lopdf::Dictionary::new()));
            doc.trailer.set(b"Info", Object::Reference(new_id));
            new_id
        }
    };

    // PDF 日期格式 D:YYYYMMDDHHmmSS+zz
    let pdf_date = format!("D:{}", Local::now().format("%Y%m%d%H%M%S%z"));

    if let Ok(Object::Dictionary(ref mut info_dict)) = doc.get_object_mut(info_id) {
        info_dict.set(
            b"Producer",
            Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal),
        );
        info_dict.set(
            b"ModDate",
            Object::String(pdf_date.as_bytes().to_vec(), StringFormat::Literal),
        );
        info_dict.set(
            b"Redacted",
            Object::String(b"true".to_vec(), StringFormat::Literal),
        );
        info_dict.set(
            b"RedactedAt",
            Object::String(pdf_date.as_bytes().to_vec(), StringFormat::Literal),
        );
    }

    log::debug!("[Redact] 已写入脱敏元信息: {}", PRODUCER);
}
