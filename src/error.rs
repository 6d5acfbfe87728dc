//! 管线错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// 输入文件缺失、过短或魔数不符，在昂贵的提取开始前廉价检出
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 所有提取后端都失败，消息中拼接了每个后端的错误
    #[error("文本提取失败: {0}")]
    Extraction(String),

    /// 打开、搜索、注册遮蔽、落实或保存过程中的任何错误
    #[error("脱敏处理失败: {0}")]
    Redaction(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
