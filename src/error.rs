//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

/// 对账过程中的错误
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// 目录或文件不可读
    #[error("无法读取 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 单个文件移动失败
    #[error("移动失败 {from} -> {to}: {source}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 目标位置已存在同名文件
    #[error("目标文件已存在: {to} (源文件 {from} 保持不动)")]
    Collision { from: PathBuf, to: PathBuf },

    /// 设备桥接命令失败
    #[error("设备不可用: {0}")]
    DeviceUnavailable(String),

    #[error("操作已取消")]
    Cancelled,
}

impl ReconcileError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 报告中使用的错误分类名
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Io { .. } => "io",
            ReconcileError::Relocation { .. } => "relocation",
            ReconcileError::Collision { .. } => "collision",
            ReconcileError::DeviceUnavailable(_) => "device_unavailable",
            ReconcileError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_message() {
        let err = ReconcileError::Collision {
            from: PathBuf::from("/src/a.jpg"),
            to: PathBuf::from("/sync/a.jpg"),
        };
        assert_eq!(err.kind(), "collision");
        assert!(err.to_string().contains("/sync/a.jpg"));

        let err = ReconcileError::io("/missing", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("/missing"));
    }
}
