use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 扫描通道容量
const SCAN_CHANNEL_CAPACITY: usize = 256;

/// 照片扩展名集合（不区分大小写，不带点）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        Self {
            extensions: normalized,
        }
    }

    /// 文件名的扩展名是否属于照片集合
    pub fn matches(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl From<Vec<String>> for ExtensionFilter {
    fn from(extensions: Vec<String>) -> Self {
        Self::new(extensions)
    }
}

impl From<ExtensionFilter> for Vec<String> {
    fn from(filter: ExtensionFilter) -> Self {
        filter.extensions
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(["jpg", "mp4"])
    }
}

/// 候选文件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    /// 本地目录中的文件，处理时移动
    Local,
    /// 设备上的文件，处理时拉取副本
    Device,
}

/// 待分类的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub basename: String,
    pub full_path: String,
    pub size: u64,
    pub origin: CandidateOrigin,
}

impl CandidateFile {
    pub fn local(full_path: impl Into<String>, size: u64) -> Self {
        Self::with_origin(full_path.into(), size, CandidateOrigin::Local)
    }

    pub fn device(remote_path: impl Into<String>, size: u64) -> Self {
        Self::with_origin(remote_path.into(), size, CandidateOrigin::Device)
    }

    fn with_origin(full_path: String, size: u64, origin: CandidateOrigin) -> Self {
        // 设备路径始终使用 '/'，本地路径交给 Path 处理
        let basename = match origin {
            CandidateOrigin::Device => full_path.rsplit('/').next().unwrap_or_default().to_string(),
            CandidateOrigin::Local => Path::new(&full_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
        };
        Self {
            basename,
            full_path,
            size,
            origin,
        }
    }
}

/// 本地目录扫描器
pub struct FileScanner {
    exclude_dirs: Vec<PathBuf>,
    cancel: CancellationToken,
}

impl FileScanner {
    pub fn new() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 扫描时跳过的目录（例如位于源目录内部的输出目录）
    pub fn exclude_dir(mut self, dir: impl AsRef<Path>) -> Self {
        match std::fs::canonicalize(dir.as_ref()) {
            Ok(p) => self.exclude_dirs.push(p),
            Err(e) => debug!("忽略无法解析的排除目录 {:?}: {}", dir.as_ref(), e),
        }
        self
    }

    /// 扫描本地目录，逐个产出候选文件
    ///
    /// 根目录不可读时直接返回错误；遍历中途单个条目读取失败会作为 `Err` 项产出，不会中断扫描。
    pub fn scan(&self, root: &Path) -> Result<ReceiverStream<Result<CandidateFile>>> {
        let root = check_root(root)?;
        info!("开始扫描源目录: {}", root.display());

        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let exclude_dirs = self.exclude_dirs.clone();
        let cancel = self.cancel.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || {
            let walker = WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !exclude_dirs.iter().any(|x| e.path() == x));

            let mut sent = 0u64;
            for entry in walker {
                if cancel.is_cancelled() {
                    debug!("扫描已取消");
                    break;
                }

                let item = match entry {
                    Ok(entry) if !entry.file_type().is_file() => continue,
                    Ok(entry) => candidate_from_entry(&entry),
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                        warn!("跳过无法读取的条目 {}: {}", path.display(), e);
                        Err(ReconcileError::io(path, e.into()))
                    }
                };

                if tx.blocking_send(item).is_err() {
                    // 接收端已关闭
                    break;
                }
                sent += 1;
            }
            debug!("源目录扫描结束: {} 个条目", sent);
        });

        Ok(ReceiverStream::new(rx))
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// 检查根目录存在且可读，返回规范化路径
pub fn check_root(root: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(root).map_err(|e| ReconcileError::io(root, e))?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| ReconcileError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(ReconcileError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "不是目录"),
        ));
    }
    std::fs::read_dir(&canonical).map_err(|e| ReconcileError::io(root, e))?;
    Ok(canonical)
}

fn candidate_from_entry(entry: &walkdir::DirEntry) -> Result<CandidateFile> {
    let path = entry.path();
    let metadata = entry
        .metadata()
        .map_err(|e| ReconcileError::io(path, e.into()))?;
    let full_path = path.to_str().ok_or_else(|| {
        ReconcileError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "路径不是有效的 UTF-8"),
        )
    })?;
    Ok(CandidateFile::local(full_path, metadata.len()))
}
