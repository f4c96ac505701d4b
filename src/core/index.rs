//! 参考目录索引
//!
//! 整个参考目录只遍历一次，按文件名建立多值映射：同名文件（位于不同子目录）全部保留，
//! 匹配时再按大小逐个比较。同名文件很多时匹配会退化为线性扫描，对照片库的规模可以接受。

use crate::core::scanner::{check_root, ExtensionFilter};
use crate::error::{ReconcileError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 索引时刻的文件快照，之后文件变化不会反映到这里
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub path: PathBuf,
    pub size: u64,
}

/// 索引统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub files_indexed: u64,
    pub dirs_visited: u64,
    /// 追加到已有文件名下的记录数
    pub duplicate_names: u64,
    pub unreadable_entries: u64,
}

/// 文件名 -> 同名记录列表
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, Vec<PhotoRecord>>,
    stats: IndexStats,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 遍历参考目录建立索引
    ///
    /// 根目录不存在或不可读时返回错误；单个条目不可读只记录警告并跳过。
    pub fn build(root: &Path, filter: &ExtensionFilter) -> Result<Self> {
        let root = check_root(root)?;
        let start = Instant::now();
        info!("开始索引参考目录: {}", root.display());

        let mut index = Self::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    warn!("跳过无法读取的条目 {}: {}", path.display(), e);
                    index.stats.unreadable_entries += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                index.stats.dirs_visited += 1;
                debug!("索引目录: {}", entry.path().display());
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                warn!("跳过非 UTF-8 文件名: {}", entry.path().display());
                index.stats.unreadable_entries += 1;
                continue;
            };
            if !filter.matches(name) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    index.insert(
                        name.to_string(),
                        PhotoRecord {
                            path: entry.path().to_path_buf(),
                            size: metadata.len(),
                        },
                    );
                }
                Err(e) => {
                    let err = ReconcileError::io(entry.path(), e.into());
                    warn!("{}", err);
                    index.stats.unreadable_entries += 1;
                }
            }
        }

        info!(
            "已索引 {} 个文件名 ({} 个文件), 耗时 {:.1} 秒",
            index.len(),
            index.stats.files_indexed,
            start.elapsed().as_secs_f64()
        );
        info!(
            "{} 个目录已遍历, {} 个重复文件名, {} 个条目不可读",
            index.stats.dirs_visited, index.stats.duplicate_names, index.stats.unreadable_entries
        );

        Ok(index)
    }

    /// 追加记录，同名文件不会覆盖已有记录
    pub fn insert(&mut self, basename: String, record: PhotoRecord) {
        let records = self.entries.entry(basename).or_default();
        if !records.is_empty() {
            self.stats.duplicate_names += 1;
        }
        records.push(record);
        self.stats.files_indexed += 1;
    }

    pub fn get(&self, basename: &str) -> Option<&[PhotoRecord]> {
        self.entries.get(basename).map(Vec::as_slice)
    }

    pub fn contains(&self, basename: &str) -> bool {
        self.entries.contains_key(basename)
    }

    /// 按大小查找同名记录，多个记录大小相同时返回其中任意一个
    pub fn find_match(&self, basename: &str, size: u64) -> Option<&PhotoRecord> {
        self.get(basename)?.iter().find(|r| r.size == size)
    }

    /// 不同文件名的数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 记录总数（含同名文件）
    pub fn record_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}
