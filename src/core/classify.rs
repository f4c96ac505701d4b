use crate::core::index::{PhotoRecord, ReferenceIndex};
use crate::core::scanner::{CandidateFile, ExtensionFilter};
use crate::error::Result;
use futures::{Stream, StreamExt};
use serde::Serialize;

/// 分类结果
///
/// 相等的判定只看文件名和大小：内容不同但恰好同名同大小的文件会被当作已匹配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 参考目录中存在同名同大小的文件
    Matched(PhotoRecord),
    /// 存在同名文件，但大小都不相同
    SizeMismatch { reference_sizes: Vec<u64> },
    /// 参考目录中没有这个文件名
    Missing,
    /// 不是照片扩展名，只报告不处理
    Other,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Matched(_) => "matched",
            Classification::SizeMismatch { .. } => "size_mismatch",
            Classification::Missing => "missing",
            Classification::Other => "other",
        }
    }

    /// 是否需要归入 missing 目录
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Classification::SizeMismatch { .. } | Classification::Missing
        )
    }
}

/// 单个候选文件的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub candidate: CandidateFile,
    pub classification: Classification,
}

/// 对单个候选文件分类，只依赖候选文件本身和索引
///
/// 同名同大小的记录有多个时返回插入顺序中的第一个，具体是哪一个不作保证。
pub fn classify(
    candidate: &CandidateFile,
    index: &ReferenceIndex,
    filter: &ExtensionFilter,
) -> Classification {
    if !filter.matches(&candidate.basename) {
        return Classification::Other;
    }

    let Some(records) = index.get(&candidate.basename) else {
        return Classification::Missing;
    };

    if let Some(record) = index.find_match(&candidate.basename, candidate.size) {
        return Classification::Matched(record.clone());
    }

    let reference_sizes: Vec<u64> = records.iter().map(|r| r.size).collect();
    tracing::debug!(
        "文件大小不同: {} (候选={}, 参考={:?})",
        candidate.basename,
        candidate.size,
        reference_sizes
    );
    Classification::SizeMismatch { reference_sizes }
}

/// 惰性地为每个候选文件产出分类结果，不缓存候选列表
///
/// 来源产出的错误（例如单个文件不可读）原样传递给调用方。
pub fn reconcile<'a, S>(
    candidates: S,
    index: &'a ReferenceIndex,
    filter: &'a ExtensionFilter,
) -> impl Stream<Item = Result<ClassificationResult>> + 'a
where
    S: Stream<Item = Result<CandidateFile>> + 'a,
{
    candidates.map(move |item| {
        item.map(|candidate| {
            let classification = classify(&candidate, index, filter);
            ClassificationResult {
                candidate,
                classification,
            }
        })
    })
}

/// 分类统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub matched: u64,
    pub matched_bytes: u64,
    pub size_mismatch: u64,
    pub missing: u64,
    pub missing_bytes: u64,
    pub other: u64,
}

impl ClassificationSummary {
    pub fn record(&mut self, result: &ClassificationResult) {
        let size = result.candidate.size;
        match result.classification {
            Classification::Matched(_) => {
                self.matched += 1;
                self.matched_bytes += size;
            }
            Classification::SizeMismatch { .. } => {
                self.size_mismatch += 1;
                self.missing_bytes += size;
            }
            Classification::Missing => {
                self.missing += 1;
                self.missing_bytes += size;
            }
            Classification::Other => self.other += 1,
        }
    }

    pub fn total_files(&self) -> u64 {
        self.matched + self.size_mismatch + self.missing + self.other
    }
}
