//! 文件归档：把分类后的文件移动到同步目录
//!
//! - 已匹配: `<sync_dir>/<文件名>`
//! - 缺失且能提取日期: `<sync_dir>/missing/<YYYY-MM>/<文件名>`
//! - 缺失且无日期: `<sync_dir>/missing/<文件名>`
//!
//! 目标位置已有同名文件时从不覆盖，按 [`CollisionPolicy`] 处理。

use crate::core::classify::{Classification, ClassificationResult};
use crate::core::date::extract_date;
use crate::core::scanner::CandidateOrigin;
use crate::device::DeviceBridge;
use crate::error::{ReconcileError, Result};
use scopeguard::ScopeGuard;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// 缺失文件的子目录名
pub const MISSING_DIR: &str = "missing";

/// 重命名时尝试的最大序号
const MAX_RENAME_ATTEMPTS: u32 = 999;

/// 目标文件已存在时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// 报错，源文件保持不动
    #[default]
    Fail,
    /// 追加序号 `_1`, `_2` ... 后移动
    Rename,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionPolicy::Fail => write!(f, "fail"),
            CollisionPolicy::Rename => write!(f, "rename"),
        }
    }
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationOutcome {
    /// 已移动到目标位置
    Moved { dest: PathBuf },
    /// 目标重名，移动到追加序号的新文件名
    Renamed { dest: PathBuf },
    /// 从设备拉取了副本
    Pulled { dest: PathBuf },
    /// 未做任何文件操作
    Skipped { reason: &'static str },
}

/// 文件归档器
pub struct Relocator {
    sync_dir: PathBuf,
    policy: CollisionPolicy,
    dry_run: bool,
    device: Option<Arc<dyn DeviceBridge>>,
    pull_missing: bool,
}

impl Relocator {
    pub fn new(sync_dir: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            sync_dir: sync_dir.into(),
            policy,
            dry_run: false,
            device: None,
            pull_missing: false,
        }
    }

    /// 只计算目标位置，不修改文件系统
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 设置设备桥接，`pull_missing` 为 true 时把设备上缺失的照片拉取到 missing 目录
    pub fn with_device(mut self, device: Arc<dyn DeviceBridge>, pull_missing: bool) -> Self {
        self.device = Some(device);
        self.pull_missing = pull_missing;
        self
    }

    /// 分类对应的目标目录，`Other` 不移动
    pub fn destination_dir(&self, result: &ClassificationResult) -> Option<PathBuf> {
        match &result.classification {
            Classification::Matched(_) => Some(self.sync_dir.clone()),
            Classification::SizeMismatch { .. } | Classification::Missing => {
                let missing = self.sync_dir.join(MISSING_DIR);
                Some(match extract_date(&result.candidate.basename) {
                    Some(date) => missing.join(date.bucket()),
                    None => missing,
                })
            }
            Classification::Other => None,
        }
    }

    /// 按分类处理单个文件
    pub async fn relocate(&self, result: &ClassificationResult) -> Result<RelocationOutcome> {
        let candidate = &result.candidate;
        let Some(dir) = self.destination_dir(result) else {
            debug!("非照片文件，跳过: {}", candidate.full_path);
            return Ok(RelocationOutcome::Skipped { reason: "other" });
        };

        if candidate.origin == CandidateOrigin::Device {
            if matches!(result.classification, Classification::Matched(_)) {
                return Ok(RelocationOutcome::Skipped {
                    reason: "already_synced",
                });
            }
            if !self.pull_missing {
                return Ok(RelocationOutcome::Skipped {
                    reason: "pull_disabled",
                });
            }
        }

        let from = PathBuf::from(&candidate.full_path);
        let target = dir.join(&candidate.basename);

        // 设备上的文件不会被移走，之前拉取过的同大小副本视为已处理
        if candidate.origin == CandidateOrigin::Device {
            if let Ok(meta) = fs::metadata(&target).await {
                if meta.is_file() && meta.len() == candidate.size {
                    debug!("已拉取过: {}", target.display());
                    return Ok(RelocationOutcome::Skipped {
                        reason: "already_pulled",
                    });
                }
            }
        }

        if self.dry_run {
            info!(
                "[dry-run] {} {} -> {}",
                result.classification.label(),
                candidate.full_path,
                target.display()
            );
            return Ok(RelocationOutcome::Skipped { reason: "dry_run" });
        }

        // create_dir_all 对已存在的目录直接返回成功
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReconcileError::Relocation {
                from: from.clone(),
                to: dir.clone(),
                source: e,
            })?;

        let (dest, renamed) = self.resolve_collision(&from, target).await?;

        match candidate.origin {
            CandidateOrigin::Local => {
                move_file(&from, &dest).await?;
                debug!("移动: {} -> {}", from.display(), dest.display());
                Ok(if renamed {
                    RelocationOutcome::Renamed { dest }
                } else {
                    RelocationOutcome::Moved { dest }
                })
            }
            CandidateOrigin::Device => {
                let device = self.device.as_ref().ok_or_else(|| {
                    ReconcileError::DeviceUnavailable("未配置设备桥接".to_string())
                })?;
                if let Err(e) = device.pull(&candidate.full_path, &dest).await {
                    // 清理可能残留的不完整文件
                    let _ = fs::remove_file(&dest).await;
                    return Err(match e {
                        ReconcileError::Relocation { .. } | ReconcileError::Cancelled => e,
                        other => ReconcileError::Relocation {
                            from,
                            to: dest,
                            source: io::Error::other(other.to_string()),
                        },
                    });
                }
                debug!("拉取: {} -> {}", candidate.full_path, dest.display());
                Ok(RelocationOutcome::Pulled { dest })
            }
        }
    }

    /// 返回实际写入的路径，以及是否因重名而改名
    async fn resolve_collision(&self, from: &Path, target: PathBuf) -> Result<(PathBuf, bool)> {
        if !path_exists(from, &target).await? {
            return Ok((target, false));
        }

        match self.policy {
            CollisionPolicy::Fail => Err(ReconcileError::Collision {
                from: from.to_path_buf(),
                to: target,
            }),
            CollisionPolicy::Rename => {
                for n in 1..=MAX_RENAME_ATTEMPTS {
                    let alt = numbered_name(&target, n);
                    if !path_exists(from, &alt).await? {
                        info!("目标已存在，改名为: {}", alt.display());
                        return Ok((alt, true));
                    }
                }
                Err(ReconcileError::Collision {
                    from: from.to_path_buf(),
                    to: target,
                })
            }
        }
    }
}

async fn path_exists(from: &Path, path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| ReconcileError::Relocation {
            from: from.to_path_buf(),
            to: path.to_path_buf(),
            source: e,
        })
}

/// `a.jpg` -> `a_1.jpg`，无扩展名时直接追加
fn numbered_name(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// 移动文件，目标必须不存在
///
/// 先尝试 rename，只有跨文件系统时才改为复制后删除源文件。
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let relocation_err = |source: io::Error| ReconcileError::Relocation {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("跨文件系统移动，改用复制: {}", from.display());
            copy_then_remove(from, to).await.map_err(relocation_err)
        }
        Err(e) => Err(relocation_err(e)),
    }
}

async fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    copy_then_remove_with(from, to, |p: PathBuf| fs::remove_file(p)).await
}

/// 复制到目标后用 `remove` 删除源文件
///
/// 任何一步失败都会删除已写入的目标文件，源文件保持原样。
async fn copy_then_remove_with<F, Fut>(from: &Path, to: &Path, remove: F) -> io::Result<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut src = fs::File::open(from).await?;
    let modified = src.metadata().await?.modified().ok();

    let mut dst = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .await?;

    // 源文件删除成功之前，目标文件都视为不完整
    let partial = scopeguard::guard(to.to_path_buf(), |p| {
        let _ = std::fs::remove_file(p);
    });

    tokio::io::copy(&mut src, &mut dst).await?;
    dst.sync_all().await?;
    if let Some(modified) = modified {
        let dst = dst.into_std().await;
        let _ = dst.set_modified(modified);
    }
    drop(src);

    remove(from.to_path_buf()).await?;
    ScopeGuard::into_inner(partial);
    Ok(())
}
