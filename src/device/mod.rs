pub mod adb;

use crate::core::scanner::{CandidateFile, ExtensionFilter};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

pub use adb::AdbDevice;

/// Android 相机默认目录
pub const ANDROID_DCIM_PATH: &str = "/sdcard/DCIM/Camera";

/// 设备上的照片及其大小
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePhoto {
    pub path: String,
    pub size: u64,
}

/// 设备桥接接口
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// 递归列出目录下的照片路径
    async fn list_photos(&self, remote_path: &str) -> Result<Vec<String>>;

    /// 列出目录下的照片及大小
    async fn stat_photos(&self, remote_path: &str) -> Result<Vec<RemotePhoto>>;

    /// 复制设备上的文件到本地路径（设备上的文件保持不变）
    async fn pull(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// 设备名称（用于日志）
    fn name(&self) -> &str;
}

/// 解析 `stat -c %n@%s` 的输出，每行一个 `路径@大小`
///
/// 路径本身可能包含 '@'，因此按最后一个 '@' 拆分；格式错误的行记录警告后跳过。
pub fn parse_stat_output(output: &str) -> Vec<RemotePhoto> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parsed = line
                .rsplit_once('@')
                .and_then(|(path, size)| Some((path, size.trim().parse::<u64>().ok()?)))
                .filter(|(path, _)| !path.is_empty());
            match parsed {
                Some((path, size)) => Some(RemotePhoto {
                    path: path.to_string(),
                    size,
                }),
                None => {
                    warn!("无法解析 stat 输出行: {}", line);
                    None
                }
            }
        })
        .collect()
}

/// 从设备读取候选文件列表
///
/// 设备不可用时不视为致命错误：记录警告并返回错误，由调用方按零个候选处理。
pub async fn device_candidates(
    device: &dyn DeviceBridge,
    remote_path: &str,
    filter: &ExtensionFilter,
) -> Result<Vec<CandidateFile>> {
    info!("列出设备照片: {} {}", device.name(), remote_path);
    let photos = device.stat_photos(remote_path).await?;
    if photos.is_empty() {
        return Err(ReconcileError::DeviceUnavailable(format!(
            "{} 未返回任何照片: {}",
            device.name(),
            remote_path
        )));
    }

    let candidates: Vec<_> = photos
        .into_iter()
        .map(|p| CandidateFile::device(p.path, p.size))
        .collect();
    let photo_count = candidates.iter().filter(|c| filter.matches(&c.basename)).count();
    info!("设备照片: {} 个 (其中 {} 个匹配扩展名)", candidates.len(), photo_count);

    Ok(candidates)
}
