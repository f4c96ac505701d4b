//! 运行配置
//!
//! 所有配置都来自命令行参数（adb 路径可由环境变量提供），不读取配置文件。

use crate::core::relocate::CollisionPolicy;
use crate::core::scanner::ExtensionFilter;
use crate::device::ANDROID_DCIM_PATH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 设备来源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// adb 可执行文件
    #[serde(default = "default_adb_path")]
    pub adb_path: PathBuf,
    /// 设备序列号，连接多台设备时需要
    #[serde(default)]
    pub serial: Option<String>,
    /// 设备上的照片目录
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    /// 是否把设备上缺失的照片拉取到 missing 目录
    #[serde(default)]
    pub pull_missing: bool,
}

fn default_adb_path() -> PathBuf {
    PathBuf::from("adb")
}

fn default_remote_path() -> String {
    ANDROID_DCIM_PATH.to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
            remote_path: default_remote_path(),
            pull_missing: false,
        }
    }
}

/// 对账配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    /// 候选文件目录（其中的文件会被移动）
    pub src_dir: PathBuf,
    /// 参考目录（只读）
    pub dst_dir: PathBuf,
    /// 输出目录
    pub sync_dir: PathBuf,
    /// 照片扩展名
    #[serde(default)]
    pub extensions: ExtensionFilter,
    #[serde(default)]
    pub collision: CollisionPolicy,
    #[serde(default)]
    pub dry_run: bool,
    /// 设置后同时对设备上的照片对账
    #[serde(default)]
    pub device: Option<DeviceConfig>,
}

impl ReconcileConfig {
    pub fn new(
        src_dir: impl Into<PathBuf>,
        dst_dir: impl Into<PathBuf>,
        sync_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            src_dir: src_dir.into(),
            dst_dir: dst_dir.into(),
            sync_dir: sync_dir.into(),
            extensions: ExtensionFilter::default(),
            collision: CollisionPolicy::default(),
            dry_run: false,
            device: None,
        }
    }
}
