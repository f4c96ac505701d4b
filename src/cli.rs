//! 命令行参数

use crate::config::{DeviceConfig, ReconcileConfig};
use crate::core::relocate::CollisionPolicy;
use crate::core::scanner::ExtensionFilter;
use crate::device::ANDROID_DCIM_PATH;
use crate::logging::LogConfig;
use clap::Parser;
use std::path::PathBuf;

/// 把源目录中的照片与参考照片库对账：已存在的移到同步目录，缺失的按拍摄年月归档到 missing 目录
#[derive(Debug, Parser)]
#[command(name = "photosync", version)]
pub struct Cli {
    /// 源目录，其中的文件会被移动
    pub src_dir: PathBuf,

    /// 参考目录（照片库），只读
    pub dst_dir: PathBuf,

    /// 同步输出目录
    pub sync_dir: PathBuf,

    /// 照片扩展名，可重复指定
    #[arg(long = "ext", value_name = "EXT", default_values = ["jpg", "mp4"])]
    pub extensions: Vec<String>,

    /// 目标文件已存在时的处理方式
    #[arg(long, value_enum, default_value_t = CollisionPolicy::Fail)]
    pub on_collision: CollisionPolicy,

    /// 只分类和报告，不移动文件
    #[arg(long)]
    pub dry_run: bool,

    /// 同时对 Android 设备上的照片对账
    #[arg(long)]
    pub device: bool,

    /// adb 可执行文件
    #[arg(long = "adb", env = "PHOTOSYNC_ADB", default_value = "adb")]
    pub adb_path: PathBuf,

    /// adb 设备序列号
    #[arg(long)]
    pub serial: Option<String>,

    /// 设备上的照片目录
    #[arg(long, default_value = ANDROID_DCIM_PATH)]
    pub remote_path: String,

    /// 把设备上缺失的照片拉取到 missing 目录
    #[arg(long)]
    pub pull_missing: bool,

    /// 以 JSON 输出报告
    #[arg(long)]
    pub json: bool,

    /// 日志级别 (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// 日志文件目录，指定后同时写入文件
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// 日志文件大小上限（MB）
    #[arg(long, default_value_t = 5)]
    pub log_max_size_mb: u32,
}

impl Cli {
    pub fn reconcile_config(&self) -> ReconcileConfig {
        let mut config = ReconcileConfig::new(&self.src_dir, &self.dst_dir, &self.sync_dir);
        config.extensions = ExtensionFilter::new(&self.extensions);
        config.collision = self.on_collision;
        config.dry_run = self.dry_run;
        if self.device {
            config.device = Some(DeviceConfig {
                adb_path: self.adb_path.clone(),
                serial: self.serial.clone(),
                remote_path: self.remote_path.clone(),
                pull_missing: self.pull_missing,
            });
        }
        config
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.log_dir.is_some(),
            max_size_mb: self.log_max_size_mb,
            level: self.log_level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_three_positionals() {
        assert!(Cli::try_parse_from(["photosync", "/a", "/b"]).is_err());
        assert!(Cli::try_parse_from(["photosync"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["photosync", "/phone", "/photos", "/synced"]).unwrap();
        let config = cli.reconcile_config();

        assert_eq!(config.src_dir, PathBuf::from("/phone"));
        assert_eq!(config.dst_dir, PathBuf::from("/photos"));
        assert_eq!(config.sync_dir, PathBuf::from("/synced"));
        assert_eq!(config.extensions, ExtensionFilter::default());
        assert_eq!(config.collision, CollisionPolicy::Fail);
        assert!(!config.dry_run);
        assert!(config.device.is_none());
        assert!(!cli.log_config().enabled);
    }

    #[test]
    fn test_device_and_options() {
        let cli = Cli::try_parse_from([
            "photosync",
            "/phone",
            "/photos",
            "/synced",
            "--ext",
            "JPG",
            "--ext",
            ".heic",
            "--on-collision",
            "rename",
            "--device",
            "--adb",
            "/opt/platform-tools/adb",
            "--serial",
            "emulator-5554",
            "--pull-missing",
            "--log-dir",
            "/tmp/logs",
        ])
        .unwrap();
        let config = cli.reconcile_config();

        assert_eq!(config.extensions, ExtensionFilter::new(["heic", "jpg"]));
        assert_eq!(config.collision, CollisionPolicy::Rename);

        let device = config.device.unwrap();
        assert_eq!(device.adb_path, PathBuf::from("/opt/platform-tools/adb"));
        assert_eq!(device.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(device.remote_path, "/sdcard/DCIM/Camera");
        assert!(device.pull_missing);
        assert!(cli.log_config().enabled);
    }
}
