use super::{parse_stat_output, DeviceBridge, RemotePhoto};
use crate::core::scanner::ExtensionFilter;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// 通过 adb 访问 Android 设备
///
/// adb 可执行文件路径由调用方注入，不修改进程的 PATH。
pub struct AdbDevice {
    adb_path: PathBuf,
    serial: Option<String>,
    filter: ExtensionFilter,
    name: String,
}

impl AdbDevice {
    pub fn new(adb_path: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        let adb_path = adb_path.into();
        let name = format!("adb:{}", adb_path.display());
        Self {
            adb_path,
            serial: None,
            filter,
            name,
        }
    }

    /// 指定设备序列号（连接了多台设备时需要）
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        if let Some(serial) = &serial {
            self.name = format!("adb:{}", serial);
        }
        self.serial = serial;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// 在设备上执行 shell 命令，返回标准输出
    async fn shell(&self, command_line: &str) -> Result<String> {
        debug!("执行设备命令: {}", command_line);
        let start = Instant::now();

        let output = self
            .command()
            .arg("shell")
            .arg(command_line)
            .output()
            .await
            .map_err(|e| {
                ReconcileError::DeviceUnavailable(format!(
                    "无法启动 {}: {}",
                    self.adb_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReconcileError::DeviceUnavailable(format!(
                "命令失败 ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        debug!("设备命令耗时 {:.3} 秒", start.elapsed().as_secs_f64());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// 构造 find 的扩展名条件：\( -iname '*.jpg' -o -iname '*.mp4' \)
    fn name_predicate(&self) -> String {
        let clauses: Vec<String> = self
            .filter
            .extensions()
            .iter()
            .map(|ext| format!("-iname {}", shell_quote(&format!("*.{}", ext))))
            .collect();
        format!("\\( {} \\)", clauses.join(" -o "))
    }

    fn find_command(&self, remote_path: &str, action: &str) -> String {
        format!(
            "find {} -type f {} {}",
            shell_quote(remote_path),
            self.name_predicate(),
            action
        )
    }
}

#[async_trait]
impl DeviceBridge for AdbDevice {
    async fn list_photos(&self, remote_path: &str) -> Result<Vec<String>> {
        let output = self.shell(&self.find_command(remote_path, "-print")).await?;
        let paths: Vec<String> = output
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if paths.is_empty() {
            warn!("设备上未找到照片: {}", remote_path);
        }
        Ok(paths)
    }

    async fn stat_photos(&self, remote_path: &str) -> Result<Vec<RemotePhoto>> {
        let output = self
            .shell(&self.find_command(remote_path, "-exec stat -c %n@%s {} +"))
            .await?;
        Ok(parse_stat_output(&output))
    }

    async fn pull(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        debug!("拉取: {} -> {}", remote_path, local_path.display());
        let output = self
            .command()
            .arg("pull")
            .arg(remote_path)
            .arg(local_path)
            .output()
            .await
            .map_err(|e| pull_error(remote_path, local_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(pull_error(
                remote_path,
                local_path,
                io::Error::other(format!("adb pull 失败 ({}): {}", output.status, stderr.trim())),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 单个文件拉取失败按移动失败处理，不影响设备上其余文件
fn pull_error(remote_path: &str, local_path: &Path, source: io::Error) -> ReconcileError {
    ReconcileError::Relocation {
        from: PathBuf::from(remote_path),
        to: local_path.to_path_buf(),
        source,
    }
}

/// 设备端 shell 的单引号转义
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
