use crate::config::ReconcileConfig;
use crate::core::classify::{reconcile, ClassificationResult, ClassificationSummary};
use crate::core::index::{IndexStats, ReferenceIndex};
use crate::core::relocate::{RelocationOutcome, Relocator};
use crate::core::scanner::{CandidateFile, FileScanner};
use crate::device::{device_candidates, AdbDevice, DeviceBridge};
use crate::error::{ReconcileError, Result};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 运行结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// 对账报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: u64,
    pub status: RunStatus,
    pub index: IndexStats,
    pub indexed_names: u64,
    pub candidates_scanned: u64,
    pub classification: ClassificationSummary,
    pub moved: u64,
    pub renamed: u64,
    pub pulled: u64,
    pub skipped: u64,
    pub collisions: u64,
    pub relocation_failures: u64,
    pub io_errors: u64,
    pub device_unavailable: u64,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    fn new(start_time: i64) -> Self {
        Self {
            start_time,
            end_time: start_time,
            duration_ms: 0,
            status: RunStatus::Completed,
            index: IndexStats::default(),
            indexed_names: 0,
            candidates_scanned: 0,
            classification: ClassificationSummary::default(),
            moved: 0,
            renamed: 0,
            pulled: 0,
            skipped: 0,
            collisions: 0,
            relocation_failures: 0,
            io_errors: 0,
            device_unavailable: 0,
            errors: Vec::new(),
        }
    }

    fn record_outcome(&mut self, outcome: &RelocationOutcome) {
        match outcome {
            RelocationOutcome::Moved { .. } => self.moved += 1,
            RelocationOutcome::Renamed { .. } => self.renamed += 1,
            RelocationOutcome::Pulled { .. } => self.pulled += 1,
            RelocationOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    fn record_error(&mut self, err: ReconcileError) {
        match err {
            ReconcileError::Io { .. } => self.io_errors += 1,
            ReconcileError::Relocation { .. } => self.relocation_failures += 1,
            ReconcileError::Collision { .. } => self.collisions += 1,
            ReconcileError::DeviceUnavailable(_) => self.device_unavailable += 1,
            ReconcileError::Cancelled => self.status = RunStatus::Cancelled,
        }
        self.errors.push(err.to_string());
    }

    /// 每个文件级错误（不含取消）
    pub fn error_count(&self) -> u64 {
        self.collisions + self.relocation_failures + self.io_errors + self.device_unavailable
    }

    pub fn log_summary(&self) {
        let c = &self.classification;
        info!(
            "检查了 {} 个文件, 耗时 {:.1} 秒",
            self.candidates_scanned,
            self.duration_ms as f64 / 1000.0
        );
        info!("{} 个文件已匹配", c.matched);
        info!("{} 个文件在参考目录中缺失", c.missing);
        info!("{} 个文件大小不一致", c.size_mismatch);
        info!("{} 个非照片文件", c.other);
        info!(
            "移动 {} 个, 改名 {} 个, 拉取 {} 个, 跳过 {} 个",
            self.moved, self.renamed, self.pulled, self.skipped
        );
        if self.error_count() > 0 {
            warn!(
                "{} 个错误: 重名 {}, 移动失败 {}, 读取失败 {}, 设备不可用 {}",
                self.error_count(),
                self.collisions,
                self.relocation_failures,
                self.io_errors,
                self.device_unavailable
            );
        }
        if self.status == RunStatus::Cancelled {
            warn!("对账已取消，已移动的文件保持在新位置，重新运行即可继续");
        }
    }
}

/// 对账引擎
pub struct ReconcileEngine {
    config: ReconcileConfig,
    device: Option<Arc<dyn DeviceBridge>>,
    cancel: CancellationToken,
}

impl ReconcileEngine {
    pub fn new(config: ReconcileConfig) -> Self {
        let device = config.device.as_ref().map(|d| {
            Arc::new(
                AdbDevice::new(&d.adb_path, config.extensions.clone()).with_serial(d.serial.clone()),
            ) as Arc<dyn DeviceBridge>
        });
        Self {
            config,
            device,
            cancel: CancellationToken::new(),
        }
    }

    /// 替换设备桥接（配置中仍需包含 device 段）
    pub fn with_device(mut self, device: Arc<dyn DeviceBridge>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 取消对账，已开始处理的文件会处理完
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 运行一次完整对账
    ///
    /// 参考目录或源目录不可读时返回错误；单个文件的错误只记录在报告中。
    pub async fn run(&self) -> Result<ReconcileReport> {
        let start = Instant::now();
        let mut report = ReconcileReport::new(chrono::Utc::now().timestamp());
        let config = &self.config;

        info!(
            "开始对账: 源 {}, 参考 {}, 输出 {}",
            config.src_dir.display(),
            config.dst_dir.display(),
            config.sync_dir.display()
        );
        debug!(
            "对账配置: {}",
            serde_json::to_string(config).unwrap_or_default()
        );

        let dst_dir = config.dst_dir.clone();
        let filter = config.extensions.clone();
        let index = tokio::task::spawn_blocking(move || ReferenceIndex::build(&dst_dir, &filter))
            .await
            .map_err(|e| ReconcileError::io(&config.dst_dir, io::Error::other(e)))??;
        report.index = index.stats().clone();
        report.indexed_names = index.len() as u64;

        if self.is_cancelled() {
            return Ok(self.finish(report, start, true));
        }

        if !config.dry_run {
            tokio::fs::create_dir_all(&config.sync_dir)
                .await
                .map_err(|e| ReconcileError::io(&config.sync_dir, e))?;
        }

        let mut relocator = Relocator::new(&config.sync_dir, config.collision).dry_run(config.dry_run);
        if let (Some(device), Some(device_config)) = (&self.device, &config.device) {
            relocator = relocator.with_device(device.clone(), device_config.pull_missing);
        }

        // 输出目录和参考目录位于源目录内部时不参与扫描
        let scanner = FileScanner::new()
            .with_cancel(self.cancel.clone())
            .exclude_dir(&config.sync_dir)
            .exclude_dir(&config.dst_dir);
        let local = scanner.scan(&config.src_dir)?;
        self.process(local, &index, &relocator, &mut report).await;

        if let (Some(device), Some(device_config)) = (&self.device, &config.device) {
            if !self.is_cancelled() {
                match device_candidates(device.as_ref(), &device_config.remote_path, &config.extensions)
                    .await
                {
                    Ok(candidates) => {
                        let stream = futures::stream::iter(candidates.into_iter().map(Ok));
                        self.process(stream, &index, &relocator, &mut report).await;
                    }
                    Err(e) => {
                        warn!("设备来源不可用，跳过: {}", e);
                        report.record_error(e);
                    }
                }
            }
        }

        let cancelled = self.is_cancelled();
        Ok(self.finish(report, start, cancelled))
    }

    /// 逐个分类并归档候选文件，每个文件之间检查取消
    async fn process<S>(
        &self,
        candidates: S,
        index: &ReferenceIndex,
        relocator: &Relocator,
        report: &mut ReconcileReport,
    ) where
        S: Stream<Item = Result<CandidateFile>>,
    {
        let mut results = pin!(reconcile(candidates, index, &self.config.extensions));

        loop {
            if self.is_cancelled() {
                debug!("对账已取消，停止处理候选文件");
                break;
            }
            let Some(item) = results.next().await else {
                break;
            };

            match item {
                Ok(result) => self.handle(result, relocator, report).await,
                Err(e) => {
                    warn!("{}", e);
                    report.record_error(e);
                }
            }
        }
    }

    async fn handle(
        &self,
        result: ClassificationResult,
        relocator: &Relocator,
        report: &mut ReconcileReport,
    ) {
        report.candidates_scanned += 1;
        report.classification.record(&result);
        if result.classification.is_missing() {
            debug!(
                "{}: {} ({} 字节)",
                result.classification.label(),
                result.candidate.full_path,
                result.candidate.size
            );
        }

        match relocator.relocate(&result).await {
            Ok(outcome) => report.record_outcome(&outcome),
            Err(e) => {
                warn!("处理 {} 失败: {}", result.candidate.full_path, e);
                report.record_error(e);
            }
        }
    }

    fn finish(&self, mut report: ReconcileReport, start: Instant, cancelled: bool) -> ReconcileReport {
        if cancelled {
            report.record_error(ReconcileError::Cancelled);
        }
        report.end_time = chrono::Utc::now().timestamp();
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }
}
