use async_trait::async_trait;
use photosync_lib::core::CollisionPolicy;
use photosync_lib::device::{DeviceBridge, RemotePhoto};
use photosync_lib::{DeviceConfig, ReconcileConfig, ReconcileEngine, ReconcileError, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct FakeDevice {
    photos: Vec<RemotePhoto>,
}

/// 列表正常，但每次拉取都失败的设备
struct BrokenPullDevice {
    photos: Vec<RemotePhoto>,
}

#[async_trait]
impl DeviceBridge for BrokenPullDevice {
    async fn list_photos(&self, _remote_path: &str) -> photosync_lib::Result<Vec<String>> {
        Ok(self.photos.iter().map(|p| p.path.clone()).collect())
    }

    async fn stat_photos(&self, _remote_path: &str) -> photosync_lib::Result<Vec<RemotePhoto>> {
        Ok(self.photos.clone())
    }

    async fn pull(&self, remote_path: &str, _local_path: &Path) -> photosync_lib::Result<()> {
        Err(ReconcileError::DeviceUnavailable(format!("拉取中断: {}", remote_path)))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[async_trait]
impl DeviceBridge for FakeDevice {
    async fn list_photos(&self, _remote_path: &str) -> photosync_lib::Result<Vec<String>> {
        Ok(self.photos.iter().map(|p| p.path.clone()).collect())
    }

    async fn stat_photos(&self, _remote_path: &str) -> photosync_lib::Result<Vec<RemotePhoto>> {
        Ok(self.photos.clone())
    }

    async fn pull(&self, remote_path: &str, local_path: &Path) -> photosync_lib::Result<()> {
        let photo = self
            .photos
            .iter()
            .find(|p| p.path == remote_path)
            .ok_or_else(|| ReconcileError::DeviceUnavailable(remote_path.to_string()))?;
        std::fs::write(local_path, vec![1u8; photo.size as usize])
            .map_err(|e| ReconcileError::io(local_path, e))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct Workspace {
    _tmp: TempDir,
    src: PathBuf,
    dst: PathBuf,
    sync: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("phone");
        let dst = tmp.path().join("library");
        let sync = tmp.path().join("synced");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        Self {
            _tmp: tmp,
            src,
            dst,
            sync,
        }
    }

    fn write(&self, root: &Path, rel: &str, size: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0u8; size]).unwrap();
    }

    fn config(&self) -> ReconcileConfig {
        ReconcileConfig::new(&self.src, &self.dst, &self.sync)
    }

    fn device_config(&self, pull_missing: bool) -> ReconcileConfig {
        let mut config = self.config();
        config.device = Some(DeviceConfig {
            pull_missing,
            ..DeviceConfig::default()
        });
        config
    }
}

fn remote(name: &str, size: u64) -> RemotePhoto {
    RemotePhoto {
        path: format!("/sdcard/DCIM/Camera/{}", name),
        size,
    }
}

#[tokio::test]
async fn test_layout_after_run() {
    let ws = Workspace::new();
    ws.write(&ws.dst, "2024/04/PXL_20240423_084532187.jpg", 10);
    ws.write(&ws.src, "PXL_20240423_084532187.jpg", 10);
    ws.write(&ws.src, "PXL_20240501_120000000.jpg", 20);
    ws.write(&ws.src, "holiday.mp4", 30);
    ws.write(&ws.src, "notes.txt", 5);

    let report = ReconcileEngine::new(ws.config()).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.candidates_scanned, 4);
    assert_eq!(report.classification.matched, 1);
    assert_eq!(report.classification.missing, 2);
    assert_eq!(report.classification.other, 1);
    assert_eq!(report.moved, 3);

    assert!(ws.sync.join("PXL_20240423_084532187.jpg").is_file());
    assert!(ws.sync.join("missing/2024-05/PXL_20240501_120000000.jpg").is_file());
    assert!(ws.sync.join("missing/holiday.mp4").is_file());
    assert!(ws.src.join("notes.txt").is_file());
    // 参考目录保持不变
    assert!(ws.dst.join("2024/04/PXL_20240423_084532187.jpg").is_file());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let ws = Workspace::new();
    ws.write(&ws.dst, "a.jpg", 10);
    ws.write(&ws.src, "a.jpg", 10);
    ws.write(&ws.src, "b.jpg", 10);

    let first = ReconcileEngine::new(ws.config()).run().await.unwrap();
    assert_eq!(first.classification.matched, 1);
    assert_eq!(first.classification.missing, 1);

    let second = ReconcileEngine::new(ws.config()).run().await.unwrap();
    assert_eq!(second.classification.matched, 0);
    assert!(second.classification.missing <= first.classification.missing);
    assert_eq!(second.error_count(), 0);
}

#[tokio::test]
async fn test_sync_dir_inside_source_is_not_rescanned() {
    let ws = Workspace::new();
    ws.write(&ws.src, "a.jpg", 10);
    let sync = ws.src.join("synced");

    let config = ReconcileConfig::new(&ws.src, &ws.dst, &sync);
    let report = ReconcileEngine::new(config).run().await.unwrap();

    assert_eq!(report.candidates_scanned, 1);
    assert!(sync.join("missing/a.jpg").is_file());
}

#[tokio::test]
async fn test_rename_policy_keeps_both_files() {
    let ws = Workspace::new();
    ws.write(&ws.dst, "a.jpg", 4);
    ws.write(&ws.sync, "a.jpg", 4);
    ws.write(&ws.src, "a.jpg", 4);

    let mut config = ws.config();
    config.collision = CollisionPolicy::Rename;
    let report = ReconcileEngine::new(config).run().await.unwrap();

    assert_eq!(report.renamed, 1);
    assert_eq!(report.collisions, 0);
    assert!(ws.sync.join("a.jpg").is_file());
    assert!(ws.sync.join("a_1.jpg").is_file());
}

#[tokio::test]
async fn test_device_missing_photos_are_pulled() {
    let ws = Workspace::new();
    ws.write(&ws.dst, "PXL_20240423_084532187.jpg", 10);

    let device = FakeDevice {
        photos: vec![
            remote("PXL_20240423_084532187.jpg", 10),
            remote("PXL_20240601_090000000.jpg", 7),
        ],
    };
    let report = ReconcileEngine::new(ws.device_config(true))
        .with_device(Arc::new(device))
        .run()
        .await
        .unwrap();

    assert_eq!(report.classification.matched, 1);
    assert_eq!(report.classification.missing, 1);
    assert_eq!(report.pulled, 1);
    assert_eq!(report.skipped, 1);
    let pulled = ws.sync.join("missing/2024-06/PXL_20240601_090000000.jpg");
    assert_eq!(std::fs::metadata(pulled).unwrap().len(), 7);
}

#[tokio::test]
async fn test_device_pull_disabled_and_repeated() {
    let ws = Workspace::new();
    let photos = vec![remote("IMG_20230101_000000.jpg", 3)];

    let report = ReconcileEngine::new(ws.device_config(false))
        .with_device(Arc::new(FakeDevice { photos: photos.clone() }))
        .run()
        .await
        .unwrap();
    assert_eq!(report.pulled, 0);
    assert_eq!(report.skipped, 1);

    let first = ReconcileEngine::new(ws.device_config(true))
        .with_device(Arc::new(FakeDevice { photos: photos.clone() }))
        .run()
        .await
        .unwrap();
    assert_eq!(first.pulled, 1);

    // 再次运行时已存在同大小副本，不再拉取
    let second = ReconcileEngine::new(ws.device_config(true))
        .with_device(Arc::new(FakeDevice { photos }))
        .run()
        .await
        .unwrap();
    assert_eq!(second.pulled, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.collisions, 0);
}

#[tokio::test]
async fn test_unavailable_device_yields_no_candidates() {
    let ws = Workspace::new();
    ws.write(&ws.src, "a.jpg", 1);

    let report = ReconcileEngine::new(ws.device_config(true))
        .with_device(Arc::new(FakeDevice { photos: Vec::new() }))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.candidates_scanned, 1);
    assert_eq!(report.device_unavailable, 1);
    assert_eq!(report.pulled, 0);
}

#[tokio::test]
async fn test_failed_pull_counts_as_relocation_failure() {
    let ws = Workspace::new();
    let photos = vec![
        remote("PXL_20240601_090000000.jpg", 7),
        remote("PXL_20240602_090000000.jpg", 8),
    ];

    let report = ReconcileEngine::new(ws.device_config(true))
        .with_device(Arc::new(BrokenPullDevice { photos }))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.classification.missing, 2);
    assert_eq!(report.pulled, 0);
    assert_eq!(report.relocation_failures, 2);
    assert_eq!(report.device_unavailable, 0);
    assert!(!ws.sync.join("missing/2024-06/PXL_20240601_090000000.jpg").exists());
}
