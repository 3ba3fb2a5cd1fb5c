use crate::core::download::{AssetDownloader, DownloadCtx};
use crate::core::events::RunReporter;
use crate::core::install;
use crate::core::model::{ReleaseDescriptor, UpdateInfo, UpdateProgress, UpdateStatus};
use crate::core::version;
use crate::i18n::Messages;
use crate::platform::Relauncher;
use crate::registry::ReleaseRegistry;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("another update run is already in flight")]
    Busy,

    #[error("already up to date ({0})")]
    UpToDate(String),

    #[error("no release found")]
    NoRelease,

    #[error("update run exceeded {0}s ceiling")]
    Timeout(u64),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 发布仓库标识（owner/name）。
    pub repo: String,
    pub current_version: String,
    /// 当前可执行文件的规范路径；暂存与旁路文件都落在它的目录里。
    pub exe_path: PathBuf,
    /// 检查与下载阶段的时间上限（慢链路上的大二进制也得有个头）。
    pub run_timeout_secs: u64,
    pub download: DownloadCtx,
}

/// 更新编排器：驱动 Check → Download → Install 状态机。
///
/// 同一进程同一时刻只允许一个 run 在飞；第二次触发立即以
/// `EngineError::Busy` 拒绝，绝不排队或交错（交错意味着两个
/// 写者抢同一个暂存路径）。
#[derive(Clone)]
pub struct UpdateEngine {
    cfg: Arc<EngineConfig>,
    registry: Arc<dyn ReleaseRegistry>,
    downloader: Arc<dyn AssetDownloader>,
    relauncher: Arc<dyn Relauncher>,
    messages: &'static Messages,
    event_tx: broadcast::Sender<UpdateProgress>,
    state: Arc<Mutex<UpdateStatus>>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl UpdateEngine {
    pub fn new(
        cfg: EngineConfig,
        registry: Arc<dyn ReleaseRegistry>,
        downloader: Arc<dyn AssetDownloader>,
        relauncher: Arc<dyn Relauncher>,
        messages: &'static Messages,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            cfg: Arc::new(cfg),
            registry,
            downloader,
            relauncher,
            messages,
            event_tx,
            state: Arc::new(Mutex::new(UpdateStatus::Idle)),
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateProgress> {
        self.event_tx.subscribe()
    }

    pub fn current_version(&self) -> &str {
        &self.cfg.current_version
    }

    /// 请求取消进行中的下载。安装一旦开始就不再受取消影响：
    /// rename 之后新二进制已经生效，run 也已经到达终态。
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// 只读检查。调用本身不失败，诊断信息折叠进 `UpdateInfo.error`。
    pub async fn check_for_update(&self) -> UpdateInfo {
        let cur = &self.cfg.current_version;
        tracing::info!(target: "update", "check repo={} current={}", self.cfg.repo, cur);

        let latest = match self.registry.latest(&self.cfg.repo).await {
            Ok(Some(rel)) => rel,
            Ok(None) => {
                return UpdateInfo::inconclusive(cur, self.messages.no_release_found.to_string());
            }
            Err(e) => {
                tracing::warn!(target: "update", "check failed: {}", e);
                return UpdateInfo::inconclusive(
                    cur,
                    format!("{}: {}", self.messages.check_failed, e),
                );
            }
        };

        tracing::info!(target: "update", "latest={} url={}", latest.version, latest.download_url);

        match version::is_newer(cur, &latest.version) {
            Ok(cmp) => UpdateInfo {
                has_update: cmp.newer,
                current_version: cur.clone(),
                latest_version: latest.version,
                release_url: latest.page_url,
                release_notes: latest.release_notes,
                error: cmp.diagnostic,
            },
            // 远端版本号都解析不了，registry 数据不可信，不提供更新
            Err(e) => UpdateInfo {
                has_update: false,
                current_version: cur.clone(),
                latest_version: latest.version,
                release_url: latest.page_url,
                release_notes: latest.release_notes,
                error: Some(format!("{:#}", e)),
            },
        }
    }

    /// 触发一次完整更新，返回装好的新版本号。
    pub async fn update(&self) -> anyhow::Result<String> {
        {
            let mut state = self.state.lock().await;
            if *state != UpdateStatus::Idle {
                return Err(EngineError::Busy.into());
            }
            *state = UpdateStatus::Checking;
        }
        // 重置上一轮的取消信号
        self.cancel_tx.send_replace(false);

        let reporter = RunReporter::new(self.event_tx.clone());
        tracing::info!(target: "update", "run {} started", reporter.run_id());

        let result = self.drive(&reporter).await;

        {
            let mut state = self.state.lock().await;
            *state = UpdateStatus::Idle;
        }

        match &result {
            Ok(v) => tracing::info!(target: "update", "run {} completed: {}", reporter.run_id(), v),
            Err(e) => tracing::warn!(target: "update", "run {} failed: {:#}", reporter.run_id(), e),
        }
        result
    }

    async fn set_state(&self, status: UpdateStatus) {
        let mut state = self.state.lock().await;
        *state = status;
    }

    /// 超时只约束检查与下载两个阶段。安装绝不放在 timeout 之下：
    /// 换入 future 被中途丢弃会让规范路径上没有任何完整二进制。
    async fn drive(&self, reporter: &RunReporter) -> anyhow::Result<String> {
        let msgs = self.messages;
        let ceiling = Duration::from_secs(self.cfg.run_timeout_secs);

        let latest = match tokio::time::timeout(ceiling, self.prepare(reporter)).await {
            Ok(r) => r?,
            Err(_) => {
                let stage = install::stage_path(&self.cfg.exe_path);
                let _ = tokio::fs::remove_file(&stage).await;
                let err = EngineError::Timeout(self.cfg.run_timeout_secs);
                reporter.emit(
                    UpdateStatus::Error,
                    format!("{}: {}", msgs.update_failed, err),
                    0,
                );
                return Err(err.into());
            }
        };

        self.set_state(UpdateStatus::Installing).await;
        reporter.emit(UpdateStatus::Installing, msgs.installing, 90);
        let stage = install::stage_path(&self.cfg.exe_path);
        if let Err(e) = install_detached(self.cfg.exe_path.clone(), stage).await {
            reporter.emit(
                UpdateStatus::Error,
                format!("{}: {:#}", msgs.install_failed, e),
                0,
            );
            return Err(e.context("install"));
        }

        reporter.emit(
            UpdateStatus::Completed,
            format!("{} {}", msgs.completed, latest.version),
            100,
        );
        Ok(latest.version)
    }

    /// 检查与下载：成功返回时 stage 文件已完整落盘。
    async fn prepare(&self, reporter: &RunReporter) -> anyhow::Result<ReleaseDescriptor> {
        let msgs = self.messages;
        reporter.emit(UpdateStatus::Checking, msgs.checking, 0);

        let latest = match self.registry.latest(&self.cfg.repo).await {
            Ok(Some(rel)) => rel,
            Ok(None) => {
                reporter.emit(UpdateStatus::Error, msgs.no_release_found, 0);
                return Err(anyhow::Error::from(EngineError::NoRelease).context("check"));
            }
            Err(e) => {
                reporter.emit(UpdateStatus::Error, format!("{}: {}", msgs.check_failed, e), 0);
                return Err(anyhow::Error::from(e).context("check"));
            }
        };

        let cmp = match version::is_newer(&self.cfg.current_version, &latest.version) {
            Ok(cmp) => cmp,
            Err(e) => {
                reporter.emit(UpdateStatus::Error, format!("{}: {:#}", msgs.check_failed, e), 0);
                return Err(e.context("check"));
            }
        };
        if let Some(diag) = &cmp.diagnostic {
            tracing::warn!(target: "update", "{}", diag);
        }
        if !cmp.newer {
            // "没有更新"对这个 run 是错误出口，对子系统是正常结果
            reporter.emit(UpdateStatus::Error, msgs.up_to_date, 0);
            return Err(anyhow::Error::from(EngineError::UpToDate(
                self.cfg.current_version.clone(),
            ))
            .context("check"));
        }
        reporter.emit(
            UpdateStatus::Checking,
            format!("{} {}", msgs.found_version, latest.version),
            10,
        );

        self.set_state(UpdateStatus::Downloading).await;
        let stage = install::stage_path(&self.cfg.exe_path);
        reporter.emit(
            UpdateStatus::Downloading,
            format!("{} {}...", msgs.downloading, latest.version),
            30,
        );

        let version_label = latest.version.clone();
        let on_progress = move |downloaded: u64, total: Option<u64>| match total {
            Some(t) if t > 0 => {
                // 下载映射到 30–70：0–30 留给检查，70–100 留给安装收尾
                let percent = 30 + ((downloaded.min(t).saturating_mul(40)) / t) as u32;
                reporter.emit(
                    UpdateStatus::Downloading,
                    format!(
                        "{} {}... ({:.2} MiB / {:.2} MiB)",
                        msgs.downloading,
                        version_label,
                        mib(downloaded),
                        mib(t)
                    ),
                    percent,
                );
            }
            // 服务端没给 Content-Length，固定停在中点
            _ => reporter.emit(
                UpdateStatus::Downloading,
                format!(
                    "{} {}... ({:.2} MiB)",
                    msgs.downloading,
                    version_label,
                    mib(downloaded)
                ),
                50,
            ),
        };

        let cancel_rx = self.cancel_tx.subscribe();
        if let Err(e) = self
            .downloader
            .fetch(
                &latest.download_url,
                &stage,
                &self.cfg.download,
                cancel_rx,
                &on_progress,
            )
            .await
        {
            let _ = tokio::fs::remove_file(&stage).await;
            reporter.emit(
                UpdateStatus::Error,
                format!("{}: {:#}", msgs.download_failed, e),
                0,
            );
            return Err(e.context("download"));
        }

        Ok(latest)
    }

    /// 拉起后继进程。失败时返回错误、当前进程绝不能退出 ——
    /// 宁可留在已知可用的旧版本上，也不能一个实例都不剩。
    /// 成功后由调用方在宽限期之后终止当前进程。
    pub async fn restart(&self) -> anyhow::Result<()> {
        let exe = tokio::fs::canonicalize(&self.cfg.exe_path)
            .await
            .with_context(|| format!("relaunch: resolve {}", self.cfg.exe_path.display()))?;

        tracing::info!(
            target: "update",
            "relaunch via {}: {}",
            self.relauncher.name(),
            exe.display()
        );
        self.relauncher.spawn_successor(&exe).context("relaunch")?;
        Ok(())
    }
}

/// 换入放在独立任务上执行：等待方被取消（超时、调用方丢弃
/// future）时，交换仍会完成或自行回滚。
async fn install_detached(exe: PathBuf, staged: PathBuf) -> anyhow::Result<()> {
    match tokio::spawn(async move { install::apply(&exe, &staged).await }).await {
        Ok(r) => r,
        Err(e) => Err(anyhow::Error::from(e).context("install task")),
    }
}

fn mib(n: u64) -> f64 {
    n as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::download::ProgressFn;
    use crate::core::model::ReleaseDescriptor;
    use crate::i18n;
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::AsyncWriteExt;
    use tokio::sync::Semaphore;

    struct StubRegistry {
        release: Option<ReleaseDescriptor>,
        fail: bool,
    }

    #[async_trait]
    impl ReleaseRegistry for StubRegistry {
        fn name(&self) -> &'static str {
            "stub-registry"
        }

        async fn latest(
            &self,
            _repo: &str,
        ) -> Result<Option<ReleaseDescriptor>, RegistryError> {
            if self.fail {
                return Err(RegistryError::Unreachable("connection refused".into()));
            }
            Ok(self.release.clone())
        }
    }

    struct StubDownloader {
        payload: Vec<u8>,
        chunk: usize,
        fail_after_chunks: Option<usize>,
        gate: Option<Arc<Semaphore>>,
    }

    impl StubDownloader {
        fn ok(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                chunk: 4,
                fail_after_chunks: None,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl AssetDownloader for StubDownloader {
        fn name(&self) -> &'static str {
            "stub-downloader"
        }

        async fn fetch(
            &self,
            _url: &str,
            dest: &Path,
            _ctx: &DownloadCtx,
            cancel: watch::Receiver<bool>,
            on_progress: ProgressFn<'_>,
        ) -> anyhow::Result<()> {
            let total = self.payload.len() as u64;
            let mut file = tokio::fs::File::create(dest).await?;
            let mut written = 0u64;
            for (i, chunk) in self.payload.chunks(self.chunk.max(1)).enumerate() {
                if let Some(gate) = &self.gate {
                    gate.acquire().await.unwrap().forget();
                }
                if self.fail_after_chunks == Some(i) {
                    anyhow::bail!("stream reset by peer");
                }
                if *cancel.borrow() {
                    anyhow::bail!("download canceled");
                }
                file.write_all(chunk).await?;
                written += chunk.len() as u64;
                on_progress(written, Some(total));
            }
            file.flush().await?;
            Ok(())
        }
    }

    struct StubRelauncher {
        spawned: Arc<AtomicBool>,
        fail: bool,
    }

    impl Relauncher for StubRelauncher {
        fn name(&self) -> &'static str {
            "stub-relauncher"
        }

        fn spawn_successor(&self, _exe: &Path) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("spawn denied");
            }
            self.spawned.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        exe: PathBuf,
        engine: UpdateEngine,
        spawned: Arc<AtomicBool>,
    }

    fn release(version: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            version: version.to_string(),
            download_url: "https://example.com/dl/app-linux-x86_64".to_string(),
            release_notes: "notes".to_string(),
            page_url: "https://example.com/releases/latest".to_string(),
        }
    }

    fn harness(current: &str, registry: StubRegistry, downloader: StubDownloader) -> Harness {
        harness_with(current, registry, downloader, false)
    }

    fn harness_with(
        current: &str,
        registry: StubRegistry,
        downloader: StubDownloader,
        relaunch_fails: bool,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"old-binary").unwrap();
        let spawned = Arc::new(AtomicBool::new(false));
        let engine = UpdateEngine::new(
            EngineConfig {
                repo: "oranpie/app".to_string(),
                current_version: current.to_string(),
                exe_path: exe.clone(),
                run_timeout_secs: 30,
                download: DownloadCtx::default(),
            },
            Arc::new(registry),
            Arc::new(downloader),
            Arc::new(StubRelauncher {
                spawned: spawned.clone(),
                fail: relaunch_fails,
            }),
            &i18n::EN,
        );
        Harness {
            _dir: dir,
            exe,
            engine,
            spawned,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<UpdateProgress>) -> Vec<UpdateProgress> {
        let mut out = vec![];
        while let Ok(evt) = rx.try_recv() {
            out.push(evt);
        }
        out
    }

    #[tokio::test]
    async fn update_replaces_binary_and_reports_monotonic_progress() {
        let payload = b"new-binary-payload-0123456789".to_vec();
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            StubDownloader::ok(&payload),
        );
        let mut rx = h.engine.subscribe();

        let installed = h.engine.update().await.unwrap();
        assert_eq!(installed, "1.1.0");

        // 规范路径指向新二进制，旧的只剩 .old 旁路文件
        assert_eq!(std::fs::read(&h.exe).unwrap(), payload);
        assert_eq!(
            std::fs::read(install::sideline_path(&h.exe)).unwrap(),
            b"old-binary"
        );
        assert!(!install::stage_path(&h.exe).exists());

        let events = drain(&mut rx);
        assert_eq!(events.first().unwrap().status, UpdateStatus::Checking);
        assert_eq!(events.first().unwrap().percent, 0);

        let last = events.last().unwrap();
        assert_eq!(last.status, UpdateStatus::Completed);
        assert_eq!(last.percent, 100);

        let percents: Vec<u32> = events.iter().map(|e| e.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));

        for e in &events {
            if e.status == UpdateStatus::Downloading {
                assert!((30..=70).contains(&e.percent));
            }
        }
        assert!(events
            .iter()
            .any(|e| e.status == UpdateStatus::Installing && e.percent == 90));
        assert!(events.windows(2).all(|w| w[0].run_id == w[1].run_id));
    }

    #[tokio::test]
    async fn up_to_date_run_is_rejected_without_filesystem_mutation() {
        let h = harness(
            "2.0.0",
            StubRegistry {
                release: Some(release("2.0.0")),
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let mut rx = h.engine.subscribe();

        let err = h.engine.update().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UpToDate(_))
        ));

        assert_eq!(std::fs::read(&h.exe).unwrap(), b"old-binary");
        assert!(!install::sideline_path(&h.exe).exists());
        assert!(!install::stage_path(&h.exe).exists());

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, UpdateStatus::Error);
        assert_eq!(last.percent, 0);
    }

    #[tokio::test]
    async fn no_release_fails_the_run_with_a_diagnostic() {
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: None,
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let mut rx = h.engine.subscribe();

        let err = h.engine.update().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::NoRelease)
        ));
        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, UpdateStatus::Error);
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let payload = b"abcdefghijkl".to_vec();
        let mut dl = StubDownloader::ok(&payload);
        dl.gate = Some(gate.clone());
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            dl,
        );

        let mut rx = h.engine.subscribe();
        let first = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.update().await })
        };

        // 等第一个 run 进入下载阶段
        loop {
            let evt = rx.recv().await.unwrap();
            if evt.status == UpdateStatus::Downloading {
                break;
            }
        }

        let err = h.engine.update().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Busy)
        ));

        // 放行，第一个 run 不受第二次触发影响、正常完成
        gate.add_permits(100);
        let installed = first.await.unwrap().unwrap();
        assert_eq!(installed, "1.1.0");
        assert_eq!(std::fs::read(&h.exe).unwrap(), payload);
    }

    #[tokio::test]
    async fn download_failure_cleans_stage_and_leaves_binary_untouched() {
        let payload = vec![7u8; 40];
        let mut dl = StubDownloader::ok(&payload);
        dl.fail_after_chunks = Some(4); // 40% 处断流
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            dl,
        );
        let mut rx = h.engine.subscribe();

        let err = h.engine.update().await.unwrap_err();
        assert!(format!("{:#}", err).contains("download"));

        assert_eq!(std::fs::read(&h.exe).unwrap(), b"old-binary");
        assert!(!install::stage_path(&h.exe).exists());
        assert!(!install::sideline_path(&h.exe).exists());

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, UpdateStatus::Error);
        assert_eq!(last.percent, 0);

        // 失败后闸门已复位，后续触发不会被误判为 Busy
        let err = h.engine.update().await.unwrap_err();
        assert!(err.downcast_ref::<EngineError>().is_none());
    }

    #[tokio::test]
    async fn cancel_discards_stage_and_keeps_executable() {
        let gate = Arc::new(Semaphore::new(0));
        let mut dl = StubDownloader::ok(&vec![1u8; 64]);
        dl.gate = Some(gate.clone());
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            dl,
        );

        let mut rx = h.engine.subscribe();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.update().await })
        };
        loop {
            let evt = rx.recv().await.unwrap();
            if evt.status == UpdateStatus::Downloading {
                break;
            }
        }

        h.engine.cancel();
        gate.add_permits(100);

        assert!(task.await.unwrap().is_err());
        assert_eq!(std::fs::read(&h.exe).unwrap(), b"old-binary");
        assert!(!install::stage_path(&h.exe).exists());
    }

    #[tokio::test]
    async fn run_timeout_aborts_with_error_event() {
        let gate = Arc::new(Semaphore::new(0));
        let mut dl = StubDownloader::ok(&vec![1u8; 16]);
        dl.gate = Some(gate);
        let mut h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            dl,
        );
        // 1 秒上限，下载被闸门卡死
        let mut cfg = (*h.engine.cfg).clone();
        cfg.run_timeout_secs = 1;
        h.engine.cfg = Arc::new(cfg);

        let mut rx = h.engine.subscribe();
        let err = h.engine.update().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Timeout(1))
        ));

        assert!(!install::stage_path(&h.exe).exists());
        assert_eq!(std::fs::read(&h.exe).unwrap(), b"old-binary");
        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, UpdateStatus::Error);
    }

    #[tokio::test]
    async fn install_completes_even_if_the_awaiting_future_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        let staged = install::stage_path(&exe);
        tokio::fs::write(&exe, b"old-binary").await.unwrap();
        tokio::fs::write(&staged, b"new-binary").await.unwrap();

        // 零超时立刻丢弃外层 future；换入必须在后台任务上照常完成
        let _ = tokio::time::timeout(
            Duration::from_millis(0),
            install_detached(exe.clone(), staged.clone()),
        )
        .await;

        for _ in 0..100 {
            if tokio::fs::read(&exe)
                .await
                .map(|v| v == b"new-binary")
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(tokio::fs::read(&exe).await.unwrap(), b"new-binary");
        assert_eq!(
            tokio::fs::read(install::sideline_path(&exe)).await.unwrap(),
            b"old-binary"
        );
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn check_reports_available_update() {
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let info = h.engine.check_for_update().await;
        assert!(info.has_update);
        assert_eq!(info.current_version, "1.0.0");
        assert_eq!(info.latest_version, "1.1.0");
        assert!(!info.release_url.is_empty());
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn check_distinguishes_no_release_from_network_error() {
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: None,
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let info = h.engine.check_for_update().await;
        assert!(!info.has_update);
        assert_eq!(info.error.as_deref(), Some(i18n::EN.no_release_found));

        let h = harness(
            "1.0.0",
            StubRegistry {
                release: None,
                fail: true,
            },
            StubDownloader::ok(b"unused"),
        );
        let info = h.engine.check_for_update().await;
        assert!(!info.has_update);
        assert!(info.error.as_deref().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn check_with_bad_remote_version_offers_no_update() {
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: Some(release("garbage")),
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let info = h.engine.check_for_update().await;
        assert!(!info.has_update);
        assert!(info.error.as_deref().unwrap().contains("invalid remote version"));
    }

    #[tokio::test]
    async fn check_with_bad_current_version_degrades_to_string_compare() {
        let h = harness(
            "vX",
            StubRegistry {
                release: Some(release("1.1.0")),
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        let info = h.engine.check_for_update().await;
        assert!(info.has_update);
        assert!(info.error.as_deref().unwrap().contains("not semver"));
    }

    #[tokio::test]
    async fn restart_spawns_successor() {
        let h = harness(
            "1.0.0",
            StubRegistry {
                release: None,
                fail: false,
            },
            StubDownloader::ok(b"unused"),
        );
        h.engine.restart().await.unwrap();
        assert!(h.spawned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn restart_spawn_failure_surfaces_error() {
        let h = harness_with(
            "1.0.0",
            StubRegistry {
                release: None,
                fail: false,
            },
            StubDownloader::ok(b"unused"),
            true,
        );
        let err = h.engine.restart().await.unwrap_err();
        assert!(format!("{:#}", err).contains("relaunch"));
        assert!(!h.spawned.load(Ordering::SeqCst));
    }
}
