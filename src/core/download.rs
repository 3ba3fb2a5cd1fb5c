use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::sleep;
use url::Url;

/// 下载上下文：UA、超时、瞬态错误重试参数。
#[derive(Debug, Clone)]
pub struct DownloadCtx {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DownloadCtx {
    fn default() -> Self {
        Self {
            user_agent: format!("OrangeUpdater/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 300,
            retries: 2,
            retry_backoff_ms: 400,
        }
    }
}

pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// 资产下载原语：把 url 指向的字节流完整写入 dest。
/// 进度回调 (downloaded, total)，total 可能未知（服务端没给
/// Content-Length）。回调是 fire-and-forget，不允许阻塞传输循环。
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        ctx: &DownloadCtx,
        cancel: watch::Receiver<bool>,
        on_progress: ProgressFn<'_>,
    ) -> anyhow::Result<()>;
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("http status error: {0}")]
    Status(StatusCode),

    #[error("download canceled")]
    Canceled,
}

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client");
        Self { client }
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    async fn sleep_backoff(ctx: &DownloadCtx, attempt: u32) {
        let base = ctx.retry_backoff_ms.max(1);
        let shift = attempt.min(16);
        let mul = 1u64 << shift;
        let ms = base.saturating_mul(mul).min(30_000);
        sleep(Duration::from_millis(ms)).await;
    }

    async fn stream_to_file(
        resp: reqwest::Response,
        dest: &Path,
        cancel: &watch::Receiver<bool>,
        on_progress: ProgressFn<'_>,
    ) -> anyhow::Result<()> {
        let total = resp.content_length();
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("create {}", dest.display()))?;

        let mut stream = resp.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            // 取消信号在块间检查；正在飞行的块写完即止
            if *cancel.borrow() {
                return Err(DownloadError::Canceled.into());
            }
            let bytes: Bytes = chunk.context("download stream")?;
            file.write_all(&bytes).await?;
            downloaded += bytes.len() as u64;
            on_progress(downloaded, total);
        }

        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl AssetDownloader for HttpDownloader {
    fn name(&self) -> &'static str {
        "http-downloader"
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        ctx: &DownloadCtx,
        cancel: watch::Receiver<bool>,
        on_progress: ProgressFn<'_>,
    ) -> anyhow::Result<()> {
        let url = Url::parse(url).with_context(|| format!("parse asset url {:?}", url))?;

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=ctx.retries {
            if attempt > 0 {
                Self::sleep_backoff(ctx, attempt - 1).await;
            }

            let resp = match self
                .client
                .get(url.clone())
                .header(USER_AGENT, &ctx.user_agent)
                .timeout(Duration::from_secs(ctx.timeout_secs))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };

            let status = resp.status();
            if Self::should_retry_status(status) {
                last_err = Some(DownloadError::Status(status).into());
                continue;
            }
            if !status.is_success() {
                return Err(DownloadError::Status(status).into());
            }

            // 流中断不重试：dest 已部分写入，留给上层清理后重新触发
            return match Self::stream_to_file(resp, dest, &cancel, on_progress).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    let _ = tokio::fs::remove_file(dest).await;
                    Err(e)
                }
            };
        }

        Err(last_err.unwrap_or_else(|| DownloadError::Status(StatusCode::REQUEST_TIMEOUT).into()))
    }
}
