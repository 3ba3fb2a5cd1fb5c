use crate::core::model::ReleaseDescriptor;
use async_trait::async_trait;

pub mod github;

pub use github::GitHubRegistry;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    /// 网络层面根本没够到 registry。
    #[error("release registry unreachable: {0}")]
    Unreachable(String),

    #[error("release registry returned http {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed registry response: {0}")]
    BadResponse(String),

    #[error("no release asset for {os}/{arch}")]
    NoAssetForPlatform {
        os: &'static str,
        arch: &'static str,
    },
}

/// 发布源查询接口。
///
/// `Ok(None)` 表示 registry 可达但没有任何已发布的 release，
/// 和网络失败（`Err(Unreachable)`）是两回事。内部不做重试，
/// 用户触发的检查是否重试由调用方决定。
#[async_trait]
pub trait ReleaseRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    async fn latest(&self, repo: &str) -> Result<Option<ReleaseDescriptor>, RegistryError>;
}
