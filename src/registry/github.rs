use super::{RegistryError, ReleaseRegistry};
use crate::core::model::ReleaseDescriptor;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    html_url: String,
    body: Option<String>,
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

/// GitHub Releases 作为发布源：`GET /repos/{repo}/releases/latest`，
/// 按当前 OS/架构的命名 token 挑选资产。
pub struct GitHubRegistry {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubRegistry {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client");
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// GitHub Enterprise 等自建实例可替换 API 入口。
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn os_tokens() -> &'static [&'static str] {
        if cfg!(windows) {
            &["windows", "win64", "win"]
        } else if cfg!(target_os = "macos") {
            &["darwin", "macos", "osx"]
        } else {
            &["linux"]
        }
    }

    fn arch_tokens() -> &'static [&'static str] {
        if cfg!(target_arch = "x86_64") {
            &["x86_64", "amd64", "x64"]
        } else if cfg!(target_arch = "aarch64") {
            &["aarch64", "arm64"]
        } else {
            &[]
        }
    }
}

/// 资产挑选：优先 OS+架构都命中，退一步只按 OS 命中；
/// Windows 上额外要求 `.exe` 资产。
fn select_asset<'a>(
    assets: &'a [GitHubAsset],
    os: &[&str],
    arch: &[&str],
    want_exe: bool,
) -> Option<&'a GitHubAsset> {
    let eligible = |a: &GitHubAsset| {
        let name = a.name.to_ascii_lowercase();
        (!want_exe || name.ends_with(".exe")) && os.iter().any(|t| name.contains(t))
    };

    assets
        .iter()
        .find(|a| {
            let name = a.name.to_ascii_lowercase();
            eligible(a) && (arch.is_empty() || arch.iter().any(|t| name.contains(t)))
        })
        .or_else(|| assets.iter().find(|a| eligible(a)))
}

#[async_trait]
impl ReleaseRegistry for GitHubRegistry {
    fn name(&self) -> &'static str {
        "github-releases"
    }

    async fn latest(&self, repo: &str) -> Result<Option<ReleaseDescriptor>, RegistryError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, repo);

        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;

        // /releases/latest 在仓库没有任何 release 时返回 404
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(RegistryError::Status(resp.status()));
        }

        let release: GitHubRelease = resp
            .json()
            .await
            .map_err(|e| RegistryError::BadResponse(e.to_string()))?;

        let asset = select_asset(
            &release.assets,
            Self::os_tokens(),
            Self::arch_tokens(),
            cfg!(windows),
        )
        .ok_or(RegistryError::NoAssetForPlatform {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        })?;

        Ok(Some(ReleaseDescriptor {
            version: release.tag_name.trim_start_matches('v').to_string(),
            download_url: asset.browser_download_url.clone(),
            release_notes: release.body.unwrap_or_default(),
            page_url: release.html_url,
        }))
    }
}
