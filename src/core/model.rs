use serde::Serialize;
use uuid::Uuid;

pub type RunId = Uuid;

/// 一次查询得到的远端 release 描述；不落盘。
#[derive(Debug, Clone)]
pub struct ReleaseDescriptor {
    pub version: String,
    pub download_url: String,
    pub release_notes: String,
    pub page_url: String,
}

/// 检查更新的结果快照，直接以 camelCase JSON 交给宿主 UI。
/// `error` 有值且 `has_update=false` 表示“检查失败或无法判定”，
/// 与“检查成功、无更新”不同。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub has_update: bool,
    pub current_version: String,
    pub latest_version: String,
    pub release_url: String,
    pub release_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateInfo {
    /// 检查失败/无法判定时的快照。
    pub fn inconclusive(current_version: &str, error: String) -> Self {
        Self {
            has_update: false,
            current_version: current_version.to_string(),
            latest_version: current_version.to_string(),
            release_url: String::new(),
            release_notes: String::new(),
            error: Some(error),
        }
    }
}

/// 更新状态机的状态；`Idle` 仅用于并发闸门，不会出现在事件里。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Idle,
    Checking,
    Downloading,
    Installing,
    Completed,
    Error,
}

impl UpdateStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateStatus::Completed | UpdateStatus::Error)
    }
}

/// 进度事件：只发射、不存储。同一 run 内 percent 单调不减，
/// 100 只在 completed 时出现。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgress {
    pub run_id: RunId,
    pub status: UpdateStatus,
    pub message: String,
    pub percent: u32,
}
