use crate::core::model::{RunId, UpdateProgress, UpdateStatus};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// 单次更新 run 的进度出口。
///
/// 发送走 broadcast，没有订阅者时 send 失败直接吞掉：上报永远
/// 不能成为更新失败的原因。percent 在同一 run 内单调不减（error
/// 固定为 0，completed 固定为 100）。
pub struct RunReporter {
    tx: broadcast::Sender<UpdateProgress>,
    run_id: RunId,
    last_percent: AtomicU32,
}

impl RunReporter {
    pub fn new(tx: broadcast::Sender<UpdateProgress>) -> Self {
        Self {
            tx,
            run_id: Uuid::new_v4(),
            last_percent: AtomicU32::new(0),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn emit(&self, status: UpdateStatus, message: impl Into<String>, percent: u32) {
        let percent = match status {
            UpdateStatus::Error => 0,
            UpdateStatus::Completed => 100,
            _ => {
                let wanted = percent.min(99);
                // fetch_max 返回旧值；发射 max(旧, 请求) 保证单调
                let prev = self.last_percent.fetch_max(wanted, Ordering::SeqCst);
                prev.max(wanted)
            }
        };

        let _ = self.tx.send(UpdateProgress {
            run_id: self.run_id,
            status,
            message: message.into(),
            percent,
        });
    }
}
