//! 平台相关的重启策略：为当前可执行文件拉起一个分离的后继进程。
//!
//! 各平台只在"如何把进程拉起来"上不同（Windows 需要隐藏窗口，
//! Unix 走 shell），契约一致：先确认后继进程已启动，当前进程
//! 才允许退出。启动失败时当前进程必须继续存活。

use std::path::Path;
use std::sync::Arc;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// 后继进程的延迟启动秒数，留给当前进程释放文件句柄、
/// 等文件系统安定下来。
pub const RELAUNCH_DELAY_SECS: u64 = 2;

pub trait Relauncher: Send + Sync {
    fn name(&self) -> &'static str;

    /// 启动一个指向同一可执行文件的分离后继进程。
    fn spawn_successor(&self, exe: &Path) -> anyhow::Result<()>;
}

pub fn default_relauncher() -> Arc<dyn Relauncher> {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsRelauncher)
    }
    #[cfg(unix)]
    {
        Arc::new(unix::UnixRelauncher)
    }
    #[cfg(not(any(unix, windows)))]
    {
        unimplemented!("no relaunch strategy for this platform")
    }
}
