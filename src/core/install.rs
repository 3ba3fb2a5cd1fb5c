//! 原子安装：先整文件落到同目录的暂存路径，再用 rename 换入。
//!
//! 运行中的二进制不能原地覆盖，也不能同步删除（可能仍映射在当前
//! 进程地址空间里，部分系统还会锁住打开的可执行文件）。因此旧
//! 文件只被挪到 `.old` 旁路路径，由 Sweeper 在之后的启动里清理。

use anyhow::Context;
use std::path::{Path, PathBuf};

/// 暂存路径：与可执行文件同目录（同一文件系统，保证最终 rename 原子）。
pub fn stage_path(exe: &Path) -> PathBuf {
    sibling(exe, "tmp")
}

/// 旧版本的旁路路径。
pub fn sideline_path(exe: &Path) -> PathBuf {
    sibling(exe, "old")
}

fn sibling(exe: &Path, suffix: &str) -> PathBuf {
    let name = exe
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "binary".to_string());
    exe.with_file_name(format!("{}.{}", name, suffix))
}

/// 把已完整写好的 staged 文件换入 exe 的规范路径。
///
/// 任一步失败都保证 exe 路径仍指向一个完整可运行的二进制：
/// 旁路 rename 失败 => 旧文件原封不动、staged 被删；
/// 换入 rename 失败 => 旧文件被放回原位、staged 被删。
pub async fn apply(exe: &Path, staged: &Path) -> anyhow::Result<()> {
    if let Err(e) = make_executable(staged).await {
        let _ = tokio::fs::remove_file(staged).await;
        return Err(e);
    }

    let sidelined = sideline_path(exe);
    // 上一轮更新可能留下同名 .old；尽力挪开，失败则由下面的 rename 报错。
    // 连续两次更新之间没重启的话，.old 正是本进程的运行映像 ——
    // 那份只归 Sweeper 管，这里不碰
    if tokio::fs::metadata(&sidelined).await.is_ok() && !is_running_image(&sidelined) {
        let _ = tokio::fs::remove_file(&sidelined).await;
    }

    if let Err(e) = tokio::fs::rename(exe, &sidelined).await {
        let _ = tokio::fs::remove_file(staged).await;
        return Err(anyhow::Error::from(e)
            .context(format!("sideline current executable {}", exe.display())));
    }

    if let Err(e) = tokio::fs::rename(staged, exe).await {
        // 回滚：把旧二进制放回规范路径
        let _ = tokio::fs::rename(&sidelined, exe).await;
        let _ = tokio::fs::remove_file(staged).await;
        return Err(anyhow::Error::from(e)
            .context(format!("move staged binary into {}", exe.display())));
    }

    Ok(())
}

/// path 是否解析到当前进程自身的可执行映像。
fn is_running_image(path: &Path) -> bool {
    let current = match std::env::current_exe() {
        Ok(p) => p.canonicalize().unwrap_or(p),
        Err(_) => return false,
    };
    path.canonicalize().map(|p| p == current).unwrap_or(false)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("stat staged binary {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::metadata(path)
        .await
        .with_context(|| format!("stat staged binary {}", path.display()))?;
    Ok(())
}
