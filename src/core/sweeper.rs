//! 保留清扫：清理上一轮更新留下的 `*.old` / `*.bak` / `*.tmp`
//! 以及过期的历史版本二进制。幂等，随时可以重复调用；逐文件
//! 尽力而为，单个删除失败只记日志不中断。

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// `.tmp` 文件的保护窗口：一小时内的可能正被并发写入。
const TMP_GRACE: Duration = Duration::from_secs(60 * 60);
/// 历史版本二进制的保留期。
const SUPERSEDED_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 一条保留规则：名字匹配且年龄达到 min_age 的文件才会被删除。
struct RetentionRule {
    kind: RuleKind,
    min_age: Duration,
}

enum RuleKind {
    Suffix(&'static str),
    VersionedBinary,
}

fn rules() -> [RetentionRule; 4] {
    [
        RetentionRule { kind: RuleKind::Suffix(".old"), min_age: Duration::ZERO },
        RetentionRule { kind: RuleKind::Suffix(".bak"), min_age: Duration::ZERO },
        RetentionRule { kind: RuleKind::Suffix(".tmp"), min_age: TMP_GRACE },
        RetentionRule { kind: RuleKind::VersionedBinary, min_age: SUPERSEDED_RETENTION },
    ]
}

pub struct Sweeper {
    dir: PathBuf,
    current_exe: PathBuf,
    bin_prefix: String,
}

impl Sweeper {
    pub fn for_current_exe() -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("resolve current executable")?;
        Ok(Self::new(exe))
    }

    pub fn new(current_exe: PathBuf) -> Self {
        let dir = current_exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            dir,
            current_exe,
            bin_prefix: format!("{}-", env!("CARGO_PKG_NAME")),
        }
    }

    #[cfg(test)]
    fn with_bin_prefix(mut self, prefix: &str) -> Self {
        self.bin_prefix = prefix.to_string();
        self
    }

    /// 扫一遍可执行文件目录，返回删掉的文件数。
    pub fn sweep(&self) -> anyhow::Result<usize> {
        let current = self
            .current_exe
            .canonicalize()
            .unwrap_or_else(|_| self.current_exe.clone());
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read dir {}", self.dir.display()))?;

        let now = SystemTime::now();
        let mut removed = 0usize;

        for entry in entries.flatten() {
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            // 不管名字撞上哪条规则，都绝不碰当前正在运行的可执行文件
            let is_current = path
                .canonicalize()
                .map(|p| p == current)
                .unwrap_or(false);

            if !should_remove(&name, age, is_current, &self.bin_prefix) {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(target: "sweep", "removed {}", path.display());
                }
                Err(e) => {
                    tracing::warn!(target: "sweep", "remove {} failed: {}", path.display(), e);
                }
            }
        }

        Ok(removed)
    }
}

fn should_remove(name: &str, age: Duration, is_current: bool, bin_prefix: &str) -> bool {
    if is_current {
        return false;
    }
    for rule in rules() {
        let matched = match rule.kind {
            RuleKind::Suffix(suffix) => name.ends_with(suffix),
            RuleKind::VersionedBinary => matches_versioned_binary(name, bin_prefix),
        };
        if matched {
            return age >= rule.min_age;
        }
    }
    false
}

fn matches_versioned_binary(name: &str, prefix: &str) -> bool {
    if !name.starts_with(prefix) {
        return false;
    }
    if cfg!(windows) {
        name.ends_with(".exe")
    } else {
        true
    }
}
