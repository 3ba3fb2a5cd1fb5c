use super::{Relauncher, RELAUNCH_DELAY_SECS};
use anyhow::Context;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

pub struct UnixRelauncher;

impl Relauncher for UnixRelauncher {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn spawn_successor(&self, exe: &Path) -> anyhow::Result<()> {
        let script = format!(
            "sleep {} && exec '{}'",
            RELAUNCH_DELAY_SECS,
            exe.display()
        );

        Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(exe.parent().unwrap_or_else(|| Path::new(".")))
            .process_group(0) // 脱离当前进程组，父进程退出后继续存活
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("spawn successor process")?;

        Ok(())
    }
}
