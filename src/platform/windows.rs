use super::{Relauncher, RELAUNCH_DELAY_SECS};
use anyhow::Context;
use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

const CREATE_NO_WINDOW: u32 = 0x0800_0000;
const DETACHED_PROCESS: u32 = 0x0000_0008;

pub struct WindowsRelauncher;

impl Relauncher for WindowsRelauncher {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn spawn_successor(&self, exe: &Path) -> anyhow::Result<()> {
        let script = format!(
            "Start-Sleep -Seconds {}; Start-Process -FilePath '{}'",
            RELAUNCH_DELAY_SECS,
            exe.display()
        );

        Command::new("powershell.exe")
            .args(["-NoProfile", "-Command", &script])
            .current_dir(exe.parent().unwrap_or_else(|| Path::new(".")))
            .creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("spawn successor process")?;

        Ok(())
    }
}
