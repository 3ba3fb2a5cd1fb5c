/// Simple localization support for OrangeUpdater.
/// Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub checking: &'static str,
    pub found_version: &'static str,
    pub downloading: &'static str,
    pub installing: &'static str,
    pub completed: &'static str,
    pub up_to_date: &'static str,
    pub no_release_found: &'static str,
    pub check_failed: &'static str,
    pub download_failed: &'static str,
    pub install_failed: &'static str,
    pub update_failed: &'static str,
    pub update_available: &'static str,
    pub no_update: &'static str,
    pub restart_spawned: &'static str,
    pub restart_failed: &'static str,
    pub sweep_done: &'static str,
}

pub static EN: Messages = Messages {
    checking: "Checking for updates...",
    found_version: "Found version",
    downloading: "Downloading",
    installing: "Installing update...",
    completed: "Update complete, installed version",
    up_to_date: "Already up to date",
    no_release_found: "No published release found",
    check_failed: "Update check failed",
    download_failed: "Download failed",
    install_failed: "Install failed",
    update_failed: "Update failed",
    update_available: "Update available:",
    no_update: "No update available",
    restart_spawned: "Successor process started, exiting shortly",
    restart_failed: "Relaunch failed, current process keeps running",
    sweep_done: "Sweep finished, files removed",
};

pub static ZH: Messages = Messages {
    checking: "正在检查更新...",
    found_version: "检测到版本",
    downloading: "正在下载",
    installing: "正在安装更新...",
    completed: "更新完成！已安装新版本",
    up_to_date: "已是最新版本",
    no_release_found: "未找到已发布的 Release",
    check_failed: "检测更新失败",
    download_failed: "下载失败",
    install_failed: "安装失败",
    update_failed: "更新失败",
    update_available: "发现新版本:",
    no_update: "当前已是最新",
    restart_spawned: "后继进程已启动，即将退出",
    restart_failed: "重启失败，当前进程继续运行",
    sweep_done: "清理完成，删除文件数",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}
