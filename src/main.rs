mod core;
mod i18n;
mod platform;
mod registry;

use crate::core::download::{DownloadCtx, HttpDownloader};
use crate::core::engine::{EngineConfig, UpdateEngine};
use crate::core::model::{UpdateProgress, UpdateStatus};
use crate::core::sweeper::Sweeper;
use clap::{Arg, ArgAction, Command};
use i18n::{Locale, Messages};
use indicatif::{ProgressBar, ProgressStyle};
use registry::GitHubRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const DEFAULT_REPO: &str = "OranPie/OrangeUpdater";
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
/// registry 查询比整个 run 短得多就该失败。
const REGISTRY_TIMEOUT_SECS: u64 = 30;

fn build_cli() -> Command {
    Command::new("updater")
        .about("Self-update subsystem (GitHub Releases): check / update / restart")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("repo")
                .long("repo")
                .help("Release repository (owner/name)")
                .default_value(DEFAULT_REPO)
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Message locale (en / zh)")
                .default_value("en")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help("HTTP User-Agent")
                .default_value(concat!("OrangeUpdater/", env!("CARGO_PKG_VERSION")))
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help("Ceiling for a whole update run in seconds")
                .default_value("300")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Debug logging to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("check").about("Check for a newer release (read-only)"))
        .subcommand(
            Command::new("update")
                .about("Download and atomically install the latest release")
                .arg(
                    Arg::new("restart")
                        .long("restart")
                        .help("Relaunch after a successful install")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("restart").about("Relaunch the current executable"))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    init_tracing(matches.get_flag("verbose"));

    let locale = Locale::from_str(matches.get_one::<String>("locale").unwrap());
    let msgs = i18n::get_messages(locale);

    // 启动先清一遍上轮更新的残留；清不动也不挡路
    match Sweeper::for_current_exe() {
        Ok(sweeper) => match tokio::task::spawn_blocking(move || sweeper.sweep()).await? {
            Ok(n) => tracing::info!(target: "sweep", "{}: {}", msgs.sweep_done, n),
            Err(e) => tracing::warn!(target: "sweep", "sweep failed: {:#}", e),
        },
        Err(e) => tracing::warn!(target: "sweep", "sweep skipped: {:#}", e),
    }

    let repo = matches.get_one::<String>("repo").unwrap().clone();
    let user_agent = matches.get_one::<String>("user_agent").unwrap().clone();
    let run_timeout_secs: u64 = matches.get_one::<String>("timeout_secs").unwrap().parse()?;

    let engine = UpdateEngine::new(
        EngineConfig {
            repo,
            current_version: CURRENT_VERSION.to_string(),
            exe_path: std::env::current_exe()?,
            run_timeout_secs,
            download: DownloadCtx {
                user_agent: user_agent.clone(),
                timeout_secs: run_timeout_secs,
                ..DownloadCtx::default()
            },
        },
        Arc::new(GitHubRegistry::new(&user_agent, REGISTRY_TIMEOUT_SECS)),
        Arc::new(HttpDownloader::new()),
        platform::default_relauncher(),
        msgs,
    );

    match matches.subcommand() {
        Some(("check", _)) => {
            let info = engine.check_for_update().await;
            println!("{}", serde_json::to_string_pretty(&info)?);
            if info.has_update {
                println!(
                    "{} {} -> {}",
                    msgs.update_available, info.current_version, info.latest_version
                );
            } else {
                println!("{}", msgs.no_update);
            }
        }
        Some(("update", m)) => {
            let mut rx = engine.subscribe();
            let runner = engine.clone();
            let handle = tokio::spawn(async move { runner.update().await });

            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}").unwrap(),
            );
            while let Some(evt) = next_event(&mut rx).await {
                pb.set_position(evt.percent as u64);
                pb.set_message(evt.message.clone());
                if evt.status.is_terminal() {
                    if evt.status == UpdateStatus::Completed {
                        pb.finish_with_message(evt.message);
                    } else {
                        pb.abandon_with_message(evt.message);
                    }
                    break;
                }
            }

            match handle.await? {
                Ok(version) => {
                    println!("{} {}", msgs.completed, version);
                    if m.get_flag("restart") {
                        relaunch_and_exit(&engine, msgs).await?;
                    }
                }
                Err(e) => {
                    eprintln!("{}: {:#}", msgs.update_failed, e);
                    std::process::exit(1);
                }
            }
        }
        Some(("restart", _)) => relaunch_and_exit(&engine, msgs).await?,
        _ => {}
    }

    Ok(())
}

/// Lagged 只说明渲染端掉了几条旧事件，跳过继续收；Closed 才结束。
async fn next_event(rx: &mut broadcast::Receiver<UpdateProgress>) -> Option<UpdateProgress> {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match rx.recv().await {
            Ok(evt) => return Some(evt),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(target: "update", "renderer lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// 后继进程拉起来之后，留出宽限期再退出当前进程。
/// 拉不起来就原样返回错误 —— 绝不在没有后继的情况下退出。
async fn relaunch_and_exit(engine: &UpdateEngine, msgs: &'static Messages) -> anyhow::Result<()> {
    engine.restart().await.map_err(|e| {
        eprintln!("{}: {:#}", msgs.restart_failed, e);
        e
    })?;

    println!("{}", msgs.restart_spawned);
    tokio::time::sleep(Duration::from_secs(platform::RELAUNCH_DELAY_SECS)).await;
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn progress(percent: u32) -> UpdateProgress {
        UpdateProgress {
            run_id: Uuid::new_v4(),
            status: UpdateStatus::Downloading,
            message: String::new(),
            percent,
        }
    }

    #[tokio::test]
    async fn renderer_skips_lagged_events_instead_of_freezing() {
        let (tx, mut rx) = broadcast::channel(1);
        // 容量 1，连发 5 条：接收端必然 Lagged
        for i in 0..5 {
            tx.send(progress(i)).unwrap();
        }

        let evt = next_event(&mut rx).await.unwrap();
        assert_eq!(evt.percent, 4);

        drop(tx);
        assert!(next_event(&mut rx).await.is_none());
    }
}
