//! Build Notifier CLI
//!
//! 由 CI 系统在构建开始/结束时调用，把结果发送到聊天频道

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use build_notifier::notification::mention;
use build_notifier::{
    migrate, resolve, BuildContext, BuildEvent, DeliveryClient, GlobalConfig, JobConfig,
    LegacyJobProperty, NotificationConfig, Notifier, NotifyResult,
};

#[derive(Parser)]
#[command(name = "bnotify")]
#[command(about = "Build Notifier - 把 CI 构建事件发送到聊天频道")]
#[command(version)]
struct Cli {
    /// 全局默认配置（默认 ~/.config/build-notifier/global.json）
    #[arg(long, global = true)]
    global: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EventArgs {
    /// Job 配置文件（JSON）
    #[arg(long)]
    job: PathBuf,
    /// 构建上下文文件（JSON）
    #[arg(long)]
    context: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建开始
    Started(EventArgs),
    /// 构建完成
    Completed(EventArgs),
    /// 发送测试消息验证配置
    TestConnection {
        /// Job 配置文件（可选，不指定则只用全局配置）
        #[arg(long)]
        job: Option<PathBuf>,
    },
    /// 列出可 mention 的用户
    Users {
        #[arg(long)]
        job: Option<PathBuf>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 迁移旧版 job 配置
    Migrate {
        /// 旧版 job property 文件
        #[arg(long)]
        legacy: PathBuf,
        /// 当前 job 配置（可选）
        #[arg(long)]
        job: Option<PathBuf>,
        /// 输出文件（默认打印到 stdout）
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn load_global(path: Option<&Path>) -> Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::load_from(path),
        None => GlobalConfig::auto_load(),
    }
}

fn load_effective(job: Option<&Path>, global: &GlobalConfig) -> Result<NotificationConfig> {
    let job = match job {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };
    Ok(resolve(&job, global))
}

fn load_context(path: &Path) -> Result<BuildContext> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read build context {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid build context {}", path.display()))
}

async fn run_event(event: BuildEvent, args: EventArgs, global: GlobalConfig) -> Result<()> {
    let config = load_effective(Some(&args.job), &global)?;
    let context = load_context(&args.context)?;

    // 投递是阻塞的，放到 blocking 线程
    let result = tokio::task::spawn_blocking(move || -> Result<NotifyResult> {
        let notifier = Notifier::new()?;
        Ok(notifier.handle(event, &context, &config))
    })
    .await??;

    match result {
        NotifyResult::Sent(framing) => info!(?framing, "Notification sent"),
        NotifyResult::Suppressed(framing) => info!(?framing, "Notification suppressed"),
        // 通知失败不影响构建结果，退出码仍为 0
        NotifyResult::Failed(framing) => error!(?framing, "Notification delivery failed"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，默认 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("build_notifier=info,bnotify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let global = load_global(cli.global.as_deref())?;

    match cli.command {
        Commands::Started(args) => run_event(BuildEvent::Started, args, global).await?,
        Commands::Completed(args) => run_event(BuildEvent::Completed, args, global).await?,
        Commands::TestConnection { job } => {
            let config = load_effective(job.as_deref(), &global)?;
            let result = tokio::task::spawn_blocking(move || match DeliveryClient::new() {
                Ok(client) => client.test_connection(&config),
                Err(e) => Err(format!("Client error : {}", e)),
            })
            .await?;

            match result {
                Ok(text) => println!("{}", text),
                Err(text) => {
                    eprintln!("{}", text);
                    std::process::exit(1);
                }
            }
        }
        Commands::Users { job, json } => {
            let config = load_effective(job.as_deref(), &global)?;
            let users = tokio::task::spawn_blocking(move || -> Result<_> {
                Ok(DeliveryClient::new()?.list_users(&config))
            })
            .await??;

            let items = mention::suggestions(&users);
            if json {
                let values: Vec<_> = items
                    .iter()
                    .map(|i| serde_json::json!({ "label": i.label, "value": i.value }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                for item in items {
                    println!("{:<28} {}", item.label, item.value);
                }
            }
        }
        Commands::Migrate { legacy: legacy_path, job, output } => {
            let content = fs::read_to_string(&legacy_path)
                .with_context(|| format!("Failed to read legacy config {}", legacy_path.display()))?;
            let legacy: LegacyJobProperty = serde_json::from_str(&content)
                .with_context(|| format!("Invalid legacy config {}", legacy_path.display()))?;
            let current = match job {
                Some(path) => JobConfig::load(&path)?,
                None => JobConfig::default(),
            };

            let migrated = serde_json::to_string_pretty(&migrate(&legacy, &current))?;
            match output {
                Some(path) => {
                    fs::write(&path, migrated)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Configuration migrated");
                }
                None => println!("{}", migrated),
            }
        }
    }

    Ok(())
}
