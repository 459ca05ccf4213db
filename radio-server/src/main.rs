//! RadioArchive 主程序
//!
//! `serve` 启动 AI 中继；其余子命令在终端中操作本地病例归档。

mod commands;

use clap::{Args as ClapArgs, Parser, Subcommand};
use radio_admin::ConfigManager;
use radio_core::{Difficulty, Modality, Specialty, Tab, Theme};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "radio-server")]
#[command(about = "RadioArchive 放射科教学病例归档")]
struct Args {
    /// 配置文件路径（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 病例数据目录，覆盖配置中的 storage.data_dir
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    /// 日志级别，覆盖配置中的 logging.level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 AI 中继端点
    Serve {
        /// 监听主机
        #[arg(long)]
        host: Option<String>,
        /// 监听端口
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// 列出病例
    List {
        /// 标签页：Tous、Favoris 或专业名称
        #[arg(short, long, default_value = "Tous")]
        tab: Tab,
        /// 检索文本
        #[arg(short, long)]
        query: Option<String>,
        /// 追加语义检索
        #[arg(long)]
        smart: bool,
        /// 匿名显示患者姓名
        #[arg(short, long)]
        anonymize: bool,
    },
    /// 显示病例详情
    Show { id: String },
    /// 新增病例
    Add(AddArgs),
    /// 删除病例
    Delete {
        id: String,
        /// 不再询问确认
        #[arg(short, long)]
        yes: bool,
    },
    /// 切换收藏
    Favorite { id: String },
    /// 显示统计
    Stats,
    /// 切换专业标签页的可见性
    Specialty { specialty: Specialty },
    /// 设置主题，省略时切换
    Theme { theme: Option<Theme> },
    /// 输出生效配置
    Config,
}

#[derive(ClapArgs, Debug)]
struct AddArgs {
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    patient_id: String,
    /// 临床记录
    #[arg(long)]
    note: String,
    /// 诊断；使用 --analyze 时可省略
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    specialty: Option<Specialty>,
    #[arg(long)]
    difficulty: Option<Difficulty>,
    #[arg(long)]
    modality: Option<Modality>,
    /// 作为一个序列附加的图像文件
    #[arg(long, num_args = 1..)]
    images: Vec<PathBuf>,
    /// 将目录中的图像作为一个序列附加
    #[arg(long)]
    image_dir: Option<PathBuf>,
    /// 提交前请求 AI 分类建议
    #[arg(long)]
    analyze: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.as_deref())?.get_config().await;
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    // 命令行覆盖后再校验一次
    let manager = ConfigManager::from_config(config, None)?;
    let mut config = manager.get_config().await;

    // 初始化日志
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        "Data directory: {}, relay: {}",
        config.storage.data_dir, config.ai.relay_url
    );

    let result = match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::serve(&config).await
        }
        Command::List {
            tab,
            query,
            smart,
            anonymize,
        } => commands::list(&config, tab, query, smart, anonymize).await,
        Command::Show { id } => commands::show(&config, &id).await,
        Command::Add(add) => commands::add(&config, add).await,
        Command::Delete { id, yes } => commands::delete(&config, &id, yes).await,
        Command::Favorite { id } => commands::favorite(&config, &id).await,
        Command::Stats => commands::stats(&config).await,
        Command::Specialty { specialty } => commands::specialty(&config, specialty).await,
        Command::Theme { theme } => commands::theme(&config, theme).await,
        Command::Config => {
            print!("{}", manager.to_toml().await?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
