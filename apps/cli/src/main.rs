//! # Admittance CLI
//!
//! 导纳控制器命令行工具。
//!
//! ```bash
//! # 生成默认配置
//! admittance-cli config init
//!
//! # 检查配置（缺失项会提示使用默认值，非法值返回非零退出码）
//! admittance-cli config check
//!
//! # 闭环仿真：第 1~3 秒沿 x 轴施加 15 N 的推力
//! admittance-cli simulate --duration 5 --axis fx --force 15
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, SimulateCommand};

/// 导纳控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "admittance-cli")]
#[command(about = "Admittance controller configuration and simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// 提高日志级别（-v: debug，-vv: trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 闭环仿真（假传感器 + 假机器人）
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Simulate { args } => args.execute(),
    }
}

/// 初始化日志
///
/// `RUST_LOG` 优先，其次按 `-v` 次数选择级别。
fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "admittance_cli={level},admittance_core={level},admittance_driver={level}"
        ))?,
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
