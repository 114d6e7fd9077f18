//! 数据目录概览: 解析候选表, 打印统计信息, 可选导出候选表并预热子体积缓存.

use clap::Parser;
use std::process::ExitCode;

mod result;
mod runner;

/// Survey a LUNA data directory and optionally warm the crop cache.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Data directory (defaults to `$DataDir`, then `$HOME/dataset/luna`)
    #[arg(long)]
    pub data_dir: Option<std::path::PathBuf>,

    /// Keep candidates whose volume file is missing
    #[arg(long)]
    pub all: bool,

    /// Adopt the nearest matching annotation instead of the first one
    #[arg(long)]
    pub nearest: bool,

    /// Slide crops inside the volume instead of padding
    #[arg(long)]
    pub shift: bool,

    /// Export the resolved candidate table as CSV
    #[arg(long)]
    pub export: Option<std::path::PathBuf>,

    /// Validation stride used to report split sizes
    #[arg(long, default_value_t = 10)]
    pub val_stride: usize,

    /// Number of training samples to fetch for cache warm-up
    #[arg(long, default_value_t = 0)]
    pub warm: usize,

    /// Directory of the persistent crop cache
    #[arg(long)]
    pub disk_cache: Option<std::path::PathBuf>,
}

fn main() -> ExitCode {
    simple_logger::init_with_level(log::Level::Info).unwrap();
    let cli = Cli::parse();

    match runner::run(&cli) {
        Ok(r) => {
            r.analyze();
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
