//! 命令行工具依赖的通用组件.

use luna_berry::HuWindow;
use std::io::{self, Write};

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 创建一般情况下合适的、用于观察肺实质的窗口.
/// 该窗口窗位为 -600, 窗宽为 1500.
#[inline]
pub fn lung_window() -> HuWindow {
    HuWindow::new(-600.0, 1500.0).unwrap()
}
