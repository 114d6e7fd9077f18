//! 概览结果.

use luna_berry::table::CandidateSummary;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// 缓存预热统计.
#[derive(Debug, Default)]
pub struct WarmStats {
    /// 成功获取的样本数.
    pub fetched: usize,

    /// 失败的样本数.
    pub failed: usize,

    /// 各样本肺窗归一化平均强度之和.
    pub intensity_sum: f64,

    /// 预热结束时内存中的子体积个数.
    pub cached_crops: usize,

    /// 总耗时.
    pub elapsed: Duration,
}

impl WarmStats {
    /// 合并两个线程的计数.
    pub fn merge(self, other: Self) -> Self {
        Self {
            fetched: self.fetched + other.fetched,
            failed: self.failed + other.failed,
            intensity_sum: self.intensity_sum + other.intensity_sum,
            cached_crops: self.cached_crops.max(other.cached_crops),
            elapsed: self.elapsed.max(other.elapsed),
        }
    }

    fn avg_intensity(&self) -> Option<f64> {
        (self.fetched > 0).then(|| self.intensity_sum / self.fetched as f64)
    }
}

/// 概览最终结果.
pub struct SurveyResult {
    pub data_dir: PathBuf,
    pub summary: CandidateSummary,
    pub val_len: usize,
    pub train_len: usize,
    pub warm: Option<WarmStats>,
    pub exported: Option<PathBuf>,
}

impl SurveyResult {
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        let s = &self.summary;
        writeln!(w, "Data directory `{}`:", self.data_dir.display())?;
        writeln!(w, "{S4}Candidates: {} over {} scans", s.total, s.scans)?;
        writeln!(
            w,
            "{S4}Nodules: {} ({} with diameter)",
            s.nodules, s.nodules_with_diameter
        )?;
        writeln!(
            w,
            "{S4}Non-nodules: {} ({} with diameter)",
            s.non_nodules(),
            s.non_nodules_with_diameter
        )?;
        writeln!(
            w,
            "{S4}Split: {} validation / {} training",
            self.val_len, self.train_len
        )?;
        if let Some(p) = &self.exported {
            writeln!(w, "{S4}Exported to `{}`", p.display())?;
        }
        if let Some(warm) = &self.warm {
            let avg = match warm.avg_intensity() {
                Some(f) => format!("{f:.6}"),
                None => "/".to_string(),
            };
            writeln!(w, "{S4}Warm-up fetched: {}, failed: {}", warm.fetched, warm.failed)?;
            writeln!(w, "{S4}Warm-up time: {} ms", warm.elapsed.as_millis())?;
            writeln!(w, "{S4}Crops in memory: {}", warm.cached_crops)?;
            write!(w, "{S4}Average lung-window intensity: {avg}")?;
        }
        Ok(())
    }

    /// 打印结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        match self.describe_into(&mut buf) {
            Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => log::error!("cannot format report: {e}"),
        }
        utils::sep();
    }
}
