//! 候选表统计与导出.

use std::io::Write;

use itertools::Itertools;

use super::CandidateInfo;
use crate::error::LunaResult;

/// 候选表的基本统计信息.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateSummary {
    /// 候选总数.
    pub total: usize,

    /// 真结节个数.
    pub nodules: usize,

    /// 匹配到标注直径的真结节个数.
    pub nodules_with_diameter: usize,

    /// 匹配到标注直径的非结节个数.
    pub non_nodules_with_diameter: usize,

    /// 涉及的不同 scan 个数.
    pub scans: usize,
}

impl CandidateSummary {
    /// 统计 `candidates`.
    pub fn of(candidates: &[CandidateInfo]) -> Self {
        let mut ans = Self {
            total: candidates.len(),
            scans: candidates.iter().map(|c| c.scan_id.as_str()).unique().count(),
            ..Self::default()
        };
        for c in candidates {
            match (c.is_nodule, c.diameter_mm > 0.0) {
                (true, true) => {
                    ans.nodules += 1;
                    ans.nodules_with_diameter += 1;
                }
                (true, false) => ans.nodules += 1,
                (false, true) => ans.non_nodules_with_diameter += 1,
                (false, false) => {}
            }
        }
        ans
    }

    /// 非结节个数.
    #[inline]
    pub fn non_nodules(&self) -> usize {
        self.total - self.nodules
    }
}

/// 以 CSV 格式把候选表写入 `w`. 列为 `scan_id,x,y,z,is_nodule,diameter_mm`,
/// 其中 `is_nodule` 写作 0/1, 与输入候选表的标志格式一致.
pub fn write_candidates<W: Write>(candidates: &[CandidateInfo], w: W) -> LunaResult<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["scan_id", "x", "y", "z", "is_nodule", "diameter_mm"])?;
    for c in candidates {
        let p = c.center_xyz;
        wtr.write_record([
            c.scan_id.clone(),
            p.x.to_string(),
            p.y.to_string(),
            p.z.to_string(),
            u8::from(c.is_nodule).to_string(),
            c.diameter_mm.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
