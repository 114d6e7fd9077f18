use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{for_each_record, open_table, table_from_reader, Annotation, AnnotationIndex};
use crate::consts::MATCH_RADIUS_FRACTION;
use crate::error::{LunaError, LunaResult};
use crate::geometry::XyzTuple;

/// 候选表中的一行, 尚未关联标注.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateRow {
    /// 所属 scan.
    pub scan_id: String,

    /// 候选中心的病人坐标.
    pub center_xyz: XyzTuple,

    /// 是否为真结节 (表中整数标志非零).
    pub is_nodule: bool,
}

/// 从候选表路径读取所有行.
pub fn read_candidate_rows<P: AsRef<Path>>(path: P) -> LunaResult<Vec<CandidateRow>> {
    read_rows(open_table(path.as_ref())?)
}

/// 从任意输入流 (带表头的 CSV) 读取所有候选行.
#[inline]
pub fn read_candidate_rows_from<R: Read>(rdr: R) -> LunaResult<Vec<CandidateRow>> {
    read_rows(table_from_reader(rdr))
}

fn read_rows<R: Read>(mut rdr: csv::Reader<R>) -> LunaResult<Vec<CandidateRow>> {
    let mut ans = Vec::with_capacity(1024);
    for_each_record(&mut rdr, |line, record| {
        let (scan_id, x, y, z, flag): (String, f64, f64, f64, i64) = record.deserialize(None)?;
        let center_xyz = XyzTuple::new(x, y, z);
        if !center_xyz.is_finite() {
            return Err(LunaError::MalformedRow {
                line,
                reason: format!("non-finite candidate center {center_xyz:?}"),
            });
        }
        ans.push(CandidateRow {
            scan_id,
            center_xyz,
            is_nodule: flag != 0,
        });
        Ok(())
    })?;
    Ok(ans)
}

/// 关联标注后的候选结节.
///
/// 排序规则按字段顺序比较: `is_nodule`, `diameter_mm`, `scan_id`, `center_xyz`.
/// [`resolve_candidates`] 按该规则 **降序** 输出, 因此真结节, 大直径者在前.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateInfo {
    /// 是否为真结节.
    pub is_nodule: bool,

    /// 从邻近标注继承的直径, 无匹配时为 0.0.
    pub diameter_mm: f64,

    /// 所属 scan.
    pub scan_id: String,

    /// 候选中心的病人坐标.
    pub center_xyz: XyzTuple,
}

impl Ord for CandidateInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.center_xyz, other.center_xyz);
        self.is_nodule
            .cmp(&other.is_nodule)
            .then_with(|| self.diameter_mm.total_cmp(&other.diameter_mm))
            .then_with(|| self.scan_id.cmp(&other.scan_id))
            .then_with(|| a.x.total_cmp(&b.x))
            .then_with(|| a.y.total_cmp(&b.y))
            .then_with(|| a.z.total_cmp(&b.z))
    }
}

impl PartialOrd for CandidateInfo {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CandidateInfo {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CandidateInfo {}

/// 多个标注都与候选接近时, 选择哪一个的直径.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// 按标注表中的顺序, 取第一个满足条件的标注.
    #[default]
    FirstInTableOrder,

    /// 在所有满足条件的标注中, 取中心欧氏距离最近的一个.
    Nearest,
}

/// 候选中心是否落在标注的匹配范围内: 三个轴向偏差都不超过标注直径的四分之一.
#[inline]
fn is_near(center: &XyzTuple, annotation: &Annotation) -> bool {
    let limit = annotation.diameter_mm * MATCH_RADIUS_FRACTION;
    center
        .to_array()
        .iter()
        .zip(annotation.center_xyz.to_array())
        .all(|(c, a)| (c - a).abs() <= limit)
}

/// 在 `annotations` 中为 `center` 寻找匹配标注并返回其直径, 无匹配时返回 0.0.
pub fn match_diameter(center: &XyzTuple, annotations: &[Annotation], policy: MatchPolicy) -> f64 {
    let mut near = annotations.iter().filter(|a| is_near(center, a));
    let found = match policy {
        MatchPolicy::FirstInTableOrder => near.next(),
        MatchPolicy::Nearest => near.min_by(|a, b| {
            center
                .distance_to(&a.center_xyz)
                .total_cmp(&center.distance_to(&b.center_xyz))
        }),
    };
    found.map_or(0.0, |a| a.diameter_mm)
}

/// 将候选行与标注关联, 生成降序排列的候选表.
///
/// 若 `require_on_disk` 为 `true`, 则丢弃 scan 不在 `on_disk` 中的行.
pub fn resolve_candidates<I>(
    rows: I,
    on_disk: &HashSet<String>,
    require_on_disk: bool,
    annotations: &AnnotationIndex,
    policy: MatchPolicy,
) -> Vec<CandidateInfo>
where
    I: IntoIterator<Item = CandidateRow>,
{
    let mut ans: Vec<CandidateInfo> = rows
        .into_iter()
        .filter(|row| !require_on_disk || on_disk.contains(&row.scan_id))
        .map(|row| {
            let diameter_mm =
                match_diameter(&row.center_xyz, annotations.get(&row.scan_id), policy);
            CandidateInfo {
                is_nodule: row.is_nodule,
                diameter_mm,
                scan_id: row.scan_id,
                center_xyz: row.center_xyz,
            }
        })
        .collect();
    ans.sort_unstable_by(|a, b| b.cmp(a));
    ans
}
