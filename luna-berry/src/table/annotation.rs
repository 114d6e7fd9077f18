use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{for_each_record, open_table, table_from_reader};
use crate::error::{LunaError, LunaResult};
use crate::geometry::XyzTuple;

/// 一条真值结节标注.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Annotation {
    /// 结节中心的病人坐标.
    pub center_xyz: XyzTuple,

    /// 结节直径, 以毫米为单位. 恒为正.
    pub diameter_mm: f64,
}

/// scan id 到其所有标注的映射.
///
/// 同一 scan 下的标注保持表格中的原始顺序.
#[derive(Clone, Debug, Default)]
pub struct AnnotationIndex {
    by_scan: HashMap<String, Vec<Annotation>>,
    len: usize,
}

impl AnnotationIndex {
    /// 从标注表路径构建索引.
    pub fn open<P: AsRef<Path>>(path: P) -> LunaResult<Self> {
        let ans = Self::from_csv(open_table(path.as_ref())?)?;
        log::info!(
            "annotation index built from `{}`: {} annotations over {} scans",
            path.as_ref().display(),
            ans.len(),
            ans.scan_count()
        );
        Ok(ans)
    }

    /// 从任意输入流 (带表头的 CSV) 构建索引.
    #[inline]
    pub fn from_reader<R: Read>(rdr: R) -> LunaResult<Self> {
        Self::from_csv(table_from_reader(rdr))
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>) -> LunaResult<Self> {
        let mut ans = Self::default();
        for_each_record(&mut rdr, |line, record| {
            let (scan_id, x, y, z, diameter_mm): (String, f64, f64, f64, f64) =
                record.deserialize(None)?;
            let center_xyz = XyzTuple::new(x, y, z);
            if !center_xyz.is_finite() {
                return Err(LunaError::MalformedRow {
                    line,
                    reason: format!("non-finite annotation center {center_xyz:?}"),
                });
            }
            if !(diameter_mm.is_finite() && diameter_mm > 0.0) {
                return Err(LunaError::MalformedRow {
                    line,
                    reason: format!("annotation diameter must be positive, got {diameter_mm}"),
                });
            }
            ans.push(
                scan_id,
                Annotation {
                    center_xyz,
                    diameter_mm,
                },
            );
            Ok(())
        })?;
        Ok(ans)
    }

    /// 追加一条标注.
    fn push(&mut self, scan_id: String, annotation: Annotation) {
        self.by_scan.entry(scan_id).or_default().push(annotation);
        self.len += 1;
    }

    /// 获取 `scan_id` 下的全部标注. 不存在时返回空切片.
    #[inline]
    pub fn get(&self, scan_id: &str) -> &[Annotation] {
        self.by_scan
            .get(scan_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 标注总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否没有任何标注.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 至少有一条标注的 scan 个数.
    #[inline]
    pub fn scan_count(&self) -> usize {
        self.by_scan.len()
    }
}

impl FromIterator<(String, Annotation)> for AnnotationIndex {
    fn from_iter<I: IntoIterator<Item = (String, Annotation)>>(iter: I) -> Self {
        let mut ans = Self::default();
        for (scan_id, annotation) in iter {
            ans.push(scan_id, annotation);
        }
        ans
    }
}
