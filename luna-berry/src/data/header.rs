//! 从 nifti header 中恢复体积的空间几何信息.
//!
//! nifti 的 sform/qform 描述 RAS 世界坐标, 而标注表与候选表使用 ITK 的 LPS 坐标.
//! 两者 x, y 轴方向相反, 因此构造几何信息前要把 x, y 分量取反.

use crate::error::LunaResult;
use crate::geometry::{Direction, VoxelGeometry, XyzTuple};
use nifti::NiftiHeader;

/// 依次尝试 sform, qform, 最后退化为单位方向矩阵.
pub(crate) fn geometry_from_header(h: &NiftiHeader) -> LunaResult<VoxelGeometry> {
    if h.sform_code > 0 {
        from_sform(h)
    } else if h.qform_code > 0 {
        from_qform(h)
    } else {
        log::warn!("volume header has neither sform nor qform, assuming identity orientation");
        let [_, w, hh, z, ..] = h.pixdim;
        let spacing = [w, hh, z].map(|p| if p > 0.0 { p as f64 } else { 1.0 });
        VoxelGeometry::new(XyzTuple::default(), spacing.into(), Direction::identity())
    }
}

/// RAS -> LPS: 原点与方向矩阵的前两行取反.
fn ras_to_lps(mut origin: [f64; 3], mut dir: [[f64; 3]; 3]) -> (XyzTuple, Direction) {
    for k in 0..2 {
        origin[k] = -origin[k];
        dir[k] = dir[k].map(|v| -v);
    }
    (origin.into(), Direction::from_rows(dir))
}

/// sform 的 3x3 部分是 `D · diag(spacing)`, 各列范数即体素尺寸.
fn from_sform(h: &NiftiHeader) -> LunaResult<VoxelGeometry> {
    let rows = [h.srow_x, h.srow_y, h.srow_z].map(|r| r.map(|v| v as f64));
    let spacing = [0, 1, 2].map(|j| {
        (rows[0][j].powi(2) + rows[1][j].powi(2) + rows[2][j].powi(2)).sqrt()
    });
    let mut dir = [[0.0; 3]; 3];
    for (i, row) in rows.iter().enumerate() {
        for j in 0..3 {
            dir[i][j] = if spacing[j] > 0.0 {
                row[j] / spacing[j]
            } else {
                row[j]
            };
        }
    }
    let (origin, dir) = ras_to_lps([rows[0][3], rows[1][3], rows[2][3]], dir);
    VoxelGeometry::new(origin, spacing.into(), dir)
}

/// qform 由四元数 `(b, c, d)` 与 `qfac` 给出旋转部分.
fn from_qform(h: &NiftiHeader) -> LunaResult<VoxelGeometry> {
    let (b, c, d) = (
        h.quatern_b as f64,
        h.quatern_c as f64,
        h.quatern_d as f64,
    );
    let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
    let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let dir = [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c) * qfac,
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b) * qfac,
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            (a * a + d * d - c * c - b * b) * qfac,
        ],
    ];
    let [_, w, hh, z, ..] = h.pixdim;
    let spacing = [w, hh, z].map(|p| (p as f64).abs());
    let offset = [h.quatern_x, h.quatern_y, h.quatern_z].map(|v| v as f64);
    let (origin, dir) = ras_to_lps(offset, dir);
    VoxelGeometry::new(origin, spacing.into(), dir)
}

#[cfg(test)]
mod tests {
    use super::geometry_from_header;
    use crate::geometry::{IrcTuple, XyzTuple};
    use nifti::NiftiHeader;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-5
    }

    fn assert_xyz(p: XyzTuple, x: f64, y: f64, z: f64) {
        assert!(f64_eq(p.x, x) && f64_eq(p.y, y) && f64_eq(p.z, z), "{p:?}");
    }

    /// ITK 写出的 header: LPS 原点 (-198.1, -195.0, -335.2), 单位方向.
    /// sform 优先于 qform, 且换算回 LPS 坐标.
    #[test]
    fn test_sform_itk_header() {
        let mut h = NiftiHeader::default();
        h.sform_code = 1;
        h.qform_code = 1;
        h.srow_x = [-0.7, 0.0, 0.0, 198.1];
        h.srow_y = [0.0, -0.7, 0.0, 195.0];
        h.srow_z = [0.0, 0.0, 2.5, -335.2];

        let g = geometry_from_header(&h).unwrap();
        assert_xyz(g.voxel_size(), 0.7, 0.7, 2.5);
        assert_xyz(g.origin(), -198.1, -195.0, -335.2);

        let irc = IrcTuple::new(10, 20, 30);
        let xyz = g.irc_to_xyz(irc);
        assert_xyz(xyz, -198.1 + 21.0, -195.0 + 14.0, -335.2 + 25.0);
        assert_eq!(g.xyz_to_irc(XyzTuple::new(-177.1, -181.0, -310.2)), irc);
    }

    /// 单位四元数 + qfac = -1: RAS 下 z 轴翻转, 换算到 LPS 后 x, y 也翻转.
    #[test]
    fn test_qform() {
        let mut h = NiftiHeader::default();
        h.qform_code = 1;
        h.pixdim = [-1.0, 0.5, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0];
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 0.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (10.0, 20.0, 30.0);

        let g = geometry_from_header(&h).unwrap();
        assert_xyz(g.voxel_size(), 0.5, 0.5, 2.0);
        assert_xyz(g.origin(), -10.0, -20.0, 30.0);
        assert_xyz(g.irc_to_xyz(IrcTuple::new(1, 2, 4)), -12.0, -21.0, 28.0);
    }

    /// 无方向信息时退化为单位矩阵.
    #[test]
    fn test_fallback() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 0;
        h.pixdim = [1.0, 0.8, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0];

        let g = geometry_from_header(&h).unwrap();
        assert_xyz(g.voxel_size(), 0.8, 0.8, 1.0);
        assert_xyz(g.origin(), 0.0, 0.0, 0.0);
    }
}
