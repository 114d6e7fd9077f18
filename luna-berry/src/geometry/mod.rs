//! 病人坐标系 (XYZ, 毫米) 与体素下标坐标系 (IRC) 之间的仿射变换.
//!
//! IRC 即 (index, row, col), 与 XYZ 的轴序相反: `index` 沿 z 方向增长,
//! `row` 沿 y 方向增长, `col` 沿 x 方向增长. 变换过程为
//!
//! `xyz = D · (cri ⊙ voxel_size) + origin`,
//!
//! 其中 `cri` 是把 IRC 反序得到的 (col, row, index), `D` 是 3x3 方向余弦矩阵.

use crate::error::{LunaError, LunaResult};
use ndarray::{arr1, arr2, Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 方向矩阵行列式绝对值低于该值时视为奇异.
const SINGULAR_EPS: f64 = 1e-12;

/// 病人坐标系下的点 (或向量), 以毫米为单位.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct XyzTuple {
    /// x 分量.
    pub x: f64,

    /// y 分量.
    pub y: f64,

    /// z 分量.
    pub z: f64,
}

impl XyzTuple {
    /// 直接构造.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 按 `[x, y, z]` 顺序获取分量.
    #[inline]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// 三个分量是否都是有限值.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 到 `other` 的欧氏距离.
    pub fn distance_to(&self, other: &XyzTuple) -> f64 {
        let [a, b, c] = self.to_array();
        let [x, y, z] = other.to_array();
        ((a - x).powi(2) + (b - y).powi(2) + (c - z).powi(2)).sqrt()
    }
}

impl From<[f64; 3]> for XyzTuple {
    #[inline]
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// 体素下标坐标 (index, row, col).
///
/// 使用有符号整数: 候选中心落在体积外时, 下标可以为负.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IrcTuple {
    /// 切片下标 (z 方向).
    pub index: i64,

    /// 行下标 (y 方向).
    pub row: i64,

    /// 列下标 (x 方向).
    pub col: i64,
}

impl IrcTuple {
    /// 直接构造.
    #[inline]
    pub const fn new(index: i64, row: i64, col: i64) -> Self {
        Self { index, row, col }
    }

    /// 按 `[index, row, col]` 顺序获取分量.
    #[inline]
    pub const fn to_array(self) -> [i64; 3] {
        [self.index, self.row, self.col]
    }

    /// 反序为 CRI, 即与 XYZ 对齐的轴序.
    #[inline]
    fn to_cri_f64(self) -> [f64; 3] {
        [self.col as f64, self.row as f64, self.index as f64]
    }
}

impl From<[i64; 3]> for IrcTuple {
    #[inline]
    fn from([index, row, col]: [i64; 3]) -> Self {
        Self { index, row, col }
    }
}

/// 3x3 方向余弦矩阵. 处理轴翻转与旋转.
#[derive(Clone, Debug, PartialEq)]
pub struct Direction {
    mat: Array2<f64>,
}

impl Default for Direction {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Direction {
    /// 单位矩阵.
    pub fn identity() -> Self {
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// 以行优先的 3x3 数组构造.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { mat: arr2(&rows) }
    }

    /// 获取底层矩阵的只读视图.
    #[inline]
    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.mat.view()
    }

    /// 行列式.
    pub fn determinant(&self) -> f64 {
        let m = &self.mat;
        m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
            - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
            + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
    }

    /// 求逆矩阵 (伴随矩阵法).
    ///
    /// 矩阵奇异 (或含非有限值) 时返回 [`LunaError::SingularDirection`],
    /// 不会产生无意义的数值.
    pub fn inverse(&self) -> LunaResult<Direction> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPS {
            return Err(LunaError::SingularDirection(det));
        }
        let m = &self.mat;
        let (a, b, c) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let (d, e, f) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
        let (g, h, i) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);
        let adj = arr2(&[
            [e * i - f * h, c * h - b * i, b * f - c * e],
            [f * g - d * i, a * i - c * g, c * d - a * f],
            [d * h - e * g, b * g - a * h, a * e - b * d],
        ]);
        Ok(Self { mat: adj / det })
    }

    /// 计算矩阵与列向量的乘积.
    #[inline]
    fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let r = self.mat.dot(&arr1(&v));
        [r[0], r[1], r[2]]
    }
}

#[inline]
fn check_voxel_size(voxel_size: &XyzTuple) -> LunaResult<()> {
    let arr = voxel_size.to_array();
    if arr.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(LunaError::InvalidSpacing(arr))
    }
}

/// 将 IRC 坐标转换为病人坐标系 XYZ 坐标.
///
/// IRC 先反序为 CRI, 逐元素乘以体素尺寸, 经方向矩阵线性变换后再加上原点偏移.
pub fn irc_to_xyz(
    irc: IrcTuple,
    origin: XyzTuple,
    voxel_size: XyzTuple,
    direction: &Direction,
) -> XyzTuple {
    let cri = irc.to_cri_f64();
    let vs = voxel_size.to_array();
    let scaled = [cri[0] * vs[0], cri[1] * vs[1], cri[2] * vs[2]];
    let [x, y, z] = direction.apply(scaled);
    XyzTuple::new(x + origin.x, y + origin.y, z + origin.z)
}

/// 将病人坐标系 XYZ 坐标转换为 (就近取整的) IRC 坐标.
///
/// 方向矩阵奇异或体素尺寸非法时返回 `Err`.
pub fn xyz_to_irc(
    xyz: XyzTuple,
    origin: XyzTuple,
    voxel_size: XyzTuple,
    direction: &Direction,
) -> LunaResult<IrcTuple> {
    check_voxel_size(&voxel_size)?;
    let inverse = direction.inverse()?;
    Ok(xyz_to_irc_with_inverse(xyz, origin, voxel_size, &inverse))
}

/// `xyz_to_irc` 的核心部分. `inverse` 必须是方向矩阵的逆.
fn xyz_to_irc_with_inverse(
    xyz: XyzTuple,
    origin: XyzTuple,
    voxel_size: XyzTuple,
    inverse: &Direction,
) -> IrcTuple {
    let shifted = [xyz.x - origin.x, xyz.y - origin.y, xyz.z - origin.z];
    let cri = inverse.apply(shifted);
    let vs = voxel_size.to_array();
    let [c, r, i] = [0, 1, 2].map(|k| (cri[k] / vs[k]).round() as i64);
    IrcTuple::new(i, r, c)
}

/// 一个 CT 体积的空间几何信息: 原点, 体素尺寸, 方向矩阵.
///
/// 构造时预先求出方向矩阵的逆, 因此之后的坐标转换不会失败.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGeometry {
    origin: XyzTuple,
    voxel_size: XyzTuple,
    direction: Direction,
    inverse: Direction,
}

impl VoxelGeometry {
    /// 构造几何信息.
    ///
    /// 体素尺寸必须为有限正数, 方向矩阵必须可逆, 否则返回 `Err`.
    pub fn new(origin: XyzTuple, voxel_size: XyzTuple, direction: Direction) -> LunaResult<Self> {
        check_voxel_size(&voxel_size)?;
        let inverse = direction.inverse()?;
        Ok(Self {
            origin,
            voxel_size,
            direction,
            inverse,
        })
    }

    /// 原点 (体素 `(0, 0, 0)` 中心) 的病人坐标.
    #[inline]
    pub fn origin(&self) -> XyzTuple {
        self.origin
    }

    /// 体素尺寸, 按 XYZ 轴序, 以毫米为单位.
    #[inline]
    pub fn voxel_size(&self) -> XyzTuple {
        self.voxel_size
    }

    /// 方向矩阵.
    #[inline]
    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    /// 见 [`irc_to_xyz`].
    #[inline]
    pub fn irc_to_xyz(&self, irc: IrcTuple) -> XyzTuple {
        irc_to_xyz(irc, self.origin, self.voxel_size, &self.direction)
    }

    /// 见 [`xyz_to_irc`].
    #[inline]
    pub fn xyz_to_irc(&self, xyz: XyzTuple) -> IrcTuple {
        xyz_to_irc_with_inverse(xyz, self.origin, self.voxel_size, &self.inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::{irc_to_xyz, xyz_to_irc, Direction, IrcTuple, VoxelGeometry, XyzTuple};
    use crate::error::LunaError;
    use itertools::iproduct;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    fn directions() -> Vec<Direction> {
        let (s, c) = (0.3f64.sin(), 0.3f64.cos());
        vec![
            Direction::identity(),
            // x/y 翻转 (LPS 与 RAS 之间的差异).
            Direction::from_rows([[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]),
            // 绕 z 轴旋转.
            Direction::from_rows([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]),
            // 非正交但可逆.
            Direction::from_rows([[1.0, 0.2, 0.0], [0.0, 1.0, 0.1], [0.3, 0.0, 0.9]]),
        ]
    }

    /// 轴对齐时的直接换算.
    #[test]
    fn test_identity_direction() {
        let origin = XyzTuple::new(-198.1, -195.0, -335.2);
        let vs = XyzTuple::new(0.7, 0.7, 2.5);
        let d = Direction::identity();

        let xyz = irc_to_xyz(IrcTuple::new(30, 20, 10), origin, vs, &d);
        assert!(f64_eq(xyz.x, -198.1 + 7.0));
        assert!(f64_eq(xyz.y, -195.0 + 14.0));
        assert!(f64_eq(xyz.z, -335.2 + 75.0));

        let irc = xyz_to_irc(xyz, origin, vs, &d).unwrap();
        assert_eq!(irc, IrcTuple::new(30, 20, 10));
    }

    /// 非整数位置就近取整.
    #[test]
    fn test_xyz_to_irc_rounds() {
        let origin = XyzTuple::default();
        let vs = XyzTuple::new(1.0, 2.0, 4.0);
        let irc = xyz_to_irc(
            XyzTuple::new(3.4, 5.1, 9.9),
            origin,
            vs,
            &Direction::identity(),
        )
        .unwrap();
        assert_eq!(irc, IrcTuple::new(2, 3, 3));
    }

    /// 任意可逆方向矩阵下往返变换都回到原下标.
    #[test]
    fn test_round_trip() {
        let origin = XyzTuple::new(-120.5, 33.25, -400.0);
        let vs = XyzTuple::new(0.68, 0.68, 1.25);
        for d in directions() {
            for (i, r, c) in iproduct!(-3..40i64, [-7i64, 0, 1, 255, 511], [-1i64, 0, 100, 511]) {
                let irc = IrcTuple::new(i, r, c);
                let xyz = irc_to_xyz(irc, origin, vs, &d);
                assert_eq!(xyz_to_irc(xyz, origin, vs, &d).unwrap(), irc);
            }
        }
    }

    /// 几何对象与自由函数结果一致.
    #[test]
    fn test_geometry_matches_free_functions() {
        let origin = XyzTuple::new(1.0, 2.0, 3.0);
        let vs = XyzTuple::new(0.5, 0.75, 2.0);
        for d in directions() {
            let g = VoxelGeometry::new(origin, vs, d.clone()).unwrap();
            let irc = IrcTuple::new(12, -4, 77);
            let xyz = g.irc_to_xyz(irc);
            assert_eq!(xyz, irc_to_xyz(irc, origin, vs, &d));
            assert_eq!(g.xyz_to_irc(xyz), irc);
        }
    }

    /// 奇异方向矩阵必须显式报错.
    #[test]
    fn test_singular_direction() {
        let d = Direction::from_rows([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert!(matches!(d.inverse(), Err(LunaError::SingularDirection(_))));

        let r = xyz_to_irc(
            XyzTuple::default(),
            XyzTuple::default(),
            XyzTuple::new(1.0, 1.0, 1.0),
            &d,
        );
        assert!(matches!(r, Err(LunaError::SingularDirection(_))));

        let g = VoxelGeometry::new(XyzTuple::default(), XyzTuple::new(1.0, 1.0, 1.0), d);
        assert!(g.is_err());
    }

    /// 非法体素尺寸.
    #[test]
    fn test_invalid_spacing() {
        let r = VoxelGeometry::new(
            XyzTuple::default(),
            XyzTuple::new(1.0, 0.0, 1.0),
            Direction::identity(),
        );
        assert!(matches!(r, Err(LunaError::InvalidSpacing(_))));
    }

    #[test]
    fn test_inverse_product_is_identity() {
        for d in directions() {
            let inv = d.inverse().unwrap();
            let prod = d.matrix().dot(&inv.matrix());
            for ((r, c), v) in prod.indexed_iter() {
                assert!(f64_eq(*v, if r == c { 1.0 } else { 0.0 }));
            }
        }
    }
}
