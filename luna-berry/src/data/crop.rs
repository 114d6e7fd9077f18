//! 以候选结节中心为基准, 从 CT 体积中裁剪固定形状的子体积.

use std::ops::Range;

use ndarray::{s, Array3, ArrayView3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::CtVolume;
use crate::consts::hu::HU_MIN;
use crate::error::{LunaError, LunaResult};
use crate::geometry::{IrcTuple, XyzTuple};
use crate::Idx3d;

/// 裁剪窗口越过体积边界时的处理方式. 两种方式都保证输出形状恰为请求形状.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BoundaryPolicy {
    /// 窗口保持以中心为准, 越界部分填充为 `HU_MIN`.
    #[default]
    PadMin,

    /// 若体积在该轴上足够大, 则把窗口平移进体积内部; 否则退化为 `PadMin`.
    ShiftInside,
}

/// 一次裁剪的结果.
#[derive(Clone, Debug, PartialEq)]
pub struct Crop {
    /// 子体积, 形状恰为请求的 (index, row, col).
    pub data: Array3<f32>,

    /// 裁剪所依据的 IRC 中心.
    pub center_irc: IrcTuple,
}

/// 某一轴上的复制计划: 源区间与其在输出中的起点.
#[derive(Debug, PartialEq, Eq)]
struct AxisPlan {
    src: Range<usize>,
    dst_start: usize,
}

/// 计算单轴窗口. 窗口为 `[center - width / 2, center - width / 2 + width)`.
///
/// 若窗口与体积完全不相交则返回 `None`. 中心可以远在体积之外 (坐标变换饱和到
/// `i64` 的边界), 窗口端点按饱和运算计算.
fn plan_axis(center: i64, width: usize, dim: usize, policy: BoundaryPolicy) -> Option<AxisPlan> {
    let (w, d) = (width as i64, dim as i64);
    let mut start = center.saturating_sub(w / 2);
    if policy == BoundaryPolicy::ShiftInside && w <= d {
        start = start.clamp(0, d - w);
    }
    let lo = start.max(0);
    let hi = start.saturating_add(w).min(d);
    (lo < hi).then(|| AxisPlan {
        src: lo as usize..hi as usize,
        dst_start: (lo - start) as usize,
    })
}

/// 从 `data` 中裁剪以 `center` 为中心, 形状为 `shape` 的子体积. 越界部分填 `fill`.
fn crop_array(
    data: ArrayView3<f32>,
    center: IrcTuple,
    shape: Idx3d,
    policy: BoundaryPolicy,
    fill: f32,
) -> Array3<f32> {
    let (di, dr, dc) = data.dim();
    let mut out = Array3::from_elem(shape, fill);
    let plans = (
        plan_axis(center.index, shape.0, di, policy),
        plan_axis(center.row, shape.1, dr, policy),
        plan_axis(center.col, shape.2, dc, policy),
    );
    if let (Some(pi), Some(pr), Some(pc)) = plans {
        let src = data.slice(s![pi.src.clone(), pr.src.clone(), pc.src.clone()]);
        let (li, lr, lc) = src.dim();
        out.slice_mut(s![
            pi.dst_start..pi.dst_start + li,
            pr.dst_start..pr.dst_start + lr,
            pc.dst_start..pc.dst_start + lc
        ])
        .assign(&src);
    }
    out
}

impl CtVolume {
    /// 以病人坐标 `center_xyz` 为中心, 裁剪形状为 `shape` (index, row, col)
    /// 的子体积.
    ///
    /// 返回值中的 `center_irc` 为 `center_xyz` 经坐标变换得到的体素中心.
    /// `shape` 的任一维为 0 时返回 `Err`.
    pub fn extract(
        &self,
        center_xyz: XyzTuple,
        shape: Idx3d,
        policy: BoundaryPolicy,
    ) -> LunaResult<Crop> {
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Err(LunaError::InvalidCropShape(shape));
        }
        let center_irc = self.geometry().xyz_to_irc(center_xyz);
        let data = crop_array(self.data(), center_irc, shape, policy, HU_MIN);
        Ok(Crop { data, center_irc })
    }
}

/// 以默认边界策略 ([`BoundaryPolicy::PadMin`]) 裁剪子体积.
#[inline]
pub fn extract_subvolume(volume: &CtVolume, center_xyz: XyzTuple, shape: Idx3d) -> LunaResult<Crop> {
    volume.extract(center_xyz, shape, BoundaryPolicy::default())
}
