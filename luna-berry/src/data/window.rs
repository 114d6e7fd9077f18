//! CT HU 窗口.

use crate::consts::hu::{CLIP_LEVEL, CLIP_WIDTH};
use ndarray::{ArrayBase, DataMut, Dimension};

/// HU 窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HuWindow {
    level: f32,
    width: f32,
}

impl Default for HuWindow {
    #[inline]
    fn default() -> Self {
        Self::from_lung_clip()
    }
}

impl HuWindow {
    /// 构建 HU 窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<HuWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 加载肺部 CT 时使用的截断窗口, 即 `[-1000, 1000]`.
    ///
    /// 低于 -1000 的值 (扫描野外的填充值) 与空气等价, 高于 1000 的值
    /// (骨骼, 金属) 对结节分类没有意义.
    #[inline]
    pub const fn from_lung_clip() -> HuWindow {
        Self {
            level: CLIP_LEVEL,
            width: CLIP_WIDTH,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 将 `hu` 截断到窗口内. NaN 视为窗下限.
    #[inline]
    pub fn clamp(&self, hu: f32) -> f32 {
        if hu.is_nan() {
            self.lower_bound()
        } else {
            hu.clamp(self.lower_bound(), self.upper_bound())
        }
    }

    /// 就地截断整个数组.
    pub fn clamp_inplace<S, D>(&self, data: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        data.mapv_inplace(|v| self.clamp(v));
    }

    /// 求 `hu` 在窗口内的相对位置 (0.0 <= value <= 1.0).
    ///
    /// 如果 `hu` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn normalize(&self, hu: f32) -> Option<f32> {
        if !hu.is_finite() {
            return None;
        }
        Some((self.clamp(hu) - self.lower_bound()) / self.width)
    }
}
