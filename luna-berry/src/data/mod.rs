//! CT 体积的加载与访问.

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView3, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::error::{LunaError, LunaResult};
use crate::geometry::VoxelGeometry;
use crate::Idx3d;

pub mod crop;
mod header;
pub mod window;

pub use crop::{extract_subvolume, BoundaryPolicy, Crop};
pub use window::HuWindow;

/// 3D CT 体积. HU 值以 `f32` 保存, 并已截断到 `[-1000, 1000]`.
///
/// 数据按 (index, row, col) 即 (z, H, W) 组织, 与 [`crate::IrcTuple`] 一致.
#[derive(Debug, Clone)]
pub struct CtVolume {
    scan_id: String,
    data: Array3<f32>,
    geometry: VoxelGeometry,
}

impl Index<Idx3d> for CtVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtVolume {
    /// 由裸数据和几何信息直接构造. `data` 按 (index, row, col) 组织,
    /// 构造时会将 HU 值截断到 [`HuWindow::from_lung_clip`] 范围内.
    pub fn new(scan_id: impl Into<String>, mut data: Array3<f32>, geometry: VoxelGeometry) -> Self {
        HuWindow::from_lung_clip().clamp_inplace(&mut data);
        Self {
            scan_id: scan_id.into(),
            data,
            geometry,
        }
    }

    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(scan_id: &str, path: P) -> LunaResult<Self> {
        let path = path.as_ref();
        let wrap = |source| LunaError::Nifti {
            path: path.to_owned(),
            source,
        };
        let not_a_volume = |ndim| LunaError::NotAVolume {
            scan_id: scan_id.to_owned(),
            ndim,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(wrap)?;
        let geometry = header::geometry_from_header(obj.header())?;

        let data = obj.into_volume().into_ndarray::<f32>().map_err(wrap)?;
        let ndim = data.ndim();
        if ndim != 3 {
            return Err(not_a_volume(ndim));
        }
        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| not_a_volume(ndim))?
            .permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        log::debug!("loaded volume `{scan_id}` with shape {:?}", data.dim());
        Ok(Self::new(scan_id, data, geometry))
    }

    /// 该体积所属的 scan id.
    #[inline]
    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// 获取数据形状大小 (index, row, col).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取空间几何信息.
    #[inline]
    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}
