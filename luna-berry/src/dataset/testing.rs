//! 单元测试共用的内存体积来源.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array3;

use super::VolumeSource;
use crate::error::{LunaError, LunaResult};
use crate::geometry::{Direction, IrcTuple, VoxelGeometry, XyzTuple};
use crate::{CtVolume, Idx3d};

/// 测试体积的形状.
pub(crate) const SHAPE: Idx3d = (10, 12, 14);

/// 测试体积共用的几何信息.
pub(crate) fn geometry() -> VoxelGeometry {
    VoxelGeometry::new(
        XyzTuple::new(-10.0, -20.0, -30.0),
        XyzTuple::new(0.5, 0.5, 2.0),
        Direction::identity(),
    )
    .unwrap()
}

/// 体素值由下标和 `seed` 决定, 不同 scan 的内容不同.
pub(crate) fn volume(scan_id: &str, seed: usize) -> CtVolume {
    let data = Array3::from_shape_fn(SHAPE, |(i, r, c)| {
        ((seed * 37 + i * 131 + r * 17 + c) % 1800) as f32 - 900.0
    });
    CtVolume::new(scan_id, data, geometry())
}

/// 记录加载次数的内存体积来源.
pub(crate) struct MemSource {
    volumes: HashMap<String, CtVolume>,
    loads: AtomicUsize,
}

impl MemSource {
    pub(crate) fn with_scans(scans: &[&str]) -> Self {
        let volumes = scans
            .iter()
            .enumerate()
            .map(|(k, id)| (id.to_string(), volume(id, k)))
            .collect();
        Self {
            volumes,
            loads: AtomicUsize::new(0),
        }
    }

    /// 成功加载的次数.
    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// 测试几何下 `irc` 对应的病人坐标.
    pub(crate) fn xyz_of(irc: IrcTuple) -> XyzTuple {
        geometry().irc_to_xyz(irc)
    }
}

impl VolumeSource for MemSource {
    fn load(&self, scan_id: &str) -> LunaResult<CtVolume> {
        let v = self
            .volumes
            .get(scan_id)
            .cloned()
            .ok_or_else(|| LunaError::VolumeNotFound(scan_id.to_owned()))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(v)
    }
}
