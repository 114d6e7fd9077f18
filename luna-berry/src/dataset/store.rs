use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ordered_float::OrderedFloat;

use super::{BoundedCache, NpyCropStore, VolumeSource};
use crate::consts::{DEFAULT_CROP_CAPACITY, DEFAULT_VOLUME_CAPACITY};
use crate::data::{BoundaryPolicy, Crop};
use crate::error::LunaResult;
use crate::geometry::XyzTuple;
use crate::{CtVolume, Idx3d};

/// 子体积缓存键: (scan id, 病人坐标中心, 裁剪形状).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CropKey {
    /// 所属 scan.
    pub scan_id: String,

    /// 中心坐标, 按位比较.
    pub center: [OrderedFloat<f64>; 3],

    /// 裁剪形状 (index, row, col).
    pub shape: Idx3d,
}

impl CropKey {
    /// 构造缓存键.
    pub fn new(scan_id: &str, center_xyz: XyzTuple, shape: Idx3d) -> Self {
        Self {
            scan_id: scan_id.to_owned(),
            center: center_xyz.to_array().map(OrderedFloat),
            shape,
        }
    }

    /// 中心坐标.
    #[inline]
    pub fn center_xyz(&self) -> XyzTuple {
        XyzTuple::from(self.center.map(OrderedFloat::into_inner))
    }
}

/// [`VolumeStore`] 的缓存配置.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// 同时驻留内存的完整体积个数上限.
    pub volume_capacity: usize,

    /// 内存中子体积条目数上限.
    pub crop_capacity: usize,

    /// 子体积磁盘缓存目录. `None` 表示不使用磁盘缓存.
    pub disk_dir: Option<PathBuf>,

    /// 裁剪越界时的处理方式.
    pub policy: BoundaryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            volume_capacity: DEFAULT_VOLUME_CAPACITY,
            crop_capacity: DEFAULT_CROP_CAPACITY,
            disk_dir: None,
            policy: BoundaryPolicy::default(),
        }
    }
}

/// 体积与子体积的多级缓存访问器.
///
/// 查询子体积的顺序为: 内存缓存 -> 磁盘缓存 (若配置) -> 加载体积并裁剪.
/// 体积本身也按 scan id 缓存. 两级内存缓存都有容量上限, 按 LRU 淘汰.
///
/// 内部以互斥锁保护缓存, 可在多个线程间共享; 读取文件时不持有锁.
pub struct VolumeStore<S> {
    source: S,
    policy: BoundaryPolicy,
    volumes: Mutex<BoundedCache<String, Arc<CtVolume>>>,
    crops: Mutex<BoundedCache<CropKey, Arc<Crop>>>,
    disk: Option<NpyCropStore>,
}

/// 缓存中的值在插入后不会被修改, 因此锁中毒时可以继续使用.
#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: VolumeSource> VolumeStore<S> {
    /// 初始化. 配置了磁盘缓存目录时会创建该目录.
    pub fn new(source: S, config: &CacheConfig) -> LunaResult<Self> {
        let disk = match &config.disk_dir {
            Some(dir) => Some(NpyCropStore::new(dir, config.policy)?),
            None => None,
        };
        Ok(Self {
            source,
            policy: config.policy,
            volumes: Mutex::new(BoundedCache::new(config.volume_capacity)),
            crops: Mutex::new(BoundedCache::new(config.crop_capacity)),
            disk,
        })
    }

    /// 底层体积来源.
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// 裁剪越界时的处理方式.
    #[inline]
    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// 获取 `scan_id` 的完整体积. 重复访问返回同一个缓存实例.
    ///
    /// 文件缺失或读取失败时直接返回 `Err`, 不做重试.
    pub fn volume(&self, scan_id: &str) -> LunaResult<Arc<CtVolume>> {
        if let Some(v) = lock(&self.volumes).get(&scan_id.to_owned()) {
            return Ok(v);
        }
        let v = Arc::new(self.source.load(scan_id)?);
        lock(&self.volumes).insert(scan_id.to_owned(), Arc::clone(&v));
        Ok(v)
    }

    /// 获取以 `center_xyz` 为中心, 形状为 `shape` 的子体积.
    pub fn crop(&self, scan_id: &str, center_xyz: XyzTuple, shape: Idx3d) -> LunaResult<Arc<Crop>> {
        let key = CropKey::new(scan_id, center_xyz, shape);
        if let Some(c) = lock(&self.crops).get(&key) {
            return Ok(c);
        }

        let crop = match self.load_from_disk(&key)? {
            Some(c) => c,
            None => {
                log::debug!("crop cache miss for `{scan_id}` at {center_xyz:?}");
                let c = self.volume(scan_id)?.extract(center_xyz, shape, self.policy)?;
                self.save_to_disk(&key, &c);
                c
            }
        };
        let crop = Arc::new(crop);
        lock(&self.crops).insert(key, Arc::clone(&crop));
        Ok(crop)
    }

    fn load_from_disk(&self, key: &CropKey) -> LunaResult<Option<Crop>> {
        match &self.disk {
            Some(d) => d.load(key),
            None => Ok(None),
        }
    }

    /// 磁盘缓存写入失败不影响本次结果, 仅记录日志.
    fn save_to_disk(&self, key: &CropKey, crop: &Crop) {
        if let Some(d) = &self.disk {
            if let Err(e) = d.save(key, crop) {
                log::warn!("cannot persist crop for `{}`: {e}", key.scan_id);
            }
        }
    }

    /// 当前内存中的体积个数.
    #[inline]
    pub fn cached_volumes(&self) -> usize {
        lock(&self.volumes).len()
    }

    /// 当前内存中的子体积个数.
    #[inline]
    pub fn cached_crops(&self) -> usize {
        lock(&self.crops).len()
    }
}
