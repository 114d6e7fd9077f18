use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{arr1, Array1, Array3};
use ndarray_npy::{read_npy, write_npy};

use super::CropKey;
use crate::data::{BoundaryPolicy, Crop};
use crate::error::LunaResult;
use crate::geometry::IrcTuple;

/// 子体积的磁盘缓存.
///
/// 每个子体积保存为两个 npy 文件: 裁剪数据 `*.crop.npy` 和 IRC 中心 `*.center.npy`,
/// 位于 `{root}/{scan_id}/` 下. 写入时先写临时文件再重命名,
/// 因此多个进程可以共享同一目录.
#[derive(Debug)]
pub struct NpyCropStore {
    root: PathBuf,
    policy: BoundaryPolicy,
    turn: AtomicU64,
}

impl NpyCropStore {
    /// 以 `root` 为缓存目录. 目录不存在时会被创建.
    ///
    /// `policy` 参与文件命名, 不同边界策略的结果互不混用.
    pub fn new<P: AsRef<Path>>(root: P, policy: BoundaryPolicy) -> LunaResult<Self> {
        let root = root.as_ref().to_owned();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            policy,
            turn: AtomicU64::new(0),
        })
    }

    /// 缓存目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 文件名前缀. 中心坐标按位编码, 保证与内存缓存键一一对应.
    fn stem(&self, key: &CropKey) -> PathBuf {
        let (i, r, c) = key.shape;
        let [x, y, z] = key.center_xyz().to_array().map(f64::to_bits);
        let tag = match self.policy {
            BoundaryPolicy::PadMin => "pad",
            BoundaryPolicy::ShiftInside => "shift",
        };
        self.root
            .join(&key.scan_id)
            .join(format!("{i}x{r}x{c}_{tag}_{x:016x}_{y:016x}_{z:016x}"))
    }

    #[inline]
    fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
        let mut s = stem.as_os_str().to_owned();
        s.push(suffix);
        PathBuf::from(s)
    }

    /// 读取缓存. 不存在, 或文件损坏与请求不符时返回 `Ok(None)`, 由调用者重新计算并覆盖.
    pub fn load(&self, key: &CropKey) -> LunaResult<Option<Crop>> {
        let stem = self.stem(key);
        let crop_path = Self::with_suffix(&stem, ".crop.npy");
        if !crop_path.is_file() {
            return Ok(None);
        }
        let entry = read_npy::<_, Array3<f32>>(&crop_path).and_then(|data| {
            let center: Array1<i64> = read_npy(Self::with_suffix(&stem, ".center.npy"))?;
            Ok((data, center))
        });
        let (data, center) = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("ignoring unreadable cached crop `{}`: {e}", crop_path.display());
                return Ok(None);
            }
        };
        if data.dim() != key.shape || center.len() != 3 {
            log::warn!("ignoring inconsistent cached crop `{}`", crop_path.display());
            return Ok(None);
        }
        Ok(Some(Crop {
            data,
            center_irc: IrcTuple::new(center[0], center[1], center[2]),
        }))
    }

    /// 写入缓存. 中心先于数据落盘, 因此数据文件存在即代表条目完整.
    pub fn save(&self, key: &CropKey, crop: &Crop) -> LunaResult<()> {
        let stem = self.stem(key);
        if let Some(dir) = stem.parent() {
            fs::create_dir_all(dir)?;
        }
        let center = arr1(&crop.center_irc.to_array());
        self.write_atomic(&Self::with_suffix(&stem, ".center.npy"), |p| {
            write_npy(p, &center)
        })?;
        self.write_atomic(&Self::with_suffix(&stem, ".crop.npy"), |p| {
            write_npy(p, &crop.data)
        })
    }

    fn write_atomic<F>(&self, path: &Path, write: F) -> LunaResult<()>
    where
        F: FnOnce(&Path) -> Result<(), ndarray_npy::WriteNpyError>,
    {
        let turn = self.turn.fetch_add(1, Ordering::Relaxed);
        let tmp = Self::with_suffix(path, &format!(".{}-{turn}.tmp", std::process::id()));
        write(&tmp)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
