//! 数据集操作.
//!
//! 该模块把候选表, 体积文件与各级缓存组织成可按下标随机访问的样本集合.
//! 所有缓存都是显式构造, 按引用传递的对象, 生命周期由使用者决定;
//! 多个 worker 各自持有独立实例, 彼此之间无需协调.

use std::path::{Path, PathBuf};

use crate::consts::{ANNOTATIONS_CSV, CANDIDATES_CSV, DEFAULT_VOLUME_PATTERNS};

mod cache;
mod context;
mod luna;
mod npy_store;
mod source;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::BoundedCache;
pub use context::LunaContext;
pub use luna::{DatasetOptions, LunaDataset, LunaSample, SampleIter, ValSplit};
pub use npy_store::NpyCropStore;
pub use source::{NiftiSource, VolumeSource};
pub use store::{CacheConfig, CropKey, VolumeStore};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 数据目录布局: 两张表格的位置, 以及体积文件的匹配模式.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LunaPaths {
    data_dir: PathBuf,
    candidates: PathBuf,
    annotations: PathBuf,
    volume_patterns: Vec<String>,
}

impl LunaPaths {
    /// 以 `data_dir` 为根的默认布局:
    ///
    /// 1. `data_dir/candidates.csv`;
    /// 2. `data_dir/annotations.csv`;
    /// 3. 体积文件 `data_dir/subset*/*.nii` 与 `data_dir/subset*/*.nii.gz`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_owned();
        Self {
            candidates: data_dir.join(CANDIDATES_CSV),
            annotations: data_dir.join(ANNOTATIONS_CSV),
            volume_patterns: DEFAULT_VOLUME_PATTERNS.map(String::from).to_vec(),
            data_dir,
        }
    }

    /// 指定候选表路径.
    pub fn with_candidates<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.candidates = path.as_ref().to_owned();
        self
    }

    /// 指定标注表路径.
    pub fn with_annotations<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.annotations = path.as_ref().to_owned();
        self
    }

    /// 指定体积文件匹配模式 (相对数据目录).
    pub fn with_volume_patterns<S: Into<String>, I: IntoIterator<Item = S>>(mut self, it: I) -> Self {
        self.volume_patterns = it.into_iter().map(Into::into).collect();
        self
    }

    /// 数据目录.
    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 候选表路径.
    #[inline]
    pub fn candidates(&self) -> &Path {
        &self.candidates
    }

    /// 标注表路径.
    #[inline]
    pub fn annotations(&self) -> &Path {
        &self.annotations
    }

    /// 体积文件匹配模式.
    #[inline]
    pub fn volume_patterns(&self) -> &[String] {
        &self.volume_patterns
    }
}
