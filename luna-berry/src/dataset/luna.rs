use std::ops::Range;
use std::sync::Arc;

use itertools::Itertools;
use ndarray::{Array4, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{VolumeSource, VolumeStore};
use crate::consts::DEFAULT_CROP_SHAPE;
use crate::error::{LunaError, LunaResult};
use crate::geometry::IrcTuple;
use crate::table::CandidateInfo;
use crate::Idx3d;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 按步长划分训练/验证集.
///
/// 验证集取下标为 `stride` 倍数的候选, 训练集取其余全部候选.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValSplit {
    /// 步长, 必须大于 0.
    pub stride: usize,

    /// `true` 为验证集, `false` 为训练集.
    pub is_validation: bool,
}

impl ValSplit {
    /// 验证集划分.
    #[inline]
    pub const fn validation(stride: usize) -> Self {
        Self {
            stride,
            is_validation: true,
        }
    }

    /// 训练集划分.
    #[inline]
    pub const fn training(stride: usize) -> Self {
        Self {
            stride,
            is_validation: false,
        }
    }

    #[inline]
    fn keeps(&self, index: usize) -> bool {
        (index % self.stride == 0) == self.is_validation
    }
}

/// 构造 [`LunaDataset`] 的选项.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DatasetOptions {
    /// 只保留该 scan 的候选.
    pub scan_id: Option<String>,

    /// 训练/验证划分. 在 scan 过滤之后进行.
    pub split: Option<ValSplit>,

    /// 子体积形状 (index, row, col).
    pub crop_shape: Idx3d,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            scan_id: None,
            split: None,
            crop_shape: DEFAULT_CROP_SHAPE,
        }
    }
}

/// 一个训练样本.
#[derive(Clone, Debug, PartialEq)]
pub struct LunaSample {
    /// 单通道子体积, 形状为 `(1, index, row, col)`.
    pub tensor: Array4<f32>,

    /// one-hot 标签 `[非结节, 结节]`.
    pub label: [i64; 2],

    /// 所属 scan.
    pub scan_id: String,

    /// 裁剪所依据的 IRC 中心.
    pub center_irc: IrcTuple,
}

/// 可按下标随机访问的候选结节样本集合.
///
/// 样本内容只由候选表与下标决定. 子体积通过共享的 [`VolumeStore`] 获取,
/// 因此同一个访问器可以同时服务训练集与验证集.
pub struct LunaDataset<S> {
    candidates: Vec<CandidateInfo>,
    store: Arc<VolumeStore<S>>,
    crop_shape: Idx3d,
}

impl<S: VolumeSource> LunaDataset<S> {
    /// 从降序候选表 `candidates` 构造数据集.
    ///
    /// 依次应用 scan 过滤与训练/验证划分. 步长为 0, 裁剪形状含 0,
    /// 或结果为空时返回 `Err`.
    pub fn new(
        candidates: &[CandidateInfo],
        store: Arc<VolumeStore<S>>,
        options: &DatasetOptions,
    ) -> LunaResult<Self> {
        let shape = options.crop_shape;
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Err(LunaError::InvalidCropShape(shape));
        }
        if matches!(options.split, Some(ValSplit { stride: 0, .. })) {
            return Err(LunaError::InvalidStride);
        }

        let filtered = candidates
            .iter()
            .filter(|c| options.scan_id.as_ref().map_or(true, |id| c.scan_id == *id));
        let candidates: Vec<CandidateInfo> = match options.split {
            Some(split) => filtered
                .enumerate()
                .filter(|(i, _)| split.keeps(*i))
                .map(|(_, c)| c.clone())
                .collect(),
            None => filtered.cloned().collect(),
        };

        if candidates.is_empty() {
            return Err(LunaError::EmptyDataset(format!(
                "scan filter {:?}, split {:?}",
                options.scan_id, options.split
            )));
        }
        log::info!(
            "dataset with {} candidates (scan filter {:?}, split {:?})",
            candidates.len(),
            options.scan_id,
            options.split
        );
        Ok(Self {
            candidates,
            store,
            crop_shape: shape,
        })
    }

    /// 样本个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// 是否为空. 构造成功的数据集总是非空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 子体积形状.
    #[inline]
    pub fn crop_shape(&self) -> Idx3d {
        self.crop_shape
    }

    /// 第 `index` 个候选.
    #[inline]
    pub fn candidate(&self, index: usize) -> Option<&CandidateInfo> {
        self.candidates.get(index)
    }

    /// 全部候选, 按样本下标顺序.
    #[inline]
    pub fn candidates(&self) -> &[CandidateInfo] {
        &self.candidates
    }

    /// 底层体积访问器.
    #[inline]
    pub fn store(&self) -> &Arc<VolumeStore<S>> {
        &self.store
    }

    /// 获取第 `index` 个样本.
    ///
    /// 下标越界, 或体积读取失败时返回 `Err`. 读取失败不会在内部重试.
    pub fn get(&self, index: usize) -> LunaResult<LunaSample> {
        let c = self.candidates.get(index).ok_or(LunaError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        let crop = self.store.crop(&c.scan_id, c.center_xyz, self.crop_shape)?;
        Ok(LunaSample {
            tensor: crop.data.clone().insert_axis(Axis(0)),
            label: [i64::from(!c.is_nodule), i64::from(c.is_nodule)],
            scan_id: c.scan_id.clone(),
            center_irc: crop.center_irc,
        })
    }

    /// 按下标顺序迭代所有样本.
    #[inline]
    pub fn iter(&self) -> SampleIter<'_, S> {
        SampleIter {
            dataset: self,
            range: 0..self.len(),
        }
    }

    /// 数据集涉及的 scan id, 按首次出现的顺序.
    pub fn scan_ids(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(|c| c.scan_id.as_str())
            .unique()
            .collect()
    }

    /// 并行预取所有样本的子体积, 填充缓存. 返回预取的样本数.
    ///
    /// 缓存容量小于样本数时, 先取得的子体积会被淘汰.
    #[cfg(feature = "rayon")]
    pub fn par_prefetch(&self) -> LunaResult<usize> {
        self.candidates.par_iter().try_for_each(|c| {
            self.store
                .crop(&c.scan_id, c.center_xyz, self.crop_shape)
                .map(|_| ())
        })?;
        Ok(self.len())
    }
}

/// [`LunaDataset::iter`] 的返回值.
pub struct SampleIter<'a, S> {
    dataset: &'a LunaDataset<S>,
    range: Range<usize>,
}

impl<'a, S: VolumeSource> Iterator for SampleIter<'a, S> {
    type Item = LunaResult<LunaSample>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.range.next()?;
        Some(self.dataset.get(index))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<'a, S: VolumeSource> ExactSizeIterator for SampleIter<'a, S> {
    #[inline]
    fn len(&self) -> usize {
        self.range.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{DatasetOptions, LunaDataset, ValSplit};
    use crate::dataset::testing::MemSource;
    use crate::dataset::{CacheConfig, VolumeStore};
    use crate::error::LunaError;
    use crate::geometry::IrcTuple;
    use crate::table::CandidateInfo;
    use std::sync::Arc;

    fn candidate(scan_id: &str, irc: IrcTuple, is_nodule: bool) -> CandidateInfo {
        CandidateInfo {
            is_nodule,
            diameter_mm: if is_nodule { 5.0 } else { 0.0 },
            scan_id: scan_id.to_string(),
            center_xyz: MemSource::xyz_of(irc),
        }
    }

    /// 20 个候选: 前 4 个为结节, scan 交替为 "a", "b".
    fn candidates() -> Vec<CandidateInfo> {
        (0..20)
            .map(|k| {
                let scan = if k % 2 == 0 { "a" } else { "b" };
                candidate(scan, IrcTuple::new(k % 10, 3, (k / 2) % 14), k < 4)
            })
            .collect()
    }

    fn store() -> Arc<VolumeStore<MemSource>> {
        Arc::new(VolumeStore::new(MemSource::with_scans(&["a", "b"]), &CacheConfig::default()).unwrap())
    }

    fn options(scan_id: Option<&str>, split: Option<ValSplit>) -> DatasetOptions {
        DatasetOptions {
            scan_id: scan_id.map(str::to_string),
            split,
            crop_shape: (2, 4, 4),
        }
    }

    #[test]
    fn test_validation_split() {
        let all = candidates();
        let val = LunaDataset::new(&all, store(), &options(None, Some(ValSplit::validation(10)))).unwrap();
        assert_eq!(val.len(), 2);
        assert_eq!(val.candidates(), &[all[0].clone(), all[10].clone()]);

        let train = LunaDataset::new(&all, store(), &options(None, Some(ValSplit::training(10)))).unwrap();
        assert_eq!(train.len(), 18);
        assert!(!train.candidates().contains(&all[0]));
        assert!(!train.candidates().contains(&all[10]));
        assert_eq!(train.candidate(0), Some(&all[1]));
    }

    /// 先按 scan 过滤, 再划分.
    #[test]
    fn test_scan_filter_then_split() {
        let all = candidates();
        let ds = LunaDataset::new(&all, store(), &options(Some("b"), None)).unwrap();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.scan_ids(), ["b"]);

        let ds = LunaDataset::new(&all, store(), &options(Some("b"), Some(ValSplit::validation(3)))).unwrap();
        // "b" 的候选位于原下标 1, 3, 5, ..., 19; 取过滤后的第 0, 3, 6, 9 个.
        let expected: Vec<_> = [1, 7, 13, 19].iter().map(|&i| all[i].clone()).collect();
        assert_eq!(ds.candidates(), expected.as_slice());
    }

    #[test]
    fn test_construction_errors() {
        let all = candidates();
        assert!(matches!(
            LunaDataset::new(&all, store(), &options(Some("zzz"), None)),
            Err(LunaError::EmptyDataset(_))
        ));
        assert!(matches!(
            LunaDataset::new(&all, store(), &options(None, Some(ValSplit::training(1)))),
            Err(LunaError::EmptyDataset(_))
        ));
        assert!(matches!(
            LunaDataset::new(&all, store(), &options(None, Some(ValSplit::validation(0)))),
            Err(LunaError::InvalidStride)
        ));
        let bad_shape = DatasetOptions {
            crop_shape: (0, 4, 4),
            ..DatasetOptions::default()
        };
        assert!(matches!(
            LunaDataset::new(&all, store(), &bad_shape),
            Err(LunaError::InvalidCropShape(_))
        ));
        assert!(matches!(
            LunaDataset::new(&[], store(), &DatasetOptions::default()),
            Err(LunaError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_get_sample() {
        let all = candidates();
        let ds = LunaDataset::new(&all, store(), &options(None, None)).unwrap();

        let s = ds.get(0).unwrap();
        assert_eq!(s.tensor.dim(), (1, 2, 4, 4));
        assert_eq!(s.label, [0, 1]);
        assert_eq!(s.scan_id, "a");
        assert_eq!(s.center_irc, IrcTuple::new(0, 3, 0));

        let s = ds.get(5).unwrap();
        assert_eq!(s.label, [1, 0]);
        assert_eq!(s.scan_id, "b");

        assert!(matches!(
            ds.get(20),
            Err(LunaError::IndexOutOfRange { index: 20, len: 20 })
        ));
    }

    /// 靠近边界的候选仍然得到完整形状的子体积.
    #[test]
    fn test_boundary_sample_shape() {
        let all = vec![candidate("a", IrcTuple::new(9, 11, 13), true)];
        let opts = DatasetOptions {
            crop_shape: (6, 8, 8),
            ..DatasetOptions::default()
        };
        let ds = LunaDataset::new(&all, store(), &opts).unwrap();
        let s = ds.get(0).unwrap();
        assert_eq!(s.tensor.dim(), (1, 6, 8, 8));
        assert_eq!(s.tensor[(0, 5, 7, 7)], -1000.0);
    }

    /// 相同下标总是得到相同样本, 不同数据集实例之间也一致.
    #[test]
    fn test_deterministic() {
        let all = candidates();
        let a = LunaDataset::new(&all, store(), &options(None, None)).unwrap();
        let b = LunaDataset::new(&all, store(), &options(None, None)).unwrap();
        for i in [0, 7, 19, 7] {
            assert_eq!(a.get(i).unwrap(), b.get(i).unwrap());
        }
    }

    #[test]
    fn test_iter() {
        let all = candidates();
        let ds = LunaDataset::new(&all, store(), &options(None, Some(ValSplit::validation(5)))).unwrap();
        let it = ds.iter();
        assert_eq!(it.len(), 4);
        let samples: Vec<_> = it.collect::<Result<_, _>>().unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[2], ds.get(2).unwrap());
        assert_eq!(ds.scan_ids(), ["a", "b"]);
    }

    /// 训练集与验证集共享同一个体积访问器, 每个 scan 只加载一次.
    #[test]
    fn test_shared_store() {
        let all = candidates();
        let store = Arc::new(
            VolumeStore::new(
                MemSource::with_scans(&["a", "b"]),
                &CacheConfig {
                    volume_capacity: 2,
                    ..CacheConfig::default()
                },
            )
            .unwrap(),
        );
        let val = LunaDataset::new(&all, Arc::clone(&store), &options(None, Some(ValSplit::validation(4)))).unwrap();
        let train = LunaDataset::new(&all, Arc::clone(&store), &options(None, Some(ValSplit::training(4)))).unwrap();
        for s in val.iter().chain(train.iter()) {
            s.unwrap();
        }
        assert_eq!(store.source().loads(), 2);
        assert_eq!(store.cached_crops(), 20);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_prefetch() {
        let all = candidates();
        let ds = LunaDataset::new(&all, store(), &options(None, None)).unwrap();
        assert_eq!(ds.par_prefetch().unwrap(), 20);
        assert_eq!(ds.store().cached_crops(), 20);
        let loads = ds.store().source().loads();
        ds.get(13).unwrap();
        assert_eq!(ds.store().source().loads(), loads);
    }
}
