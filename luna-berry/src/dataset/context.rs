use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{CacheConfig, LunaPaths, NiftiSource, VolumeStore};
use crate::error::LunaResult;
use crate::table::{
    read_candidate_rows, resolve_candidates, AnnotationIndex, CandidateInfo, CandidateSummary,
    MatchPolicy,
};

/// 一个 worker 持有的全部只读派生数据.
///
/// 磁盘 scan 集合, 标注索引以及两种 (`require_on_disk` 为真/假) 候选表
/// 都在第一次访问时构建, 此后直接返回同一份结果. 构建失败不会被缓存,
/// 下一次访问会重新尝试.
///
/// 不同 worker 各自构造自己的 `LunaContext`, 互不共享.
#[derive(Debug)]
pub struct LunaContext {
    paths: LunaPaths,
    policy: MatchPolicy,
    source: NiftiSource,
    on_disk: OnceCell<Arc<HashSet<String>>>,
    annotations: OnceCell<Arc<AnnotationIndex>>,
    /// 下标为 `require_on_disk as usize`.
    candidates: [OnceCell<Arc<[CandidateInfo]>>; 2],
}

impl LunaContext {
    /// 以 `paths` 描述的数据目录创建上下文. 此时不读取任何文件.
    pub fn new(paths: LunaPaths) -> Self {
        let source = NiftiSource::from_paths(&paths);
        Self {
            paths,
            policy: MatchPolicy::default(),
            source,
            on_disk: OnceCell::new(),
            annotations: OnceCell::new(),
            candidates: [OnceCell::new(), OnceCell::new()],
        }
    }

    /// 指定标注匹配策略. 只影响之后构建的候选表.
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self.candidates = [OnceCell::new(), OnceCell::new()];
        self
    }

    /// 数据目录布局.
    #[inline]
    pub fn paths(&self) -> &LunaPaths {
        &self.paths
    }

    /// 标注匹配策略.
    #[inline]
    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    /// 磁盘上存在体积文件的 scan id 集合.
    pub fn scans_on_disk(&self) -> LunaResult<Arc<HashSet<String>>> {
        self.on_disk
            .get_or_try_init(|| self.source.scans_on_disk().map(Arc::new))
            .cloned()
    }

    /// 标注索引.
    pub fn annotations(&self) -> LunaResult<Arc<AnnotationIndex>> {
        self.annotations
            .get_or_try_init(|| AnnotationIndex::open(self.paths.annotations()).map(Arc::new))
            .cloned()
    }

    /// 降序排列的候选表. `require_on_disk` 为 `true` 时只保留体积文件存在的 scan.
    pub fn candidates(&self, require_on_disk: bool) -> LunaResult<Arc<[CandidateInfo]>> {
        self.candidates[require_on_disk as usize]
            .get_or_try_init(|| {
                let annotations = self.annotations()?;
                let on_disk = if require_on_disk {
                    self.scans_on_disk()?
                } else {
                    Arc::default()
                };
                let rows = read_candidate_rows(self.paths.candidates())?;
                let ans = resolve_candidates(rows, &on_disk, require_on_disk, &annotations, self.policy);
                let s = CandidateSummary::of(&ans);
                log::info!(
                    "resolved {} candidates ({} nodules, {} scans, require_on_disk = {require_on_disk})",
                    s.total,
                    s.nodules,
                    s.scans
                );
                Ok(Arc::from(ans))
            })
            .cloned()
    }

    /// 以本上下文的数据目录为体积来源, 创建新的体积访问器.
    pub fn volume_store(&self, config: &CacheConfig) -> LunaResult<VolumeStore<NiftiSource>> {
        VolumeStore::new(self.source.clone(), config)
    }
}
