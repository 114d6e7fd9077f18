use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{glob, Pattern};
use once_cell::sync::OnceCell;

use super::LunaPaths;
use crate::consts::VOLUME_SUFFIXES;
use crate::error::{LunaError, LunaResult};
use crate::CtVolume;

/// 按 scan id 加载完整 CT 体积的能力.
///
/// 实现必须可以在多个线程中同时调用.
pub trait VolumeSource: Send + Sync {
    /// 加载 `scan_id` 对应的体积. 找不到时返回 [`LunaError::VolumeNotFound`].
    fn load(&self, scan_id: &str) -> LunaResult<CtVolume>;
}

/// 由文件名得到 scan id: 去掉 `.nii.gz` 或 `.nii` 后缀.
///
/// scan id 本身含有 `.`, 因此不能使用 `Path::file_stem`.
fn scan_id_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    VOLUME_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|id| !id.is_empty())
}

/// 从数据目录下按 glob 模式查找 nii 体积文件.
///
/// 第一次查询时遍历一次目录, 建立 scan id 到文件的索引, 此后的查询都使用该索引.
/// 克隆得到的实例共享同一索引.
#[derive(Clone, Debug)]
pub struct NiftiSource {
    root: PathBuf,
    patterns: Vec<String>,
    index: OnceCell<Arc<HashMap<String, PathBuf>>>,
}

impl NiftiSource {
    /// `patterns` 为相对 `root` 的 glob 模式.
    pub fn new<P: AsRef<Path>, S: Into<String>, I: IntoIterator<Item = S>>(
        root: P,
        patterns: I,
    ) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            index: OnceCell::new(),
        }
    }

    /// 使用 `paths` 中的数据目录和匹配模式.
    #[inline]
    pub fn from_paths(paths: &LunaPaths) -> Self {
        Self::new(paths.data_dir(), paths.volume_patterns().iter().cloned())
    }

    /// 按模式顺序列出所有匹配的体积文件.
    fn volume_files(&self) -> LunaResult<Vec<PathBuf>> {
        let root = Pattern::escape(&self.root.to_string_lossy());
        let mut ans = Vec::new();
        for pattern in self.patterns.iter() {
            for entry in glob(&format!("{root}/{pattern}"))? {
                ans.push(entry.map_err(std::io::Error::from)?);
            }
        }
        Ok(ans)
    }

    /// scan id 到体积文件的索引. 多个匹配时保留模式顺序下的第一个.
    fn index(&self) -> LunaResult<&HashMap<String, PathBuf>> {
        let index = self.index.get_or_try_init(|| {
            let files = self.volume_files()?;
            let mut ans = HashMap::with_capacity(files.len());
            for path in files.iter() {
                let Some(id) = scan_id_of(path) else {
                    continue;
                };
                match ans.entry(id.to_owned()) {
                    Entry::Vacant(e) => {
                        e.insert(path.clone());
                    }
                    Entry::Occupied(e) => {
                        log::warn!("`{}` shadowed by `{}`", path.display(), e.get().display());
                    }
                }
            }
            log::info!(
                "found {} volume files ({} scans) under `{}`",
                files.len(),
                ans.len(),
                self.root.display()
            );
            LunaResult::Ok(Arc::new(ans))
        })?;
        Ok(index)
    }

    /// 所有在磁盘上存在体积文件的 scan id.
    pub fn scans_on_disk(&self) -> LunaResult<HashSet<String>> {
        Ok(self.index()?.keys().cloned().collect())
    }

    /// 定位 `scan_id` 的体积文件. 多个匹配时取模式顺序下的第一个.
    pub fn locate(&self, scan_id: &str) -> LunaResult<PathBuf> {
        self.index()?
            .get(scan_id)
            .cloned()
            .ok_or_else(|| LunaError::VolumeNotFound(scan_id.to_owned()))
    }
}

impl VolumeSource for NiftiSource {
    fn load(&self, scan_id: &str) -> LunaResult<CtVolume> {
        let path = self.locate(scan_id)?;
        log::debug!("loading volume `{scan_id}` from `{}`", path.display());
        CtVolume::open(scan_id, path)
    }
}

#[cfg(test)]
mod tests {
    use super::{scan_id_of, NiftiSource, VolumeSource};
    use crate::error::LunaError;
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_scan_id_of() {
        let id = "1.3.6.1.4.1.14519.5.2.1.6279.6001.105756658031515062000744821260";
        assert_eq!(scan_id_of(Path::new(&format!("/d/subset0/{id}.nii"))), Some(id));
        assert_eq!(scan_id_of(Path::new(&format!("{id}.nii.gz"))), Some(id));
        assert_eq!(scan_id_of(Path::new("/d/subset0/readme.txt")), None);
        assert_eq!(scan_id_of(Path::new("/d/.nii")), None);
    }

    #[test]
    fn test_scans_on_disk_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        for (sub, name) in [
            ("subset0", "1.2.3.nii"),
            ("subset0", "notes.txt"),
            ("subset1", "4.5.6.nii.gz"),
            ("other", "7.8.9.nii"),
        ] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join(name), b"").unwrap();
        }
        let src = NiftiSource::new(dir.path(), ["subset*/*.nii", "subset*/*.nii.gz"]);

        let on_disk = src.scans_on_disk().unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.contains("1.2.3") && on_disk.contains("4.5.6"));

        let p = src.locate("4.5.6").unwrap();
        assert!(p.ends_with("subset1/4.5.6.nii.gz"));
        assert!(matches!(
            src.locate("7.8.9"),
            Err(LunaError::VolumeNotFound(id)) if id == "7.8.9"
        ));
    }

    /// 目录只遍历一次: 之后新增的文件不可见, 克隆共享同一索引.
    /// 同一 scan 出现在多个模式下时, 取第一个模式的文件.
    #[test]
    fn test_index_is_built_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("subset0")).unwrap();
        fs::create_dir_all(dir.path().join("subset1")).unwrap();
        fs::write(dir.path().join("subset0/1.2.3.nii"), b"").unwrap();
        fs::write(dir.path().join("subset1/1.2.3.nii.gz"), b"").unwrap();
        let src = NiftiSource::new(dir.path(), ["subset0/*.nii", "subset1/*.nii.gz"]);

        assert!(src.locate("1.2.3").unwrap().ends_with("subset0/1.2.3.nii"));
        let copy = src.clone();

        fs::write(dir.path().join("subset0/4.5.6.nii"), b"").unwrap();
        assert!(matches!(src.locate("4.5.6"), Err(LunaError::VolumeNotFound(_))));
        assert_eq!(copy.scans_on_disk().unwrap().len(), 1);

        let fresh = NiftiSource::new(dir.path(), ["subset0/*.nii"]);
        assert_eq!(fresh.scans_on_disk().unwrap().len(), 2);
    }

    /// 找不到文件时立即失败; 文件损坏时报告读取错误.
    #[test]
    fn test_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("subset0")).unwrap();
        fs::write(dir.path().join("subset0/broken.nii"), b"not a nifti file").unwrap();
        let src = NiftiSource::new(dir.path(), ["subset*/*.nii"]);

        assert!(matches!(src.load("absent"), Err(LunaError::VolumeNotFound(_))));
        assert!(matches!(src.load("broken"), Err(LunaError::Nifti { .. })));
    }
}
