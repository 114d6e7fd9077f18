//! 对 `luna-berry::dataset` 的更一层封装. 从环境变量确定数据目录.

use luna_berry::consts::DATA_DIR_ENV;
use luna_berry::dataset::{home_dataset_dir_with, LunaContext, LunaPaths};
use std::env;
use std::path::PathBuf;

/// 获取 LUNA 数据目录.
///
/// 1. 若环境变量 `$DataDir` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/luna`. 无法确定用户主目录时返回 `None`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var_os(DATA_DIR_ENV) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["luna"]),
    }
}

/// 以 `$DataDir` 或者 `$HOME/dataset/luna` 为根的默认目录布局.
#[inline]
pub fn paths_from_env_or_home() -> Option<LunaPaths> {
    data_dir_from_env_or_home().map(LunaPaths::new)
}

/// 以 `$DataDir` 或者 `$HOME/dataset/luna` 为数据目录的上下文.
#[inline]
pub fn context_from_env_or_home() -> Option<LunaContext> {
    paths_from_env_or_home().map(LunaContext::new)
}
