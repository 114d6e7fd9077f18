#![warn(missing_docs)]

//! 核心库. 为 LUNA 格式的肺结节 CT 数据集提供训练前的数据准备.
//!
//! 主要内容:
//!
//! 1. 病人坐标系 (XYZ) 与体素下标 (IRC) 之间的仿射变换, 见 [`geometry`];
//! 2. 标注表与候选表的解析, 以及按空间邻近关系为候选继承标注直径, 见 [`table`];
//! 3. nii 体积的加载, HU 截断与固定形状的子体积裁剪, 见 [`data`];
//! 4. 带缓存的体积访问器与可按下标访问的样本集合, 见 [`dataset`].
//!
//! # 注意
//!
//! 1. 库内不会因数据问题 panic. 文件缺失, 表格格式错误, 方向矩阵奇异等情况
//!   都以 [`LunaError`] 返回.
//! 2. 所有缓存都是显式构造的对象, 没有全局状态. 多个 worker 各自构造即可.
//! 3. 读取失败不会在库内重试, 由调用方决定.
//!
//! # 示例
//!
//! ```no_run
//! use luna_berry::prelude::*;
//! use std::sync::Arc;
//!
//! let ctx = LunaContext::new(LunaPaths::new("/data/luna"));
//! let candidates = ctx.candidates(true)?;
//! let store = Arc::new(ctx.volume_store(&CacheConfig::default())?);
//! let val = LunaDataset::new(
//!     &candidates,
//!     store,
//!     &DatasetOptions {
//!         split: Some(ValSplit::validation(10)),
//!         ..DatasetOptions::default()
//!     },
//! )?;
//! let sample = val.get(0)?;
//! assert_eq!(sample.tensor.dim(), (1, 32, 48, 48));
//! # Ok::<(), LunaError>(())
//! ```

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;
pub mod data;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod prelude;
pub mod table;

pub use data::{extract_subvolume, BoundaryPolicy, Crop, CtVolume, HuWindow};
pub use error::{LunaError, LunaResult};
pub use geometry::{irc_to_xyz, xyz_to_irc, Direction, IrcTuple, VoxelGeometry, XyzTuple};
