//! 🫁欢迎光临🫁
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{extract_subvolume, BoundaryPolicy, Crop, CtVolume, HuWindow};
pub use crate::error::{LunaError, LunaResult};
pub use crate::geometry::{irc_to_xyz, xyz_to_irc, Direction, IrcTuple, VoxelGeometry, XyzTuple};

pub use crate::table::{
    write_candidates, Annotation, AnnotationIndex, CandidateInfo, CandidateSummary, MatchPolicy,
};

pub use crate::dataset::{home_dataset_dir_with, LunaPaths};
pub use crate::dataset::{
    CacheConfig, DatasetOptions, LunaContext, LunaDataset, LunaSample, NiftiSource, ValSplit,
    VolumeSource, VolumeStore,
};

pub use crate::consts::{DATA_DIR_ENV, DEFAULT_CROP_SHAPE};
