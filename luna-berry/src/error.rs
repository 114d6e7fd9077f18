//! 运行时错误.

use std::path::PathBuf;

/// 数据准备流程中的全部错误.
#[derive(Debug, thiserror::Error)]
pub enum LunaError {
    /// 无法打开或解析 CSV 表格.
    #[error("cannot read table `{}`: {source}", path.display())]
    TableOpen {
        /// 表格路径.
        path: PathBuf,
        /// 底层错误.
        source: csv::Error,
    },

    /// 表格读取过程中的 CSV 错误 (列数不一致, 非数值字段等).
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// 行内容不合法. `line` 为 1 起始的物理行号 (含表头).
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow {
        /// 行号.
        line: u64,
        /// 原因.
        reason: String,
    },

    /// 找不到给定 scan id 的体积文件.
    #[error("no volume file for scan `{0}`")]
    VolumeNotFound(String),

    /// 体积文件读取失败.
    #[error("cannot read volume `{}`: {source}", path.display())]
    Nifti {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: nifti::NiftiError,
    },

    /// 体积不是三维的.
    #[error("volume `{scan_id}` has {ndim} dimensions, expected 3")]
    NotAVolume {
        /// scan id.
        scan_id: String,
        /// 实际维数.
        ndim: usize,
    },

    /// 方向矩阵奇异, 无法求逆. 参数为行列式值.
    #[error("direction matrix is singular (det = {0:e})")]
    SingularDirection(f64),

    /// 体素尺寸必须是有限正数.
    #[error("invalid voxel size {0:?}")]
    InvalidSpacing([f64; 3]),

    /// 裁剪形状的每一维都必须大于 0.
    #[error("invalid crop shape {0:?}")]
    InvalidCropShape((usize, usize, usize)),

    /// 验证集步长必须大于 0.
    #[error("validation stride must be positive")]
    InvalidStride,

    /// 过滤/划分后没有剩余候选.
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// 样本下标越界.
    #[error("sample index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// 请求的下标.
        index: usize,
        /// 数据集长度.
        len: usize,
    },

    /// glob 模式非法.
    #[error("bad volume pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// 读取磁盘缓存的 npy 文件失败.
    #[error("cannot read cached crop: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// 写入磁盘缓存的 npy 文件失败.
    #[error("cannot write cached crop: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 数据准备流程的运行结果.
pub type LunaResult<T> = Result<T, LunaError>;
