//! 通用常量.

/// CT HU 值相关常量.
pub mod hu {
    /// 加载体积时保留的最小 HU 值 (空气).
    pub const HU_MIN: f32 = -1000.0;

    /// 加载体积时保留的最大 HU 值 (致密骨).
    pub const HU_MAX: f32 = 1000.0;

    /// `[HU_MIN, HU_MAX]` 对应窗口的窗位.
    pub const CLIP_LEVEL: f32 = (HU_MIN + HU_MAX) / 2.0;

    /// `[HU_MIN, HU_MAX]` 对应窗口的窗宽.
    pub const CLIP_WIDTH: f32 = HU_MAX - HU_MIN;
}

/// 默认裁剪形状 `(index, row, col)`.
pub const DEFAULT_CROP_SHAPE: (usize, usize, usize) = (32, 48, 48);

/// 数据目录环境变量名.
pub const DATA_DIR_ENV: &str = "DataDir";

/// 数据目录下候选结节表的文件名.
pub const CANDIDATES_CSV: &str = "candidates.csv";

/// 数据目录下真值标注表的文件名.
pub const ANNOTATIONS_CSV: &str = "annotations.csv";

/// 相对数据目录的默认体积文件匹配模式.
pub const DEFAULT_VOLUME_PATTERNS: [&str; 2] = ["subset*/*.nii", "subset*/*.nii.gz"];

/// 体积文件后缀. 较长者在前, 以便按后缀剥离 scan id.
pub const VOLUME_SUFFIXES: [&str; 2] = [".nii.gz", ".nii"];

/// 同时驻留内存的 CT 体积数默认上限.
pub const DEFAULT_VOLUME_CAPACITY: usize = 1;

/// 内存中子体积缓存条目数默认上限.
pub const DEFAULT_CROP_CAPACITY: usize = 4096;

/// 标注匹配时, 每个坐标轴允许的偏差占标注直径的比例.
pub const MATCH_RADIUS_FRACTION: f64 = 0.25;
