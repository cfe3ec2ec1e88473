//! 通用常量.

/// 二值网格中背景体素的取值.
pub const BACKGROUND: u8 = 0;

/// 二值网格中前景体素的取值.
pub const FOREGROUND: u8 = 1;

/// 体素是否是背景?
#[inline]
pub const fn is_background(p: u8) -> bool {
    matches!(p, BACKGROUND)
}

/// 体素是否是前景?
#[inline]
pub const fn is_foreground(p: u8) -> bool {
    !is_background(p)
}

/// 中心线距离类指标的容差, 以毫米为单位.
///
/// 最近距离不超过该值的中心线体素被认为已被正确覆盖.
pub const DIST_TOLERANCE_MM: f64 = 2.0;

/// `AirwayVolumeLeakageDilatedGT` 指标中, 参考 mask 参与比较前的预膨胀次数.
pub const DILATED_GT_ITERS: usize = 2;

/// 剔除气管与主支气管区域时, 粗分割区域的膨胀次数.
///
/// 膨胀保证紧贴气管壁的预测体素也一并被剔除.
pub const TRACHEA_DILATE_ITERS: usize = 4;

/// 到空点集的最近距离没有定义, 以该哨兵值表示.
pub const UNDEFINED_DISTANCE_MM: f64 = f64::NAN;
