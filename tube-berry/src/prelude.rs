//! 🫁欢迎光临🫀
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::{EvalGrids, LoadError, TubeMask, VoxelGeometry};

pub use crate::consts::{
    BACKGROUND, DILATED_GT_ITERS, DIST_TOLERANCE_MM, FOREGROUND, TRACHEA_DILATE_ITERS,
    UNDEFINED_DISTANCE_MM,
};

pub use crate::dataset::{self, discover_cases, home_dataset_dir_with, ReferenceLayout};

pub use crate::distance::PointIndex;

pub use crate::metrics::{EvalError, MetricKind};

pub use crate::skeleton::{label_components, Connectivity, SkeletonGraph};
