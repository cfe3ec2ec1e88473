//! 指标目录.
//!
//! 全部指标由封闭的 [`MetricKind`] 枚举列出, 请求方以目录名
//! (如 `"DiceCoefficient"`) 通过 [`MetricKind::from_name`] 解析;
//! 未知名字在任何病例被处理之前即报错.
//!
//! 每个指标都是四个网格 (加上可选体素分辨率) 的纯函数:
//! 计算之间不共享任何缓存, 距离索引与骨架图在单次 [`MetricKind::compute`]
//! 内按需构建、返回时释放.

use crate::EvalGrids;

mod cenline;
mod overlap;

/// 评估流程的运行时错误.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// 依赖体素分辨率的指标没有收到分辨率参数.
    MissingVoxelSpacing {
        /// 需要分辨率的指标.
        metric: MetricKind,
    },

    /// 请求了目录之外的指标名.
    UnknownMetric(String),
}

/// 指标目录中的一项.
///
/// 变体顺序即目录顺序, 也是报告的默认列顺序.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetricKind {
    /// Dice 系数.
    Dice,

    /// 完整度: 参考中心线被预测 mask 覆盖的比例.
    Completeness,

    /// 体积泄漏率.
    VolumeLeakage,

    /// 参考 mask 预膨胀后的体积泄漏率.
    VolumeLeakageDilatedGt,

    /// 中心线泄漏率.
    CenlineLeakage,

    /// 预测中心线树总长度 (毫米).
    TreeLength,

    /// 距离型假阳误差 (预测中心线 -> 参考中心线).
    CenlineDistFalsePositive,

    /// 距离型假阴误差 (参考中心线 -> 预测中心线).
    CenlineDistFalseNegative,

    /// 假阴误差体素个数.
    NumFnErrors,

    /// 假阴缺口 (连续漏检段) 个数.
    NumFnGapErrors,
}

impl MetricKind {
    /// 完整目录, 按目录顺序排列.
    pub const ALL: [MetricKind; 10] = [
        MetricKind::Dice,
        MetricKind::Completeness,
        MetricKind::VolumeLeakage,
        MetricKind::VolumeLeakageDilatedGt,
        MetricKind::CenlineLeakage,
        MetricKind::TreeLength,
        MetricKind::CenlineDistFalsePositive,
        MetricKind::CenlineDistFalseNegative,
        MetricKind::NumFnErrors,
        MetricKind::NumFnGapErrors,
    ];

    /// 指标的目录名, 也是命令行请求指标时使用的名字.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Dice => "DiceCoefficient",
            MetricKind::Completeness => "AirwayCompleteness",
            MetricKind::VolumeLeakage => "AirwayVolumeLeakage",
            MetricKind::VolumeLeakageDilatedGt => "AirwayVolumeLeakageDilatedGT",
            MetricKind::CenlineLeakage => "AirwayCentrelineLeakage",
            MetricKind::TreeLength => "AirwayTreeLength",
            MetricKind::CenlineDistFalsePositive => {
                "AirwayCentrelineDistanceFalsePositiveError"
            }
            MetricKind::CenlineDistFalseNegative => {
                "AirwayCentrelineDistanceFalseNegativeError"
            }
            MetricKind::NumFnErrors => "AirwayNumberFNErrors",
            MetricKind::NumFnGapErrors => "AirwayNumberFNGAPErrors",
        }
    }

    /// 指标在输出报告中的列名.
    pub fn column(&self) -> &'static str {
        match self {
            MetricKind::Dice => "dice",
            MetricKind::Completeness => "completeness",
            MetricKind::VolumeLeakage => "volume_leakage",
            MetricKind::VolumeLeakageDilatedGt => "volume_leakage_dilated_gt",
            MetricKind::CenlineLeakage => "cenline_leakage",
            MetricKind::TreeLength => "tree_length",
            MetricKind::CenlineDistFalsePositive => "cenline_dist_fp_error",
            MetricKind::CenlineDistFalseNegative => "cenline_dist_fn_error",
            MetricKind::NumFnErrors => "num_fn_errors",
            MetricKind::NumFnGapErrors => "num_fn_gap_errors",
        }
    }

    /// 该指标是否依赖体素分辨率?
    ///
    /// 依赖分辨率的指标在 [`Self::compute`] 时必须收到 `Some(spacing)`.
    pub fn needs_spacing(&self) -> bool {
        matches!(
            self,
            MetricKind::TreeLength
                | MetricKind::CenlineDistFalsePositive
                | MetricKind::CenlineDistFalseNegative
                | MetricKind::NumFnErrors
                | MetricKind::NumFnGapErrors
        )
    }

    /// 按目录名解析指标.
    pub fn from_name(name: &str) -> Result<Self, EvalError> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| EvalError::UnknownMetric(name.to_owned()))
    }

    /// 在一个病例的四个网格上计算该指标.
    ///
    /// `spacing` 为 \[z, h, w\] 体素分辨率 (毫米); 仅依赖分辨率的指标使用它,
    /// 缺失时返回 [`EvalError::MissingVoxelSpacing`].
    pub fn compute(
        &self,
        grids: &EvalGrids,
        spacing: Option<[f64; 3]>,
    ) -> Result<f64, EvalError> {
        let value = match self {
            MetricKind::Dice => overlap::dice(grids),
            MetricKind::Completeness => overlap::completeness(grids),
            MetricKind::VolumeLeakage => overlap::volume_leakage(grids),
            MetricKind::VolumeLeakageDilatedGt => overlap::volume_leakage_dilated_gt(grids),
            MetricKind::CenlineLeakage => overlap::cenline_leakage(grids),
            MetricKind::TreeLength => cenline::tree_length(grids, self.require(spacing)?),
            MetricKind::CenlineDistFalsePositive => {
                cenline::dist_false_positive_error(grids, self.require(spacing)?)
            }
            MetricKind::CenlineDistFalseNegative => {
                cenline::dist_false_negative_error(grids, self.require(spacing)?)
            }
            MetricKind::NumFnErrors => cenline::num_fn_errors(grids, self.require(spacing)?),
            MetricKind::NumFnGapErrors => {
                cenline::num_fn_gap_errors(grids, self.require(spacing)?)
            }
        };

        log::debug!("{}: {value:.6}", self.name());
        Ok(value)
    }

    #[inline]
    fn require(&self, spacing: Option<[f64; 3]>) -> Result<[f64; 3], EvalError> {
        spacing.ok_or(EvalError::MissingVoxelSpacing { metric: *self })
    }
}
