#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供管状解剖结构 (气道树/血管树) 3D 分割结果与专家真值之间的定量评估算法.
//!
//! 评估以 "病例" 为单位: 每个病例由四个二值体素网格组成, 即预测/参考 mask
//! 与预测/参考中心线骨架. 本 crate 负责从这四个网格计算一组固定的几何与拓扑一致性指标,
//! 包括重叠度 (Dice)、完整度、体积泄漏、中心线泄漏、树长度,
//! 以及基于中心线最近距离的假阳/假阴错误统计.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有网格在载入时被二值化为 {0, 1}, 之后不再修改; 形态学操作返回新网格.
//! 2. 面向用户输入的错误 (文件缺失、形状不一致、未知指标名) 以 `Result` 返回;
//!    库内部约定被违反时, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 体素网格与 nifti 载入 ✅
//!
//! 四网格病例结构、形状/分辨率一致性校验.
//!
//! 实现位于 `tube-berry/src/data`.
//!
//! ### 3D 二值形态学 ✅
//!
//! 6-连通膨胀/腐蚀与体素级减法, 全部为纯函数.
//!
//! 实现位于 `tube-berry/src/data/morph_3d`.
//!
//! ### 连通域与骨架图 ✅
//!
//! 6/18/26-连通域标记; 骨架体素邻接图, 支持度数查询、树长度与 "缺口" 连通段计数.
//!
//! 实现位于 `tube-berry/src/skeleton`.
//!
//! ### 点集最近邻距离 ✅
//!
//! 以毫米为单位的精确最近邻查询. 提供暴力扫描与均匀网格桶索引两种实现,
//! 两者结果一致 (有等价性测试保证).
//!
//! 实现位于 `tube-berry/src/distance`.
//!
//! ### 指标目录 ✅
//!
//! 封闭的 [`metrics::MetricKind`] 枚举, 共 10 项指标; 体素分辨率作为显式参数传入.
//!
//! 实现位于 `tube-berry/src/metrics`.
//!
//! ### 数据集文件发现 ✅
//!
//! 目录扫描、病例名推导、参考文件命名规则.
//!
//! 实现位于 `tube-berry/src/dataset`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

/// 三维体素索引, 按 `(z, h, w)` 排列, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 高精度三维坐标, 以毫米为单位.
type Idx3dF = (f64, f64, f64);

/// 体素网格基础数据结构.
mod data;

pub use data::{EvalGrids, LoadError, TubeMask, VoxelGeometry};

pub mod consts;

pub mod dataset;
pub mod distance;
pub mod metrics;
pub mod prelude;
pub mod skeleton;
