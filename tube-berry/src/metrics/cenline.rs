//! 中心线拓扑与距离类指标: 树长度、距离型假阳/假阴误差与假阴计数.

use num::Float;

use crate::consts::{DIST_TOLERANCE_MM, UNDEFINED_DISTANCE_MM};
use crate::distance::PointIndex;
use crate::skeleton::{Connectivity, SkeletonGraph};
use crate::{EvalGrids, Idx3d, TubeMask};

/// 预测中心线的树总长度, 以毫米为单位.
pub fn tree_length(grids: &EvalGrids, pix_dim: [f64; 3]) -> f64 {
    SkeletonGraph::from_mask(&grids.predicted_cenline, Connectivity::TwentySix)
        .total_length_mm(pix_dim)
}

/// 距离型假阳误差: 预测中心线到参考中心线的最近距离中,
/// 超出容差部分的平均值.
pub fn dist_false_positive_error(grids: &EvalGrids, pix_dim: [f64; 3]) -> f64 {
    offending_mean(&grids.predicted_cenline, &grids.reference_cenline, pix_dim)
}

/// 距离型假阴误差: 与假阳误差方向相反, 由参考中心线向预测中心线匹配.
pub fn dist_false_negative_error(grids: &EvalGrids, pix_dim: [f64; 3]) -> f64 {
    offending_mean(&grids.reference_cenline, &grids.predicted_cenline, pix_dim)
}

/// `query` 每个前景体素到 `target` 前景的最近距离中, 大于
/// [`DIST_TOLERANCE_MM`] 部分的平均值.
///
/// 约定: `target` 为空时距离无定义, 返回 [`UNDEFINED_DISTANCE_MM`];
/// 没有体素超出容差时返回 0.
fn offending_mean(query: &TubeMask, target: &TubeMask, pix_dim: [f64; 3]) -> f64 {
    let targets = target.foreground_points();
    if targets.is_empty() {
        log::warn!("distance target centreline is empty, metric value is undefined");
        return UNDEFINED_DISTANCE_MM;
    }

    let index = PointIndex::new(targets, pix_dim);
    let offending: Vec<f64> = index
        .match_point_sets(&query.foreground_points())
        .into_iter()
        .filter(|d| *d > DIST_TOLERANCE_MM)
        .collect();

    if offending.is_empty() {
        0.0
    } else {
        mean(&offending)
    }
}

/// 假阴误差个数: 参考中心线体素中, 距预测 mask 超出容差的体素个数.
pub fn num_fn_errors(grids: &EvalGrids, pix_dim: [f64; 3]) -> f64 {
    let nodes = grids.reference_cenline.foreground_points();
    missed_flags(grids, pix_dim, &nodes)
        .into_iter()
        .filter(|m| *m)
        .count() as f64
}

/// 假阴 "缺口" 个数: 上述被漏掉的参考中心线体素在骨架图上构成的连通段数.
///
/// 一整段被漏掉的分支只计一次, 与其体素长度无关.
pub fn num_fn_gap_errors(grids: &EvalGrids, pix_dim: [f64; 3]) -> f64 {
    let graph = SkeletonGraph::from_mask(&grids.reference_cenline, Connectivity::TwentySix);
    let missed = missed_flags(grids, pix_dim, graph.nodes());
    graph.count_runs(&missed) as f64
}

/// 判断 `nodes` 中每个参考中心线体素是否被预测 "漏掉".
///
/// 在预测 mask 内的体素一定没有被漏掉; 其余体素到预测 mask
/// 表面的最近距离超出 [`DIST_TOLERANCE_MM`] 时记为漏掉.
/// 预测 mask 为空时距离无定义, 所有体素都被漏掉.
///
/// 表面点索引按需构建: 中心线被完整覆盖时完全不需要距离查询.
fn missed_flags(grids: &EvalGrids, pix_dim: [f64; 3], nodes: &[Idx3d]) -> Vec<bool> {
    let mut index: Option<PointIndex> = None;

    nodes
        .iter()
        .map(|&pos| {
            if grids.predicted_mask.is_foreground_at(pos) {
                return false;
            }
            let index = index.get_or_insert_with(|| {
                PointIndex::new(grids.predicted_mask.surface_points(), pix_dim)
            });
            let d = index.nearest_mm(pos);
            d.is_nan() || d > DIST_TOLERANCE_MM
        })
        .collect()
}

/// 非空切片的算术平均值.
fn mean<T: Float>(data: &[T]) -> T {
    debug_assert!(!data.is_empty());
    let sum = data.iter().fold(T::zero(), |acc, &x| acc + x);

    // 长度来自切片, 转换不会失败.
    sum / T::from(data.len()).unwrap()
}
