//! 点集最近邻距离查询.
//!
//! 中心线距离类指标需要计算 "一个体素到另一组体素的最近物理距离".
//! 本模块提供两种实现: 暴力线性扫描 [`PointIndex::brute_nearest_mm`]
//! 与均匀网格桶索引 [`PointIndex::nearest_mm`]. 两者结果完全一致,
//! 后者在大规模中心线上显著更快; 等价性由测试保证.

use std::collections::{HashMap, HashSet};

use binary_heap_plus::BinaryHeap;
use ordered_float::NotNan;

use crate::consts::UNDEFINED_DISTANCE_MM;
use crate::{Idx3d, Idx3dF};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 均匀网格桶的三维格子编号.
type Cell = (i64, i64, i64);

/// 将体素索引按分辨率缩放成毫米坐标.
#[inline]
fn to_mm((z, h, w): Idx3d, [zm, hm, wm]: [f64; 3]) -> Idx3dF {
    (z as f64 * zm, h as f64 * hm, w as f64 * wm)
}

/// 两个毫米坐标间的欧氏距离.
#[inline]
fn euclidean((az, ah, aw): Idx3dF, (bz, bh, bw): Idx3dF) -> f64 {
    ((az - bz).powi(2) + (ah - bh).powi(2) + (aw - bw).powi(2)).sqrt()
}

/// 两个体素索引间的物理欧氏距离, 以毫米为单位.
#[inline]
pub fn voxel_distance_mm(a: Idx3d, b: Idx3d, pix_dim: [f64; 3]) -> f64 {
    euclidean(to_mm(a, pix_dim), to_mm(b, pix_dim))
}

/// 目标点集上的最近邻距离索引.
///
/// 点在构造时统一缩放成毫米坐标, 并按边长 `cell_mm` 的均匀立方格子分桶.
/// 查询时从查询点所在格子出发, 按 "查询点到格子包围盒的下界距离"
/// 从小到大展开相邻格子, 一旦下界超过当前最优即终止, 因此结果是精确的.
///
/// 允许空点集: 此时任何查询都返回 [`UNDEFINED_DISTANCE_MM`] 哨兵.
#[derive(Debug, Clone)]
pub struct PointIndex {
    pix_dim: [f64; 3],
    points_mm: Vec<Idx3dF>,
    buckets: HashMap<Cell, Vec<u32>>,
    cell_mm: f64,

    /// 被占用格子的包围盒 (闭区间). 空点集时无意义.
    cell_lo: Cell,
    cell_hi: Cell,
}

impl PointIndex {
    /// 在 `points` (体素索引) 上构建索引. `pix_dim` 为 \[z, h, w\] 体素分辨率,
    /// 以毫米为单位.
    ///
    /// 格子边长取最大轴向分辨率的三倍, 保证单个格子至少覆盖数个体素.
    pub fn new(points: Vec<Idx3d>, pix_dim: [f64; 3]) -> Self {
        let cell_mm = pix_dim
            .iter()
            .fold(f64::MIN, |acc, d| acc.max(*d))
            .max(1e-6)
            * 3.0;

        let points_mm: Vec<Idx3dF> = points.iter().map(|&p| to_mm(p, pix_dim)).collect();

        let mut buckets: HashMap<Cell, Vec<u32>> = HashMap::new();
        let mut cell_lo = (i64::MAX, i64::MAX, i64::MAX);
        let mut cell_hi = (i64::MIN, i64::MIN, i64::MIN);

        for (i, &p) in points_mm.iter().enumerate() {
            let cell = cell_of(p, cell_mm);
            cell_lo = (
                cell_lo.0.min(cell.0),
                cell_lo.1.min(cell.1),
                cell_lo.2.min(cell.2),
            );
            cell_hi = (
                cell_hi.0.max(cell.0),
                cell_hi.1.max(cell.1),
                cell_hi.2.max(cell.2),
            );
            buckets.entry(cell).or_default().push(i as u32);
        }

        Self {
            pix_dim,
            points_mm,
            buckets,
            cell_mm,
            cell_lo,
            cell_hi,
        }
    }

    /// 索引中目标点的个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points_mm.len()
    }

    /// 目标点集是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points_mm.is_empty()
    }

    /// `query` (体素索引) 到目标点集的最近物理距离, 以毫米为单位.
    ///
    /// 目标点集为空时返回 [`UNDEFINED_DISTANCE_MM`].
    pub fn nearest_mm(&self, query: Idx3d) -> f64 {
        if self.is_empty() {
            return UNDEFINED_DISTANCE_MM;
        }
        let q = to_mm(query, self.pix_dim);

        // 起始格子收拢进占用包围盒, 保证展开过程不会在盒外游走.
        let start = clamp_cell(cell_of(q, self.cell_mm), self.cell_lo, self.cell_hi);

        // 堆顶为下界距离最小的格子.
        let mut heap: BinaryHeap<(NotNan<f64>, Cell), _> =
            BinaryHeap::new_by(|a: &(NotNan<f64>, Cell), b: &(NotNan<f64>, Cell)| b.0.cmp(&a.0));
        let mut visited = HashSet::with_capacity(32);

        heap.push((self.cell_lower_bound(q, start), start));
        visited.insert(start);

        let mut best = f64::INFINITY;
        while let Some((lower, cell)) = heap.pop() {
            // 剩余格子的下界只会更大, 最优解已经找到.
            if lower.into_inner() > best {
                break;
            }

            if let Some(indices) = self.buckets.get(&cell) {
                for &i in indices {
                    best = best.min(euclidean(q, self.points_mm[i as usize]));
                }
            }

            for next in self.cell_neighbours(cell) {
                if visited.insert(next) {
                    heap.push((self.cell_lower_bound(q, next), next));
                }
            }
        }
        best
    }

    /// 暴力线性扫描版本的最近距离查询, 语义与 [`Self::nearest_mm`] 完全一致.
    ///
    /// 保留该实现作为正确性基准, 索引实现的等价性测试以它为参照.
    pub fn brute_nearest_mm(&self, query: Idx3d) -> f64 {
        let q = to_mm(query, self.pix_dim);
        // `f64::min` 会丢弃 NaN, 因此空点集的初始哨兵只在没有任何点时保留.
        self.points_mm
            .iter()
            .map(|&p| euclidean(q, p))
            .fold(UNDEFINED_DISTANCE_MM, f64::min)
    }

    /// 逐个查询 `queries` 中每个点的最近距离, 结果顺序与查询顺序一致.
    ///
    /// 打开 `rayon` feature 时并行执行; 两种模式结果一致.
    pub fn match_point_sets(&self, queries: &[Idx3d]) -> Vec<f64> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let ans = queries.par_iter().map(|&p| self.nearest_mm(p)).collect();
            } else {
                let ans = queries.iter().map(|&p| self.nearest_mm(p)).collect();
            }
        }
        ans
    }

    /// `q` 到格子 `cell` 包围盒的最小可能距离.
    fn cell_lower_bound(&self, q: Idx3dF, cell: Cell) -> NotNan<f64> {
        let axis = |pos: f64, c: i64| -> f64 {
            let lo = c as f64 * self.cell_mm;
            let hi = lo + self.cell_mm;
            if pos < lo {
                lo - pos
            } else if pos > hi {
                pos - hi
            } else {
                0.0
            }
        };
        let dz = axis(q.0, cell.0);
        let dh = axis(q.1, cell.1);
        let dw = axis(q.2, cell.2);

        // 距离分量均有限, 不可能出现 NaN.
        NotNan::new((dz * dz + dh * dh + dw * dw).sqrt()).unwrap()
    }

    /// `cell` 在占用包围盒内的 26-邻居格子.
    fn cell_neighbours(&self, (cz, ch, cw): Cell) -> Vec<Cell> {
        let (lo, hi) = (self.cell_lo, self.cell_hi);
        let mut ans = Vec::with_capacity(26);
        for dz in -1..=1i64 {
            for dh in -1..=1i64 {
                for dw in -1..=1i64 {
                    if (dz, dh, dw) == (0, 0, 0) {
                        continue;
                    }
                    let next = (cz + dz, ch + dh, cw + dw);
                    let inside = (lo.0..=hi.0).contains(&next.0)
                        && (lo.1..=hi.1).contains(&next.1)
                        && (lo.2..=hi.2).contains(&next.2);
                    if inside {
                        ans.push(next);
                    }
                }
            }
        }
        ans
    }
}

/// 毫米坐标所在的格子编号.
#[inline]
fn cell_of((z, h, w): Idx3dF, cell_mm: f64) -> Cell {
    (
        (z / cell_mm).floor() as i64,
        (h / cell_mm).floor() as i64,
        (w / cell_mm).floor() as i64,
    )
}

/// 将格子编号收拢到闭区间 `[lo, hi]` 内.
#[inline]
fn clamp_cell((z, h, w): Cell, lo: Cell, hi: Cell) -> Cell {
    (
        z.clamp(lo.0, hi.0),
        h.clamp(lo.1, hi.1),
        w.clamp(lo.2, hi.2),
    )
}
