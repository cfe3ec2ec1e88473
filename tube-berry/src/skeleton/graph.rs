//! 骨架体素邻接图.

use std::collections::{HashMap, VecDeque};

use super::{offset_from, Connectivity};
use crate::distance::voxel_distance_mm;
use crate::{Idx3d, TubeMask, VoxelGeometry};

/// 骨架体素邻接图.
///
/// 节点为骨架的前景体素, 边为给定邻接模式下的体素相邻关系, 每条无向边只存储一次.
/// 骨架允许由多个互不连通的树组成; 孤立体素构成长度为零的退化分量.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    conn: Connectivity,
    nodes: Vec<Idx3d>,
    edges: Vec<(u32, u32)>,
    adjacency: Vec<Vec<u32>>,
}

impl SkeletonGraph {
    /// 按照邻接模式 `conn` 从骨架网格构建邻接图.
    ///
    /// 节点顺序与 [`TubeMask::foreground_points`] 相同 (行优先), 结果是确定性的.
    pub fn from_mask(mask: &TubeMask, conn: Connectivity) -> Self {
        let nodes = mask.foreground_points();
        let index: HashMap<Idx3d, u32> = nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| (pos, i as u32))
            .collect();

        let shape = mask.shape();
        let mut edges = Vec::new();
        let mut adjacency = vec![Vec::new(); nodes.len()];

        for (i, &pos) in nodes.iter().enumerate() {
            for &off in conn.half_offsets() {
                let Some(next) = offset_from(pos, off, shape) else {
                    continue;
                };
                if let Some(&j) = index.get(&next) {
                    edges.push((i as u32, j));
                    adjacency[i].push(j);
                    adjacency[j as usize].push(i as u32);
                }
            }
        }

        Self {
            conn,
            nodes,
            edges,
            adjacency,
        }
    }

    /// 构图使用的邻接模式.
    #[inline]
    pub fn connectivity(&self) -> Connectivity {
        self.conn
    }

    /// 节点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 图是否没有任何节点?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 节点对应的体素索引, 按行优先序排列.
    #[inline]
    pub fn nodes(&self) -> &[Idx3d] {
        &self.nodes
    }

    /// 无向边条数.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 第 `i` 个节点的度数. 当 `i` 越界时 panic.
    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }

    /// 收集所有端点 (度数为 1 的节点) 对应的体素索引.
    pub fn endpoints(&self) -> Vec<Idx3d> {
        self.filter_nodes(|i| self.degree(i) == 1)
    }

    /// 收集所有分叉点 (度数不小于 3 的节点) 对应的体素索引.
    pub fn branch_points(&self) -> Vec<Idx3d> {
        self.filter_nodes(|i| self.degree(i) >= 3)
    }

    /// 计算骨架总长度, 以毫米为单位.
    ///
    /// 总长度为所有邻接边的物理欧氏长度之和, 每条边只计一次.
    /// 因此 10 个共线体素组成的直线贡献 9 条边的长度;
    /// 互不连通的分量相互独立, 长度可加; 孤立体素贡献为零.
    pub fn total_length_mm(&self, pix_dim: [f64; 3]) -> f64 {
        self.edges
            .iter()
            .map(|&(a, b)| {
                voxel_distance_mm(self.nodes[a as usize], self.nodes[b as usize], pix_dim)
            })
            .sum()
    }

    /// 图的连通分量个数.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.count_components(|_| true)
    }

    /// 计算由 `selected` 选中的节点在图中诱导出的连通段个数.
    ///
    /// `selected[i]` 对应 `self.nodes()[i]`; 两者长度必须一致, 否则 panic.
    /// 孤立的选中节点单独构成一段.
    pub fn count_runs(&self, selected: &[bool]) -> usize {
        assert_eq!(selected.len(), self.nodes.len(), "选中标记与节点个数不一致");
        self.count_components(|i| selected[i])
    }

    /// 统计满足 `keep` 的节点诱导出的连通分量个数.
    fn count_components<F: Fn(usize) -> bool>(&self, keep: F) -> usize {
        let mut seen = vec![false; self.nodes.len()];
        let mut count = 0usize;

        for start in 0..self.nodes.len() {
            if seen[start] || !keep(start) {
                continue;
            }
            count += 1;
            seen[start] = true;

            let mut queue = VecDeque::from([start]);
            while let Some(cur) = queue.pop_front() {
                for &nb in &self.adjacency[cur] {
                    let nb = nb as usize;
                    if !seen[nb] && keep(nb) {
                        seen[nb] = true;
                        queue.push_back(nb);
                    }
                }
            }
        }
        count
    }

    #[inline]
    fn filter_nodes<F: Fn(usize) -> bool>(&self, pred: F) -> Vec<Idx3d> {
        (0..self.nodes.len())
            .filter(|&i| pred(i))
            .map(|i| self.nodes[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BACKGROUND, FOREGROUND};
    use ndarray::Array3;

    fn mask_from_fn<F: Fn(Idx3d) -> bool>(shape: Idx3d, fill: F) -> TubeMask {
        let data =
            Array3::from_shape_fn(shape, |p| if fill(p) { FOREGROUND } else { BACKGROUND });
        TubeMask::fake(data, [1.0; 3])
    }

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_line_graph() {
        // w 方向上 10 个共线体素.
        let g = mask_from_fn((3, 3, 12), |(z, h, w)| z == 1 && h == 1 && (1..11).contains(&w));
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);

        assert_eq!(graph.len(), 10);
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.endpoints().len(), 2);
        assert!(graph.branch_points().is_empty());

        assert!(float_eq(graph.total_length_mm([1.0; 3]), 9.0));
        // 线沿 w 方向, 长度只随 w 分辨率缩放.
        assert!(float_eq(graph.total_length_mm([2.0, 2.0, 0.5]), 4.5));
    }

    #[test]
    fn test_y_shape_degrees() {
        let nodes = [(0, 0, 0), (0, 0, 2), (0, 1, 1), (0, 2, 1)];
        let g = mask_from_fn((1, 3, 3), |p| nodes.contains(&p));
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.branch_points(), vec![(0, 1, 1)]);

        let mut endpoints = graph.endpoints();
        endpoints.sort();
        assert_eq!(endpoints, vec![(0, 0, 0), (0, 0, 2), (0, 2, 1)]);
    }

    #[test]
    fn test_diagonal_edge_length() {
        let g = mask_from_fn((2, 2, 2), |p| p == (0, 0, 0) || p == (0, 1, 1));
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);
        assert_eq!(graph.edge_count(), 1);
        assert!(float_eq(graph.total_length_mm([1.0; 3]), 2f64.sqrt()));
        assert!(float_eq(
            graph.total_length_mm([1.0, 2.0, 0.5]),
            4.25f64.sqrt()
        ));

        // 6-连通不认对角边.
        let graph = SkeletonGraph::from_mask(&g, Connectivity::Six);
        assert_eq!(graph.connectivity(), Connectivity::Six);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.component_count(), 2);
    }

    #[test]
    fn test_disjoint_components_additive_length() {
        let line_a = |(z, h, w): Idx3d| z == 0 && h == 0 && w < 4;
        let line_b = |(z, h, w): Idx3d| z == 5 && h == 2 && (2..7).contains(&w);
        let g = mask_from_fn((6, 3, 8), |p| line_a(p) || line_b(p));
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);

        assert_eq!(graph.component_count(), 2);
        // 3 条边 + 4 条边.
        assert!(float_eq(graph.total_length_mm([1.0; 3]), 7.0));
    }

    #[test]
    fn test_isolated_voxel() {
        let g = mask_from_fn((3, 3, 3), |p| p == (1, 1, 1));
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.degree(0), 0);
        assert_eq!(graph.component_count(), 1);
        assert!(float_eq(graph.total_length_mm([1.0; 3]), 0.0));
        assert_eq!(graph.count_runs(&[true]), 1);
    }

    #[test]
    fn test_empty_graph() {
        let g = mask_from_fn((3, 3, 3), |_| false);
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);
        assert!(graph.is_empty());
        assert_eq!(graph.component_count(), 0);
        assert_eq!(graph.count_runs(&[]), 0);
        assert!(float_eq(graph.total_length_mm([1.0; 3]), 0.0));
    }

    #[test]
    fn test_count_runs_on_line() {
        let g = mask_from_fn((1, 1, 10), |_| true);
        let graph = SkeletonGraph::from_mask(&g, Connectivity::TwentySix);
        assert_eq!(graph.len(), 10);

        // 节点按 w 升序排列, 选中模式的每个连续段计一次.
        let selected = [
            true, true, false, true, false, false, true, true, true, false,
        ];
        assert_eq!(graph.count_runs(&selected), 3);
        assert_eq!(graph.count_runs(&[false; 10]), 0);
        assert_eq!(graph.count_runs(&[true; 10]), 1);
    }
}
