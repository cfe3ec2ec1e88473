//! 3D 二值形态学操作.
//!
//! 所有操作均为纯函数: 输入网格不被修改, 结果以新分配的网格返回.
//! 结构元素固定为 6-连通 (钻石型).

use ndarray::{Array3, Zip};

use crate::consts::{is_background, is_foreground, BACKGROUND, FOREGROUND};
use crate::data::TubeMask;
use crate::VoxelGeometry;

/// 单轮 6-连通膨胀.
///
/// 从每个前景体素向其六个邻居散播前景值, 数据范围外的位置被忽略.
fn dilate_once(src: &Array3<u8>) -> Array3<u8> {
    let (nz, nh, nw) = src.dim();
    let mut dst = src.clone();

    for ((z, h, w), p) in src.indexed_iter() {
        if is_background(*p) {
            continue;
        }
        if z > 0 {
            dst[(z - 1, h, w)] = FOREGROUND;
        }
        if z + 1 < nz {
            dst[(z + 1, h, w)] = FOREGROUND;
        }
        if h > 0 {
            dst[(z, h - 1, w)] = FOREGROUND;
        }
        if h + 1 < nh {
            dst[(z, h + 1, w)] = FOREGROUND;
        }
        if w > 0 {
            dst[(z, h, w - 1)] = FOREGROUND;
        }
        if w + 1 < nw {
            dst[(z, h, w + 1)] = FOREGROUND;
        }
    }
    dst
}

/// 单轮 6-连通腐蚀.
///
/// 任一 6-邻居为背景或位于数据范围外的前景体素被清除.
fn erode_once(src: &Array3<u8>) -> Array3<u8> {
    let (nz, nh, nw) = src.dim();
    let mut dst = src.clone();

    for ((z, h, w), p) in src.indexed_iter() {
        if is_background(*p) {
            continue;
        }
        let on_border =
            z == 0 || h == 0 || w == 0 || z + 1 == nz || h + 1 == nh || w + 1 == nw;
        let exposed = on_border
            || is_background(src[(z - 1, h, w)])
            || is_background(src[(z + 1, h, w)])
            || is_background(src[(z, h - 1, w)])
            || is_background(src[(z, h + 1, w)])
            || is_background(src[(z, h, w - 1)])
            || is_background(src[(z, h, w + 1)]);
        if exposed {
            dst[(z, h, w)] = BACKGROUND;
        }
    }
    dst
}

impl TubeMask {
    /// 以 6-连通结构元素对网格做 `iterations` 轮二值膨胀, 返回新网格.
    ///
    /// 膨胀逐轮进行, `dilate(m).dilate(n)` 与 `dilate(m + n)` 等价.
    /// `iterations` 为 0 时结果与原网格相同 (但仍为新分配).
    ///
    /// # 注意
    ///
    /// 轮数为无符号整数, 不存在 "负数轮" 的情况.
    pub fn dilate(&self, iterations: usize) -> Self {
        let mut data = self.data().to_owned();
        for _ in 0..iterations {
            data = dilate_once(&data);
        }
        Self::from_parts(self.header_cloned(), data)
    }

    /// 以 6-连通结构元素对网格做 `iterations` 轮二值腐蚀, 返回新网格.
    ///
    /// 数据范围外视为背景, 因此贴边的前景体素在第一轮即被清除.
    pub fn erode(&self, iterations: usize) -> Self {
        let mut data = self.data().to_owned();
        for _ in 0..iterations {
            data = erode_once(&data);
        }
        Self::from_parts(self.header_cloned(), data)
    }

    /// 体素级减法: 返回 `self AND NOT other`.
    ///
    /// 当两个网格形状不一致时 panic. 面向用户输入的一致性校验应在
    /// [`crate::EvalGrids`] 层完成.
    pub fn subtract(&self, other: &Self) -> Self {
        assert_eq!(self.shape(), other.shape(), "网格形状不一致");

        let mut data = self.data().to_owned();
        Zip::from(&mut data).and(other.data()).for_each(|a, b| {
            if is_foreground(*b) {
                *a = BACKGROUND;
            }
        });
        Self::from_parts(self.header_cloned(), data)
    }
}
