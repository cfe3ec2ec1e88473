//! 连通域标记与骨架图分析.

use std::collections::VecDeque;

use ndarray::Array3;
use once_cell::sync::Lazy;

use crate::consts::is_background;
use crate::{Idx3d, TubeMask, VoxelGeometry};

mod graph;

pub use graph::SkeletonGraph;

/// 三维邻居偏移量.
pub type Offset = (isize, isize, isize);

/// 偏移的曼哈顿长度.
#[inline]
fn manhattan((dz, dh, dw): &Offset) -> isize {
    dz.abs() + dh.abs() + dw.abs()
}

/// 26-邻域偏移 (面 + 棱 + 角).
static OFFSETS_26: Lazy<Vec<Offset>> = Lazy::new(|| {
    let mut all = Vec::with_capacity(26);
    for dz in -1..=1 {
        for dh in -1..=1 {
            for dw in -1..=1 {
                if (dz, dh, dw) != (0, 0, 0) {
                    all.push((dz, dh, dw));
                }
            }
        }
    }
    all
});

/// 18-邻域偏移 (面 + 棱).
static OFFSETS_18: Lazy<Vec<Offset>> =
    Lazy::new(|| OFFSETS_26.iter().copied().filter(|o| manhattan(o) <= 2).collect());

/// 6-邻域偏移 (仅面).
static OFFSETS_6: Lazy<Vec<Offset>> =
    Lazy::new(|| OFFSETS_26.iter().copied().filter(|o| manhattan(o) == 1).collect());

/// 每对相反偏移只保留字典序为正的那个.
fn positive_half(all: &[Offset]) -> Vec<Offset> {
    all.iter().copied().filter(|&o| o > (0, 0, 0)).collect()
}

static HALF_26: Lazy<Vec<Offset>> = Lazy::new(|| positive_half(&OFFSETS_26));
static HALF_18: Lazy<Vec<Offset>> = Lazy::new(|| positive_half(&OFFSETS_18));
static HALF_6: Lazy<Vec<Offset>> = Lazy::new(|| positive_half(&OFFSETS_6));

/// 三维体素邻接模式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// 仅面邻接.
    Six,

    /// 面与棱邻接.
    Eighteen,

    /// 面、棱与角邻接.
    TwentySix,
}

impl Connectivity {
    /// 该邻接模式下的全部邻居偏移量.
    pub fn offsets(&self) -> &'static [Offset] {
        match self {
            Connectivity::Six => &OFFSETS_6,
            Connectivity::Eighteen => &OFFSETS_18,
            Connectivity::TwentySix => &OFFSETS_26,
        }
    }

    /// 偏移量的正半空间子集: 每对相反偏移只保留一个.
    ///
    /// 借助该子集可保证每条无向邻接边只被访问一次.
    pub(crate) fn half_offsets(&self) -> &'static [Offset] {
        match self {
            Connectivity::Six => &HALF_6,
            Connectivity::Eighteen => &HALF_18,
            Connectivity::TwentySix => &HALF_26,
        }
    }
}

/// 计算 `pos + off`. 结果越界 (含下溢) 时返回 `None`.
#[inline]
pub(crate) fn offset_from(pos: Idx3d, off: Offset, shape: Idx3d) -> Option<Idx3d> {
    let z = pos.0.checked_add_signed(off.0)?;
    let h = pos.1.checked_add_signed(off.1)?;
    let w = pos.2.checked_add_signed(off.2)?;
    (z < shape.0 && h < shape.1 && w < shape.2).then_some((z, h, w))
}

/// 按照邻接模式 `conn` 对网格前景做连通域标记.
///
/// # 返回值
///
/// 第一个分量为标签数组: 背景体素标签为 0, 前景体素标签从 1 开始;
/// 第二个分量为连通域总数. 同一连通域内的体素标签相同,
/// 标签按各连通域首个 (行优先序) 体素的出现顺序分配, 结果是确定性的.
pub fn label_components(mask: &TubeMask, conn: Connectivity) -> (Array3<u32>, u32) {
    let shape = mask.shape();
    let mut labels = Array3::<u32>::zeros(shape);
    let mut current = 0u32;

    for (pos, p) in mask.data().indexed_iter() {
        if is_background(*p) || labels[pos] != 0 {
            continue;
        }
        current += 1;
        labels[pos] = current;

        let mut queue = VecDeque::from([pos]);
        while let Some(cur) = queue.pop_front() {
            for &off in conn.offsets() {
                let Some(next) = offset_from(cur, off, shape) else {
                    continue;
                };
                if mask.is_foreground_at(next) && labels[next] == 0 {
                    labels[next] = current;
                    queue.push_back(next);
                }
            }
        }
    }
    (labels, current)
}
