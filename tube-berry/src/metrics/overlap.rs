//! 体积重叠类指标: Dice、完整度与各类泄漏率.

use ndarray::Zip;

use crate::consts::{is_foreground, DILATED_GT_ITERS};
use crate::{EvalGrids, TubeMask};

/// 统计在 `a` 和 `b` 中同时为前景的体素个数. 两网格形状不一致时 panic.
fn count_overlap(a: &TubeMask, b: &TubeMask) -> usize {
    Zip::from(a.data()).and(b.data()).fold(0usize, |acc, x, y| {
        acc + usize::from(is_foreground(*x) && is_foreground(*y))
    })
}

/// 带空分母保护的比值: 分母为零时返回 0.
#[inline]
fn ratio(numer: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        numer as f64 / denom as f64
    }
}

/// Dice 系数: `2|P∩R| / (|P| + |R|)`. 两 mask 均为空时为 0.
pub fn dice(grids: &EvalGrids) -> f64 {
    let overlap = count_overlap(&grids.predicted_mask, &grids.reference_mask);
    ratio(
        2 * overlap,
        grids.predicted_mask.count() + grids.reference_mask.count(),
    )
}

/// 完整度: 参考中心线体素落在预测 mask 内的比例. 参考中心线为空时为 0.
pub fn completeness(grids: &EvalGrids) -> f64 {
    let covered = count_overlap(&grids.reference_cenline, &grids.predicted_mask);
    ratio(covered, grids.reference_cenline.count())
}

/// 体积泄漏率: 预测 mask 体素落在参考 mask 外的比例. 预测 mask 为空时为 0.
pub fn volume_leakage(grids: &EvalGrids) -> f64 {
    leakage_against(&grids.predicted_mask, &grids.reference_mask)
}

/// 体积泄漏率的宽容版本: 参考 mask 先膨胀 [`DILATED_GT_ITERS`] 轮,
/// 以忽略紧贴参考边界的分歧.
pub fn volume_leakage_dilated_gt(grids: &EvalGrids) -> f64 {
    let dilated = grids.reference_mask.dilate(DILATED_GT_ITERS);
    leakage_against(&grids.predicted_mask, &dilated)
}

/// 中心线泄漏率: 预测中心线体素落在参考 mask 外的比例. 预测中心线为空时为 0.
pub fn cenline_leakage(grids: &EvalGrids) -> f64 {
    leakage_against(&grids.predicted_cenline, &grids.reference_mask)
}

/// `predicted` 前景落在 `reference` 前景外的比例.
fn leakage_against(predicted: &TubeMask, reference: &TubeMask) -> f64 {
    let total = predicted.count();
    let inside = count_overlap(predicted, reference);
    ratio(total - inside, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BACKGROUND, FOREGROUND};
    use crate::Idx3d;
    use ndarray::Array3;

    fn mask_from_fn<F: Fn(Idx3d) -> bool>(shape: Idx3d, fill: F) -> TubeMask {
        let data =
            Array3::from_shape_fn(shape, |p| if fill(p) { FOREGROUND } else { BACKGROUND });
        TubeMask::fake(data, [1.0; 3])
    }

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// mask 指标只关心前两个网格, 中心线指标只关心后两个; 测试里按需填充.
    fn grids(
        reference_mask: TubeMask,
        predicted_mask: TubeMask,
        reference_cenline: TubeMask,
        predicted_cenline: TubeMask,
    ) -> EvalGrids {
        EvalGrids::new(reference_mask, predicted_mask, reference_cenline, predicted_cenline)
            .unwrap()
    }

    #[test]
    fn test_dice_basic() {
        let shape = (4, 4, 4);
        let a = mask_from_fn(shape, |(z, _, _)| z < 2);
        let b = mask_from_fn(shape, |(z, _, _)| z >= 1 && z < 3);
        let empty = mask_from_fn(shape, |_| false);

        // |a| = |b| = 32, 交集 16.
        let g = grids(a.clone(), b.clone(), empty.clone(), empty.clone());
        assert!(float_eq(dice(&g), 0.5));

        // 对称性.
        let swapped = grids(b.clone(), a.clone(), empty.clone(), empty.clone());
        assert!(float_eq(dice(&g), dice(&swapped)));

        // 自身 Dice 为 1.
        let same = grids(a.clone(), a.clone(), empty.clone(), empty.clone());
        assert!(float_eq(dice(&same), 1.0));

        // 双空 mask 按约定为 0.
        let none = grids(empty.clone(), empty.clone(), empty.clone(), empty);
        assert!(float_eq(dice(&none), 0.0));
    }

    #[test]
    fn test_completeness() {
        let shape = (3, 3, 8);
        let pred_mask = mask_from_fn(shape, |(_, _, w)| w < 4);
        let ref_cen = mask_from_fn(shape, |(z, h, _)| z == 1 && h == 1);
        let empty = mask_from_fn(shape, |_| false);

        // 中心线 8 个体素中 4 个被预测 mask 覆盖.
        let g = grids(empty.clone(), pred_mask, ref_cen, empty.clone());
        assert!(float_eq(completeness(&g), 0.5));

        // 参考中心线为空 -> 0.
        let g = grids(empty.clone(), empty.clone(), empty.clone(), empty);
        assert!(float_eq(completeness(&g), 0.0));
    }

    #[test]
    fn test_volume_leakage() {
        let shape = (4, 4, 4);
        let reference = mask_from_fn(shape, |(z, _, _)| z < 2);
        let inside = mask_from_fn(shape, |(z, h, _)| z < 2 && h < 2);
        let disjoint = mask_from_fn(shape, |(z, _, _)| z >= 2);
        let empty = mask_from_fn(shape, |_| false);

        // 完全在参考内 -> 无泄漏.
        let g = grids(reference.clone(), inside, empty.clone(), empty.clone());
        assert!(float_eq(volume_leakage(&g), 0.0));

        // 完全不相交 -> 全部泄漏.
        let g = grids(reference.clone(), disjoint, empty.clone(), empty.clone());
        assert!(float_eq(volume_leakage(&g), 1.0));

        // 预测 mask 为空 -> 0.
        let g = grids(reference, empty.clone(), empty.clone(), empty);
        assert!(float_eq(volume_leakage(&g), 0.0));
    }

    #[test]
    fn test_dilated_gt_discounts_boundary() {
        let shape = (8, 8, 8);
        let reference = mask_from_fn(shape, |(z, h, w)| {
            (2..=5).contains(&z) && (2..=5).contains(&h) && (2..=5).contains(&w)
        });
        // 预测比参考各方向多出一圈.
        let predicted = mask_from_fn(shape, |(z, h, w)| {
            (1..=6).contains(&z) && (1..=6).contains(&h) && (1..=6).contains(&w)
        });
        let empty = mask_from_fn(shape, |_| false);

        let g = grids(reference, predicted, empty.clone(), empty);
        let plain = volume_leakage(&g);
        let relaxed = volume_leakage_dilated_gt(&g);
        assert!(plain > 0.0);
        assert!(relaxed < plain);

        // 两者都在 [0, 1] 内.
        for v in [plain, relaxed] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_cenline_leakage() {
        let shape = (3, 3, 10);
        let ref_mask = mask_from_fn(shape, |(_, _, w)| w < 5);
        let pred_cen = mask_from_fn(shape, |(z, h, w)| z == 1 && h == 1 && w < 8);
        let empty = mask_from_fn(shape, |_| false);

        // 8 个中心线体素中 3 个在参考 mask 外.
        let g = grids(ref_mask, empty.clone(), empty.clone(), pred_cen);
        assert!(float_eq(cenline_leakage(&g), 3.0 / 8.0));
    }
}
