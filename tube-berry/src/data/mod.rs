use std::ops::Index;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayView, Ix3};
use nifti::{IntoNdArray, NiftiError, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::{is_background, is_foreground, BACKGROUND, FOREGROUND};
use crate::Idx3d;

mod morph_3d;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 3D nii 文件 header 的共用几何属性.
pub trait VoxelGeometry {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    ///
    /// 该值也可以通过 `self.{z_mm, height_mm, width_mm}` 分别获取.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取 width 方向 (自然 2D 图像的水平方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.header().pixdim[1] as f64
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.header().pixdim[2] as f64
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.header().pixdim[3] as f64
    }
}

/// nii 格式 3D 二值体素网格, 包括 header 和体素数据. 体素值以 `u8` 保存,
/// 且只能为 [`FOREGROUND`] 或 [`BACKGROUND`].
///
/// mask 与中心线骨架在存储层面没有区别, 均以该结构表示.
/// 实体在构造后不可变; 形态学操作 (见 `morph_3d`) 返回新实体.
#[derive(Debug, Clone)]
pub struct TubeMask {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl VoxelGeometry for TubeMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for TubeMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl TubeMask {
    /// 打开 nii 文件格式的 3D 体素网格. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    ///
    /// 任何非零原始体素值在载入时都被二值化为 [`FOREGROUND`].
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let raw = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(raw.is_standard_layout());

        let bin = raw.mapv(|v| if v != 0.0 { FOREGROUND } else { BACKGROUND });

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<u8>::from_shape_vec(get_shape_from_header(&header), bin.into_raw_vec())
                .unwrap();

        log::debug!(
            "loaded `{}`: shape {:?}",
            path.as_ref().display(),
            data.dim()
        );
        Ok(Self { header, data })
    }

    /// 根据裸体素数据和体素分辨率直接创建 `TubeMask` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 \[z, h, w\] 格式存储, 体素值必须为 0 或 1, 否则程序行为未定义.
    /// 2. `pix_dim` 按照 \[z, h, w\] 格式存储, 以毫米为单位.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        debug_assert!(data.iter().all(|p| *p <= FOREGROUND));
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };

        let (z, h, w) = data.dim();
        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [pz, ph, pw] = &pix_dim;
        let [_, w_mm, h_mm, z_mm, ..] = &mut header.pixdim;
        (*w_mm, *h_mm, *z_mm) = (*pw, *ph, *pz);
        header.intent_name[..4].copy_from_slice(b"fake");

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获取前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 网格是否不含任何前景体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|p| is_background(*p))
    }

    /// `pos` 处的体素是否为前景? 当 `pos` 越界时 panic.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx3d) -> bool {
        is_foreground(self[pos])
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_points(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, p)| is_foreground(*p).then_some(*pos))
            .collect()
    }

    /// 收集所有表面前景体素对应的下标. 结果按行优先存储.
    ///
    /// 表面体素指至少有一个 6-邻居为背景或位于数据范围外的前景体素.
    ///
    /// # 注意
    ///
    /// 网格外的查询点到该网格前景的最近距离一定在表面体素处取得,
    /// 因此距离查询只需以表面体素为目标.
    pub fn surface_points(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter(|(_, p)| is_foreground(**p))
            .filter_map(|(pos, _)| {
                let neigh = self.diamond_neighbours(pos);
                let exposed = neigh.len() < 6 || neigh.iter().any(|&n| is_background(self[n]));
                exposed.then_some(pos)
            })
            .collect()
    }

    /// 由给定 header 和数据直接组装实体. 仅限本 crate 的派生操作使用.
    #[inline]
    pub(crate) fn from_parts(header: BoxedHeader, data: Array3<u8>) -> Self {
        Self { header, data }
    }

    /// 复制一份 header.
    #[inline]
    pub(crate) fn header_cloned(&self) -> BoxedHeader {
        self.header.clone()
    }

    /// 获取 `pos` 前后上下左右六个点的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ])
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        data.into_iter().filter(|p| self.check(p)).collect()
    }
}

/// 载入或组装病例网格时的运行时错误.
#[derive(Debug)]
pub enum LoadError {
    /// 读取 nifti 文件失败.
    Nifti {
        /// 目标文件路径.
        path: PathBuf,

        /// 底层错误.
        source: NiftiError,
    },

    /// 网格形状不一致.
    ShapeMismatch {
        /// 预测 mask 的形状.
        expected: Idx3d,

        /// 与之不一致的形状.
        found: Idx3d,
    },

    /// 体素分辨率不一致.
    SpacingMismatch {
        /// 预测 mask 的体素分辨率.
        expected: [f64; 3],

        /// 与之不一致的体素分辨率.
        found: [f64; 3],
    },
}

/// 体素分辨率一致性比较的容许误差 (毫米). header 中分辨率以 f32
/// 存储, 跨文件的比较不应要求逐位相等.
const SPACING_TOLERANCE_MM: f64 = 1e-3;

#[inline]
fn spacing_eq(a: [f64; 3], b: [f64; 3]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= SPACING_TOLERANCE_MM)
}

/// 一个病例的全部四个体素网格.
///
/// 该结构完全透明, 用户可以直接使用四个子网格来实现相关上层功能.
/// 构造时已验证四个网格的形状与体素分辨率一致.
#[derive(Debug, Clone)]
pub struct EvalGrids {
    /// 参考 (专家标注) mask.
    pub reference_mask: TubeMask,

    /// 预测 mask.
    pub predicted_mask: TubeMask,

    /// 参考中心线骨架.
    pub reference_cenline: TubeMask,

    /// 预测中心线骨架.
    pub predicted_cenline: TubeMask,
}

impl EvalGrids {
    /// 由四个已载入的网格组装病例. 若形状或体素分辨率不一致, 则返回 `Err`.
    ///
    /// 一致性以预测 mask 为基准.
    pub fn new(
        reference_mask: TubeMask,
        predicted_mask: TubeMask,
        reference_cenline: TubeMask,
        predicted_cenline: TubeMask,
    ) -> Result<Self, LoadError> {
        let expected = predicted_mask.shape();
        let spacing = predicted_mask.pix_dim();

        for grid in [&reference_mask, &reference_cenline, &predicted_cenline] {
            let found = grid.shape();
            if found != expected {
                return Err(LoadError::ShapeMismatch { expected, found });
            }
            let found = grid.pix_dim();
            if !spacing_eq(found, spacing) {
                return Err(LoadError::SpacingMismatch {
                    expected: spacing,
                    found,
                });
            }
        }

        Ok(Self {
            reference_mask,
            predicted_mask,
            reference_cenline,
            predicted_cenline,
        })
    }

    /// 分别打开四个 nii 文件并组装病例. 如果任一文件打开失败,
    /// 或形状/体素分辨率不一致, 则返回 `Err`.
    pub fn open(
        reference_mask: impl AsRef<Path>,
        predicted_mask: impl AsRef<Path>,
        reference_cenline: impl AsRef<Path>,
        predicted_cenline: impl AsRef<Path>,
    ) -> Result<Self, LoadError> {
        let open = |p: &Path| {
            TubeMask::open(p).map_err(|source| LoadError::Nifti {
                path: p.to_owned(),
                source,
            })
        };
        Self::new(
            open(reference_mask.as_ref())?,
            open(predicted_mask.as_ref())?,
            open(reference_cenline.as_ref())?,
            open(predicted_cenline.as_ref())?,
        )
    }

    /// 获取病例的体素分辨率, 以毫米为单位, 按 \[z, h, w\] 排列.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.predicted_mask.pix_dim()
    }

    /// 获取病例网格的形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.predicted_mask.shape()
    }

    /// 从四个网格中剔除 `region` 覆盖的体素, 返回新病例.
    ///
    /// 用于在评估前去掉不参与比较的区域, 如气管与主支气管.
    /// 若 `region` 形状与病例不一致, 则返回 `Err`.
    pub fn exclude(&self, region: &TubeMask) -> Result<Self, LoadError> {
        if region.shape() != self.shape() {
            return Err(LoadError::ShapeMismatch {
                expected: self.shape(),
                found: region.shape(),
            });
        }
        Ok(Self {
            reference_mask: self.reference_mask.subtract(region),
            predicted_mask: self.predicted_mask.subtract(region),
            reference_cenline: self.reference_cenline.subtract(region),
            predicted_cenline: self.predicted_cenline.subtract(region),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn mask_from_fn<F: Fn(Idx3d) -> bool>(shape: Idx3d, pix_dim: [f32; 3], fill: F) -> TubeMask {
        let data =
            Array3::from_shape_fn(shape, |p| if fill(p) { FOREGROUND } else { BACKGROUND });
        TubeMask::fake(data, pix_dim)
    }

    #[test]
    fn test_fake_geometry() {
        let g = mask_from_fn((4, 3, 2), [2.0, 0.75, 0.5], |_| false);
        assert!(g.is_faked());
        assert_eq!(g.shape(), (4, 3, 2));
        assert_eq!(g.size(), 24);
        assert_eq!(g.pix_dim(), [2.0, 0.75, 0.5]);
        assert_eq!(g.z_mm(), 2.0);
        assert_eq!(g.height_mm(), 0.75);
        assert_eq!(g.width_mm(), 0.5);

        assert!(g.check(&(3, 2, 1)));
        assert!(!g.check(&(4, 0, 0)));
        assert!(!g.check(&(0, 3, 0)));
        assert!(!g.check(&(0, 0, 2)));
    }

    #[test]
    fn test_count_and_points_order() {
        let fg = [(0, 0, 1), (1, 2, 0)];
        let g = mask_from_fn((2, 3, 2), [1.0; 3], |p| fg.contains(&p));

        assert_eq!(g.count(), 2);
        assert!(!g.is_empty());
        assert!(g.is_foreground_at((0, 0, 1)));
        assert!(!g.is_foreground_at((0, 0, 0)));

        // 行优先: (0, 0, 1) 在 (1, 2, 0) 之前.
        assert_eq!(g.foreground_points(), vec![(0, 0, 1), (1, 2, 0)]);

        let empty = mask_from_fn((2, 3, 2), [1.0; 3], |_| false);
        assert!(empty.is_empty());
        assert_eq!(empty.count(), 0);
        assert!(empty.foreground_points().is_empty());
    }

    #[test]
    fn test_surface_points() {
        // 5x5x5 体积中心放一个 3x3x3 实心立方体: 除正中体素外全为表面.
        let inside = |p: Idx3d| (1..=3).contains(&p.0) && (1..=3).contains(&p.1) && (1..=3).contains(&p.2);
        let g = mask_from_fn((5, 5, 5), [1.0; 3], inside);

        assert_eq!(g.count(), 27);
        let surface = g.surface_points();
        assert_eq!(surface.len(), 26);
        assert!(!surface.contains(&(2, 2, 2)));

        // 贴边的前景体素也是表面体素.
        let full = mask_from_fn((2, 2, 2), [1.0; 3], |_| true);
        assert_eq!(full.surface_points().len(), 8);
    }

    #[test]
    fn test_eval_grids_consistency() {
        let ok = |fill: fn(Idx3d) -> bool| mask_from_fn((3, 3, 3), [1.0; 3], fill);
        let grids = EvalGrids::new(ok(|_| true), ok(|_| true), ok(|_| false), ok(|_| false));
        assert!(grids.is_ok());
        let grids = grids.unwrap();
        assert_eq!(grids.shape(), (3, 3, 3));
        assert_eq!(grids.spacing(), [1.0; 3]);

        let bad_shape = mask_from_fn((3, 3, 4), [1.0; 3], |_| true);
        let err = EvalGrids::new(ok(|_| true), ok(|_| true), bad_shape, ok(|_| false));
        assert!(matches!(err, Err(LoadError::ShapeMismatch { .. })));

        let bad_spacing = mask_from_fn((3, 3, 3), [1.0, 1.0, 0.5], |_| true);
        let err = EvalGrids::new(bad_spacing, ok(|_| true), ok(|_| false), ok(|_| false));
        assert!(matches!(err, Err(LoadError::SpacingMismatch { .. })));
    }

    #[test]
    fn test_exclude_region() {
        let cube = |lo: usize, hi: usize| {
            mask_from_fn((6, 6, 6), [1.0; 3], move |p| {
                (lo..=hi).contains(&p.0) && (lo..=hi).contains(&p.1) && (lo..=hi).contains(&p.2)
            })
        };
        let grids =
            EvalGrids::new(cube(0, 3), cube(1, 4), cube(2, 2), cube(2, 3)).unwrap();
        let region = cube(0, 1);

        let reduced = grids.exclude(&region).unwrap();
        assert!(reduced.reference_mask.count() < grids.reference_mask.count());
        assert!(reduced.predicted_mask.count() < grids.predicted_mask.count());
        // region 与两条中心线不相交.
        assert_eq!(reduced.reference_cenline.count(), grids.reference_cenline.count());

        // 原病例不受影响.
        assert_eq!(grids.reference_mask.count(), 4 * 4 * 4);

        let bad = mask_from_fn((2, 2, 2), [1.0; 3], |_| true);
        assert!(matches!(
            grids.exclude(&bad),
            Err(LoadError::ShapeMismatch { .. })
        ));
    }
}
