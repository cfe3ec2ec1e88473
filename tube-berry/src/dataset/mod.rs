//! 数据集文件发现与参考文件命名规则.
//!
//! 预测结果目录下的 nii 文件按文件名升序配对; 参考文件 (专家标注 mask、
//! 中心线以及气道场景下的粗分割) 的路径由 [`ReferenceLayout`]
//! 从病例名推导得到.

use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;

/// nii 文件的合法扩展名, 按匹配优先级排列.
const NIFTI_EXTS: [&str; 2] = [".nii.gz", ".nii"];

/// 数据集发现的运行时错误.
#[derive(Debug)]
pub enum DiscoverError {
    /// 读取目录失败.
    Io {
        /// 目标目录.
        path: PathBuf,

        /// 底层错误.
        source: io::Error,
    },

    /// 预测 mask 与预测中心线目录下的文件个数不一致.
    ///
    /// 这是结构性错误: 输入数据集配置有误, 整个评估批次应当中止.
    CountMismatch {
        /// 预测 mask 文件个数.
        masks: usize,

        /// 预测中心线文件个数.
        cenlines: usize,
    },
}

/// `path` 是否带 nii 扩展名?
pub fn is_nifti_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| NIFTI_EXTS.iter().any(|ext| n.ends_with(ext)))
}

/// 去掉文件名的 nii 扩展名. 文件名不带 nii 扩展名时返回 `None`.
fn strip_nifti_ext(name: &str) -> Option<&str> {
    NIFTI_EXTS.iter().find_map(|ext| name.strip_suffix(ext))
}

/// 从预测文件路径推导病例名.
///
/// 依次去掉 nii 扩展名与 `strip_suffix` (如气道数据集的 `"_binmask"`);
/// 文件名不带该后缀时只去掉扩展名.
pub fn case_name(path: &Path, strip_suffix: &str) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = strip_nifti_ext(name).unwrap_or(name);
    if strip_suffix.is_empty() {
        stem.to_owned()
    } else {
        stem.strip_suffix(strip_suffix).unwrap_or(stem).to_owned()
    }
}

/// 列出 `dir` 下所有 nii 文件, 按文件名升序排列.
///
/// 升序保证病例发现顺序 (进而输出报告的行顺序) 是确定性的.
pub fn list_nifti_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, DiscoverError> {
    let dir = dir.as_ref();
    let to_err = |source| DiscoverError::Io {
        path: dir.to_owned(),
        source,
    };

    let files = dir
        .read_dir()
        .map_err(to_err)?
        .map_ok(|entry| entry.path())
        .filter_ok(|p| p.is_file() && is_nifti_file(p))
        .collect::<io::Result<Vec<_>>>()
        .map_err(to_err)?;

    Ok(files.into_iter().sorted().collect())
}

/// 一个病例的预测文件路径.
#[derive(Debug, Clone)]
pub struct CasePaths {
    /// 病例名.
    pub name: String,

    /// 预测 mask 文件路径.
    pub predicted_mask: PathBuf,

    /// 预测中心线文件路径.
    pub predicted_cenline: PathBuf,
}

/// 发现评估病例: 分别列出预测 mask 与预测中心线目录,
/// 按文件名升序逐位配对.
///
/// 两个目录的文件个数不一致时返回 [`DiscoverError::CountMismatch`],
/// 此时不产生任何病例.
pub fn discover_cases<P: AsRef<Path>, Q: AsRef<Path>>(
    masks_dir: P,
    cenlines_dir: Q,
    strip_suffix: &str,
) -> Result<Vec<CasePaths>, DiscoverError> {
    let masks = list_nifti_files(masks_dir)?;
    let cenlines = list_nifti_files(cenlines_dir)?;

    if masks.len() != cenlines.len() {
        return Err(DiscoverError::CountMismatch {
            masks: masks.len(),
            cenlines: cenlines.len(),
        });
    }

    let cases: Vec<CasePaths> = masks
        .into_iter()
        .zip(cenlines)
        .map(|(predicted_mask, predicted_cenline)| CasePaths {
            name: case_name(&predicted_mask, strip_suffix),
            predicted_mask,
            predicted_cenline,
        })
        .collect();

    log::debug!("discovered {} case(s)", cases.len());
    Ok(cases)
}

/// 参考文件命名规则.
///
/// 参考文件位于 `refer_datadir` 下的专用子目录中, 文件名为
/// `{病例名}{后缀}.nii.gz`.
#[derive(Debug, Clone)]
pub struct ReferenceLayout {
    /// 参考 mask 子目录名.
    pub masks_subdir: &'static str,

    /// 参考中心线子目录名.
    pub cenlines_subdir: &'static str,

    /// 粗分割子目录名. 仅气道场景使用 (用于剔除气管与主支气管).
    pub coarse_subdir: Option<&'static str>,

    /// 参考 mask 文件名后缀.
    pub mask_suffix: &'static str,

    /// 参考中心线文件名后缀.
    pub cenline_suffix: &'static str,

    /// 粗分割文件名后缀.
    pub coarse_suffix: &'static str,
}

impl ReferenceLayout {
    /// 气道数据集的命名规则.
    pub const fn airway() -> Self {
        Self {
            masks_subdir: "Airways",
            cenlines_subdir: "Centrelines",
            coarse_subdir: Some("CoarseAirways"),
            mask_suffix: "_manual-airways",
            cenline_suffix: "_manual-airways_cenlines",
            coarse_suffix: "-airways",
        }
    }

    /// 血管数据集的命名规则.
    pub const fn vessel() -> Self {
        Self {
            masks_subdir: "Vessels",
            cenlines_subdir: "Centrelines",
            coarse_subdir: None,
            mask_suffix: "_CTA",
            cenline_suffix: "_CTA_cenlines",
            coarse_suffix: "",
        }
    }

    /// 病例 `case` 的参考 mask 文件路径.
    pub fn mask_path(&self, refer_datadir: &Path, case: &str) -> PathBuf {
        Self::build(refer_datadir, self.masks_subdir, case, self.mask_suffix)
    }

    /// 病例 `case` 的参考中心线文件路径.
    pub fn cenline_path(&self, refer_datadir: &Path, case: &str) -> PathBuf {
        Self::build(refer_datadir, self.cenlines_subdir, case, self.cenline_suffix)
    }

    /// 病例 `case` 的粗分割文件路径. 规则不含粗分割子目录时返回 `None`.
    pub fn coarse_path(&self, refer_datadir: &Path, case: &str) -> Option<PathBuf> {
        self.coarse_subdir
            .map(|subdir| Self::build(refer_datadir, subdir, case, self.coarse_suffix))
    }

    fn build(refer_datadir: &Path, subdir: &str, case: &str, suffix: &str) -> PathBuf {
        let mut ans = refer_datadir.to_owned();
        ans.push(subdir);
        ans.push(format!("{case}{suffix}.nii.gz"));
        ans
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
