//! 厚度统计量.

use std::fmt;

use ndarray::Zip;
use ordered_float::OrderedFloat;

use crate::consts::gray::*;
use crate::data::{BoneMask, GridHeaderAttr, ThicknessMap};
use crate::error::{ThicknessError, ThicknessResult};

/// 厚度下限的处理方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloorMode {
    /// 低于下限的体素不参与统计, 但在厚度图中保留原值.
    #[default]
    Exclude,

    /// 低于下限的体素按下限参与统计. 与旧版统计结果一致.
    Clamp,
}

/// 前景体素局部厚度的统计量. 厚度以毫米为单位.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThicknessStats {
    /// 平均厚度 (体积加权, 即所有参与统计的体素等权).
    pub mean: f64,

    /// 总体标准差.
    pub std: f64,

    /// 非零厚度中的最大值. 没有非零厚度时为 `NaN`.
    pub max: f64,

    /// 非零厚度中的最小值. 没有非零厚度时为 `NaN`.
    pub min: f64,

    /// 参与统计的体素个数.
    pub count: usize,
}

impl fmt::Display for ThicknessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean = {:.4}, std = {:.4}, min = {:.4}, max = {:.4} ({} voxels)",
            self.mean, self.std, self.min, self.max, self.count
        )
    }
}

impl ThicknessStats {
    /// 由非空的厚度样本计算统计量.
    fn from_values(values: &[f64]) -> Self {
        debug_assert!(!values.is_empty());
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let nonzero = || values.iter().copied().filter(|&v| v > 0.0).map(OrderedFloat);
        Self {
            mean,
            std: var.sqrt(),
            max: nonzero().max().map_or(f64::NAN, |v| v.0),
            min: nonzero().min().map_or(f64::NAN, |v| v.0),
            count: values.len(),
        }
    }
}

/// 统计前景体素的局部厚度. 低于 `floor` 的体素不参与统计.
///
/// 等价于 `FloorMode::Exclude` 下的 [`aggregate_with_floor_mode`].
pub fn aggregate_thickness_statistics(
    map: &ThicknessMap,
    mask: &BoneMask,
    floor: Option<f64>,
) -> ThicknessResult<ThicknessStats> {
    aggregate_with_floor_mode(map, mask, floor, FloorMode::Exclude)
}

/// 按给定的下限处理方式统计前景体素的局部厚度.
///
/// # 错误
///
/// * 形状不一致时返回 [`ThicknessError::ShapeMismatch`];
/// * `floor` 为负数或非有限值时返回 [`ThicknessError::InvalidFloor`];
/// * 没有前景体素, 或过滤后没有剩余体素时返回 [`ThicknessError::EmptyStructure`].
pub fn aggregate_with_floor_mode(
    map: &ThicknessMap,
    mask: &BoneMask,
    floor: Option<f64>,
    mode: FloorMode,
) -> ThicknessResult<ThicknessStats> {
    mask.ensure_same_shape(map, "thickness map")?;
    if let Some(f) = floor {
        if !(f.is_finite() && f >= 0.0) {
            return Err(ThicknessError::InvalidFloor(f));
        }
    }

    let mut values = Zip::from(map.data())
        .and(mask.data())
        .fold(Vec::new(), |mut acc, &t, &m| {
            if is_foreground(m) {
                acc.push(t);
            }
            acc
        });
    if values.is_empty() {
        return Err(ThicknessError::EmptyStructure);
    }

    match (floor, mode) {
        (None, _) => {}
        (Some(f), FloorMode::Exclude) => values.retain(|&t| t >= f),
        (Some(f), FloorMode::Clamp) => values.iter_mut().for_each(|t| *t = t.max(f)),
    }
    if values.is_empty() {
        return Err(ThicknessError::EmptyStructure);
    }

    let stats = ThicknessStats::from_values(&values);
    log::debug!("thickness statistics: {stats}");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GridHeader, Spacing};
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// 一行 6 个体素, 最后一个是背景.
    fn sample() -> (ThicknessMap, BoneMask) {
        let header = GridHeader::new(Spacing::isotropic(0.5).unwrap());
        let t = Array3::from_shape_vec((1, 1, 6), vec![1.0, 2.0, 2.0, 3.0, 0.0, 9.0]).unwrap();
        let m = Array3::from_shape_vec((1, 1, 6), vec![1, 1, 1, 1, 1, 0]).unwrap();
        (
            ThicknessMap::from_parts(header.clone(), t),
            BoneMask::new(m, header),
        )
    }

    #[test]
    fn test_basic_statistics() {
        let (map, mask) = sample();
        let stats = aggregate_thickness_statistics(&map, &mask, None).unwrap();
        assert_eq!(stats.count, 5);
        assert!(f64_eq(stats.mean, 8.0 / 5.0));
        let var = [1.0, 2.0, 2.0, 3.0, 0.0]
            .iter()
            .map(|v: &f64| (v - 1.6).powi(2))
            .sum::<f64>()
            / 5.0;
        assert!(f64_eq(stats.std, var.sqrt()));
        // 背景上的 9.0 与前景上的 0.0 都不参与最值.
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.min, 1.0);
    }

    #[test]
    fn test_floor_modes() {
        let (map, mask) = sample();

        let stats = aggregate_thickness_statistics(&map, &mask, Some(2.0)).unwrap();
        assert_eq!(stats.count, 3);
        assert!(f64_eq(stats.mean, 7.0 / 3.0));
        assert_eq!(stats.min, 2.0);

        let stats = aggregate_with_floor_mode(&map, &mask, Some(2.0), FloorMode::Clamp).unwrap();
        assert_eq!(stats.count, 5);
        assert!(f64_eq(stats.mean, 11.0 / 5.0));
        assert!(stats.min >= 2.0);

        assert_eq!(
            aggregate_thickness_statistics(&map, &mask, Some(3.5)).unwrap_err(),
            ThicknessError::EmptyStructure
        );
    }

    /// 下限恰为最小值时, 两种模式下的统计量都不变.
    #[test]
    fn test_floor_at_minimum() {
        let (map, mask) = sample();
        let mut t = map.data().to_owned();
        t[(0, 0, 4)] = 1.5;
        let map = ThicknessMap::from_parts(map.header().clone(), t);

        let base = aggregate_thickness_statistics(&map, &mask, None).unwrap();
        for mode in [FloorMode::Exclude, FloorMode::Clamp] {
            let stats = aggregate_with_floor_mode(&map, &mask, Some(base.min), mode).unwrap();
            assert_eq!(stats, base);
        }
    }

    #[test]
    fn test_invalid_input() {
        let (map, mask) = sample();
        for f in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                aggregate_thickness_statistics(&map, &mask, Some(f)),
                Err(ThicknessError::InvalidFloor(_))
            ));
        }

        let empty = BoneMask::new(Array3::zeros((1, 1, 6)), map.header().clone());
        assert_eq!(
            aggregate_thickness_statistics(&map, &empty, None).unwrap_err(),
            ThicknessError::EmptyStructure
        );

        let other = BoneMask::new(Array3::zeros((1, 2, 6)), map.header().clone());
        assert!(matches!(
            aggregate_thickness_statistics(&map, &other, None),
            Err(ThicknessError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_all_zero_thickness() {
        let (map, mask) = sample();
        let zeros = ThicknessMap::from_parts(map.header().clone(), Array3::zeros((1, 1, 6)));
        let stats = aggregate_thickness_statistics(&zeros, &mask, None).unwrap();
        assert_eq!(stats.mean, 0.0);
        assert!(stats.max.is_nan());
        assert!(stats.min.is_nan());
    }
}
