//! 局部厚度计算.
//!
//! 局部厚度按 Hildebrand 的模型无关定义: 结构内一点的厚度是包含该点、
//! 且完全落在结构内的最大球的直径. 计算分为四个阶段:
//!
//! 1. 距离变换 ([`distance_transform`] 或过采样修正的 [`oversampled_distance_transform`]);
//! 2. 骨架 (距离脊) 提取 ([`distance_ridge`]), 用于减少球心个数;
//! 3. 球填充 ([`local_thickness_from_distance`]);
//! 4. 统计 ([`aggregate_thickness_statistics`]).
//!
//! [`compute_local_thickness`] 和 [`structure_thickness`] 按 [`ThicknessConfig`]
//! 串联上述阶段.

use std::time::Instant;

use ndarray::Zip;

use crate::consts::gray::*;
use crate::data::{BoneMask, ThicknessMap};
use crate::error::ThicknessResult;

mod edt;
mod ridge;
mod stamp;
mod stats;
mod thinning;

pub use edt::{distance_transform, oversampled_distance_transform};
pub use ridge::{distance_ridge, SkeletonMethod};
pub use stamp::local_thickness_from_distance;
pub use stats::{
    aggregate_thickness_statistics, aggregate_with_floor_mode, FloorMode, ThicknessStats,
};

/// 局部厚度计算配置. 构建后不可变, 每次调用显式传入.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThicknessConfig {
    oversample: bool,
    skeleton: bool,
    skeleton_method: SkeletonMethod,
    min_thickness: Option<f64>,
    floor_mode: FloorMode,
}

impl Default for ThicknessConfig {
    /// 过采样距离变换, 距离脊球心, 无厚度下限.
    fn default() -> Self {
        Self {
            oversample: true,
            skeleton: true,
            skeleton_method: SkeletonMethod::DistanceRidge,
            min_thickness: None,
            floor_mode: FloorMode::Exclude,
        }
    }
}

impl ThicknessConfig {
    /// 与旧版流程一致的配置: 不做过采样, 以形态学细化的骨架为球心,
    /// 统计时将低于下限的厚度提升到下限.
    pub fn legacy() -> Self {
        Self {
            oversample: false,
            skeleton: true,
            skeleton_method: SkeletonMethod::Thinning,
            min_thickness: None,
            floor_mode: FloorMode::Clamp,
        }
    }

    /// 是否使用过采样修正的距离变换.
    #[inline]
    pub fn with_oversample(mut self, oversample: bool) -> Self {
        self.oversample = oversample;
        self
    }

    /// 是否只以骨架体素为球心. 关闭时所有前景体素都是球心.
    #[inline]
    pub fn with_skeleton(mut self, skeleton: bool) -> Self {
        self.skeleton = skeleton;
        self
    }

    /// 骨架提取方式.
    #[inline]
    pub fn with_skeleton_method(mut self, method: SkeletonMethod) -> Self {
        self.skeleton_method = method;
        self
    }

    /// 统计时的厚度下限 (mm).
    #[inline]
    pub fn with_min_thickness(mut self, min_thickness: Option<f64>) -> Self {
        self.min_thickness = min_thickness;
        self
    }

    /// 厚度下限的处理方式.
    #[inline]
    pub fn with_floor_mode(mut self, mode: FloorMode) -> Self {
        self.floor_mode = mode;
        self
    }

    /// 见 [`Self::with_oversample`].
    #[inline]
    pub fn oversample(&self) -> bool {
        self.oversample
    }

    /// 见 [`Self::with_skeleton`].
    #[inline]
    pub fn skeleton(&self) -> bool {
        self.skeleton
    }

    /// 见 [`Self::with_skeleton_method`].
    #[inline]
    pub fn skeleton_method(&self) -> SkeletonMethod {
        self.skeleton_method
    }

    /// 见 [`Self::with_min_thickness`].
    #[inline]
    pub fn min_thickness(&self) -> Option<f64> {
        self.min_thickness
    }

    /// 见 [`Self::with_floor_mode`].
    #[inline]
    pub fn floor_mode(&self) -> FloorMode {
        self.floor_mode
    }
}

/// 厚度图及其统计量.
#[derive(Clone, Debug)]
pub struct ThicknessReport {
    /// 局部厚度图. 背景为 0.
    pub map: ThicknessMap,

    /// 前景体素的厚度统计量.
    pub stats: ThicknessStats,
}

/// 计算局部厚度图. 分辨率取自 `mask` 的元信息.
///
/// 结果中非零体素恰为前景体素. 空掩膜得到全零厚度图.
pub fn compute_local_thickness(
    mask: &BoneMask,
    config: &ThicknessConfig,
) -> ThicknessResult<ThicknessMap> {
    let start = Instant::now();
    let dist = if config.oversample {
        oversampled_distance_transform(mask)
    } else {
        distance_transform(mask)
    };
    log::debug!(
        "distance transform: max radius {} mm, {:?}",
        dist.max_radius(),
        start.elapsed()
    );

    if !config.skeleton {
        return local_thickness_from_distance(&dist, None, mask);
    }

    let skeleton = distance_ridge(&dist, mask, config.skeleton_method)?;
    let map = local_thickness_from_distance(&dist, Some(&skeleton), mask)?;

    // 骨架球未覆盖的前景体素由自身的球补上.
    let mut uncovered = Vec::new();
    Zip::indexed(map.data())
        .and(mask.data())
        .and(dist.data())
        .for_each(|pos, &t, &m, &r| {
            if is_foreground(m) && t == 0.0 && r > 0.0 {
                uncovered.push((pos, r));
            }
        });
    let (header, data) = map.into_parts();
    let data = if uncovered.is_empty() {
        data
    } else {
        log::debug!("{} voxels not covered by the skeleton", uncovered.len());
        stamp::stamp_into(data, &uncovered, mask)
    };

    log::debug!("local thickness: {:?}", start.elapsed());
    Ok(ThicknessMap::from_parts(header, data))
}

/// 计算局部厚度图, 并按 `config` 中的下限设置统计前景体素的厚度.
///
/// 没有前景体素时返回 [`ThicknessError::EmptyStructure`](crate::error::ThicknessError::EmptyStructure).
pub fn structure_thickness(
    mask: &BoneMask,
    config: &ThicknessConfig,
) -> ThicknessResult<ThicknessReport> {
    let map = compute_local_thickness(mask, config)?;
    let stats = aggregate_with_floor_mode(&map, mask, config.min_thickness, config.floor_mode)?;
    Ok(ThicknessReport { map, stats })
}
