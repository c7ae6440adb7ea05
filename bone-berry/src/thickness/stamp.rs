//! 球填充: 由距离图和球心生成局部厚度图.

use either::Either;
use itertools::iproduct;
use ndarray::Array3;

use crate::consts::gray::*;
use crate::data::{BoneMask, DistanceMap, GridHeaderAttr, SkeletonMask, Spacing, ThicknessMap};
use crate::error::ThicknessResult;
use crate::Idx3d;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicU64, Ordering};
    }
}

/// 对以 `c` 为中心, 物理半径为 `r` 的开球内的每个前景体素调用 `f`.
///
/// 只搜索各维度 `±ceil(r / s)` 的包围盒.
fn for_each_in_ball(
    c: Idx3d,
    r: f64,
    spacing: &Spacing,
    mask: &BoneMask,
    mut f: impl FnMut(Idx3d),
) {
    let r2 = r * r;
    let [kz, kh, kw] = spacing.reach(r);
    let (z, h, w) = mask.shape();
    let range = |c: usize, k: usize, n: usize| c.saturating_sub(k)..=(c + k).min(n - 1);

    for pos in iproduct!(range(c.0, kz, z), range(c.1, kh, h), range(c.2, kw, w)) {
        let d = [
            pos.0 as isize - c.0 as isize,
            pos.1 as isize - c.1 as isize,
            pos.2 as isize - c.2 as isize,
        ];
        if spacing.dist2(d) < r2 && is_foreground(mask[pos]) {
            f(pos);
        }
    }
}

/// 以 `centers` 中的每个球 `(球心, 半径)` 更新厚度数据 `data`, 取逐点最大值.
#[cfg(not(feature = "rayon"))]
pub(crate) fn stamp_into(
    mut data: Array3<f64>,
    centers: &[(Idx3d, f64)],
    mask: &BoneMask,
) -> Array3<f64> {
    let spacing = mask.spacing();
    for &(c, r) in centers {
        let t = 2.0 * r;
        for_each_in_ball(c, r, spacing, mask, |pos| {
            let v = &mut data[pos];
            if *v < t {
                *v = t;
            }
        });
    }
    data
}

/// 以 `centers` 中的每个球 `(球心, 半径)` 更新厚度数据 `data`, 取逐点最大值.
///
/// 借助 `rayon` 并行处理各球心. 厚度值均非负, 其 `f64` 位表示的大小关系与数值一致,
/// 因此可以直接在 `AtomicU64` 上做 `fetch_max`.
#[cfg(feature = "rayon")]
pub(crate) fn stamp_into(
    data: Array3<f64>,
    centers: &[(Idx3d, f64)],
    mask: &BoneMask,
) -> Array3<f64> {
    debug_assert!(data.iter().all(|&v| v >= 0.0));
    let spacing = mask.spacing();
    let shape = data.dim();
    let (_, h, w) = shape;
    let flat = |(i, j, k): Idx3d| (i * h + j) * w + k;

    let arena: Vec<AtomicU64> = data.iter().map(|v| AtomicU64::new(v.to_bits())).collect();
    centers.par_iter().for_each(|&(c, r)| {
        let t = (2.0 * r).to_bits();
        for_each_in_ball(c, r, spacing, mask, |pos| {
            arena[flat(pos)].fetch_max(t, Ordering::Relaxed);
        });
    });
    Array3::from_shape_fn(shape, |pos| {
        f64::from_bits(arena[flat(pos)].load(Ordering::Relaxed))
    })
}

/// 收集候选球心及其半径. 半径为零的体素不能覆盖任何体素, 直接跳过.
pub(crate) fn candidates(
    dist: &DistanceMap,
    centers: Option<&SkeletonMask>,
    mask: &BoneMask,
) -> Vec<(Idx3d, f64)> {
    let skeleton = centers.map(|s| s.data());
    let foreground = mask.data();
    let positions = match &skeleton {
        Some(s) => Either::Left(s.indexed_iter().filter_map(|(p, &b)| b.then_some(p))),
        None => Either::Right(
            foreground
                .indexed_iter()
                .filter_map(|(p, &m)| is_foreground(m).then_some(p)),
        ),
    };
    positions
        .filter_map(|p| {
            let r = dist[p];
            (r > 0.0 && mask.is_foreground(p)).then_some((p, r))
        })
        .collect()
}

/// 由距离图计算局部厚度图.
///
/// 对每个球心 `c` (半径 `r`), 掩膜内满足 `|v - c| < r` 的体素 `v` 被更新为
/// `max(T[v], 2r)`. `centers` 为 `None` 时所有前景体素都是球心.
/// 结果与球心处理顺序无关.
pub fn local_thickness_from_distance(
    dist: &DistanceMap,
    centers: Option<&SkeletonMask>,
    mask: &BoneMask,
) -> ThicknessResult<ThicknessMap> {
    mask.ensure_same_shape(dist, "distance map")?;
    if let Some(skeleton) = centers {
        mask.ensure_same_shape(skeleton, "skeleton")?;
    }

    let centers = candidates(dist, centers, mask);
    log::debug!("stamping {} spheres", centers.len());
    let data = stamp_into(Array3::zeros(mask.shape()), &centers, mask);
    Ok(ThicknessMap::from_parts(mask.header().clone(), data))
}
