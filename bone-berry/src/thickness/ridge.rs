//! 距离脊提取.
//!
//! 局部厚度只需要以 "不被任何其他球包含" 的体素为球心. 对每个前景体素 `c`,
//! 若存在前景邻居 `n` 使得 `c` 的球所覆盖的所有格点都严格落在 `n` 的球内,
//! 则 `c` 对厚度图没有贡献, 可以剔除.

use std::collections::HashMap;

use itertools::iproduct;
use ndarray::{Array3, Zip};

use crate::consts::gray::*;
use crate::data::{BoneMask, DistanceMap, GridHeaderAttr, SkeletonMask, Spacing};
use crate::error::ThicknessResult;
use crate::thickness::thinning;
use crate::Idx3d;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
    }
}

/// 骨架提取方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkeletonMethod {
    /// 基于离散球包含关系的距离脊. 剔除的体素不影响厚度结果.
    #[default]
    DistanceRidge,

    /// 保持拓扑的形态学细化. 与旧版流程一致, 但骨架球未必覆盖所有前景体素.
    Thinning,
}

/// 一个半径对应的包含模板.
///
/// 第 `i` 项为半径 `r` 的球内所有格点 `u` 到位移模式 `p` 的最大距离平方,
/// 其中 `p` 的三个分量为 `i + 1` 的二进制位 (`z`, `h`, `w` 由高到低).
type Template = [f64; 7];

/// 邻居位移 `d` (各分量属于 `{-1, 0, 1}`, 不全为零) 对应的模板下标.
///
/// 球关于各坐标轴对称, 因此只需考虑位移的绝对值.
#[inline]
fn pattern(d: [isize; 3]) -> usize {
    let [z, h, w] = d.map(|v| v.unsigned_abs());
    ((z << 2) | (h << 1) | w) - 1
}

/// 计算半径 `r` 的包含模板.
///
/// 沿 `w` 方向, 每一列上的距离平方是凸函数, 最大值只可能出现在列的两端.
fn template(r: f64, spacing: &Spacing) -> Template {
    let r2 = r * r;
    let [kz, kh, kw] = spacing.reach(r).map(|k| k as isize);
    let mut out = [0.0; 7];

    for (a, b) in iproduct!(-kz..=kz, -kh..=kh) {
        if spacing.dist2([a, b, 0]) >= r2 {
            continue;
        }
        let mut c = kw;
        while spacing.dist2([a, b, c]) >= r2 {
            c -= 1;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            let p = i + 1;
            let (pz, ph, pw) = ((p >> 2) as isize, (p >> 1 & 1) as isize, (p & 1) as isize);
            for end in [-c, c] {
                *slot = f64::max(*slot, spacing.dist2([a - pz, b - ph, end - pw]));
            }
        }
    }
    out
}

/// 为 `dist` 中出现的每个正半径预先计算包含模板. 键为半径的位表示.
fn templates(dist: &DistanceMap, mask: &BoneMask) -> HashMap<u64, Template> {
    let mut radii: Vec<u64> = Zip::from(dist.data())
        .and(mask.data())
        .fold(Vec::new(), |mut acc, &r, &m| {
            if is_foreground(m) && r > 0.0 {
                acc.push(r.to_bits());
            }
            acc
        });
    radii.sort_unstable();
    radii.dedup();
    log::trace!("distance ridge: {} distinct radii", radii.len());

    let spacing = dist.spacing();
    #[cfg(feature = "rayon")]
    let radii = radii.into_par_iter();
    #[cfg(not(feature = "rayon"))]
    let radii = radii.into_iter();
    radii
        .map(|bits| (bits, template(f64::from_bits(bits), spacing)))
        .collect()
}

/// 判断 `pos` 是否属于距离脊.
#[inline]
fn on_ridge(
    pos: Idx3d,
    r: f64,
    dist: &DistanceMap,
    mask: &BoneMask,
    templates: &HashMap<u64, Template>,
) -> bool {
    let Some(t) = templates.get(&r.to_bits()) else {
        return true;
    };
    !mask.neighbours26(pos).any(|(n, d)| {
        let rn = dist[n];
        mask.is_foreground(n) && rn >= r && t[pattern(d)] < rn * rn
    })
}

/// 基于离散球包含关系提取距离脊.
fn containment_ridge(dist: &DistanceMap, mask: &BoneMask) -> Array3<bool> {
    let templates = templates(dist, mask);
    let classify = |pos: Idx3d, &r: &f64, &m: &u8| {
        is_foreground(m) && r > 0.0 && on_ridge(pos, r, dist, mask, &templates)
    };

    let zip = Zip::indexed(dist.data()).and(mask.data());
    #[cfg(feature = "rayon")]
    let ridge = zip.par_map_collect(classify);
    #[cfg(not(feature = "rayon"))]
    let ridge = zip.map_collect(classify);
    ridge
}

/// 从距离图中提取作为球心候选的骨架.
///
/// 结果总是前景中距离值为正的子集. `dist` 与 `mask` 形状不一致时返回
/// [`ThicknessError::ShapeMismatch`](crate::error::ThicknessError::ShapeMismatch).
pub fn distance_ridge(
    dist: &DistanceMap,
    mask: &BoneMask,
    method: SkeletonMethod,
) -> ThicknessResult<SkeletonMask> {
    mask.ensure_same_shape(dist, "distance map")?;

    let data = match method {
        SkeletonMethod::DistanceRidge => containment_ridge(dist, mask),
        SkeletonMethod::Thinning => {
            let mut thin = thinning::thin(mask.data());
            Zip::from(&mut thin)
                .and(dist.data())
                .for_each(|b, &r| *b = *b && r > 0.0);
            thin
        }
    };

    let skeleton = SkeletonMask::from_parts(mask.header().clone(), data);
    log::debug!(
        "{:?}: kept {} of {} foreground voxels",
        method,
        skeleton.count(),
        mask.foreground_count()
    );
    Ok(skeleton)
}
