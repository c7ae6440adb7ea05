//! 欧氏距离变换.
//!
//! 精确距离变换基于 Felzenszwalb & Huttenlocher 的抛物线下包络算法,
//! 沿三个维度依次做一维变换. 各维度使用自身的物理分辨率,
//! 因此结果直接以毫米为单位, 各向异性体素无需额外处理.

use itertools::iproduct;
use ndarray::{s, Array3, ArrayView3, ArrayViewMut1, Axis};

use crate::consts::{gray::*, OVERSAMPLE_FACTOR};
use crate::data::{BoneMask, DistanceMap, GridHeaderAttr, Spacing};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Zip;
    }
}

/// 一维下包络求解所需的缓冲区. 在同一线程内的多条扫描线之间复用.
#[derive(Debug, Default)]
struct Envelope {
    /// 输入的距离平方.
    f: Vec<f64>,

    /// 输出的距离平方.
    out: Vec<f64>,

    /// 下包络中各抛物线顶点的索引.
    v: Vec<usize>,

    /// 下包络中各抛物线生效区间的左端点 (物理坐标).
    z: Vec<f64>,
}

impl Envelope {
    /// 对 `lane` 就地做一维距离平方变换. `step` 为该维度的物理分辨率.
    fn transform(&mut self, mut lane: ArrayViewMut1<f64>, step: f64) {
        self.f.clear();
        self.f.extend(lane.iter().copied());
        self.solve(step);
        lane.iter_mut()
            .zip(self.out.iter())
            .for_each(|(d, &v)| *d = v);
    }

    /// `self.f` -> `self.out`. `f` 中的无穷大代表该位置没有可用的抛物线.
    fn solve(&mut self, step: f64) {
        let Self { f, out, v, z } = self;
        let n = f.len();
        v.clear();
        z.clear();
        out.clear();

        // 两条抛物线交点的物理坐标.
        let cross = |p: usize, q: usize| {
            let (xp, xq) = (p as f64 * step, q as f64 * step);
            ((f[q] + xq * xq) - (f[p] + xp * xp)) / (2.0 * (xq - xp))
        };

        for q in (0..n).filter(|&q| f[q].is_finite()) {
            loop {
                let top = v.last().copied().zip(z.last().copied());
                let Some((p, zp)) = top else {
                    v.push(q);
                    z.push(f64::NEG_INFINITY);
                    break;
                };
                let x = cross(p, q);
                if x <= zp {
                    v.pop();
                    z.pop();
                } else {
                    v.push(q);
                    z.push(x);
                    break;
                }
            }
        }

        if v.is_empty() {
            out.resize(n, f64::INFINITY);
            return;
        }

        let mut k = 0;
        for q in 0..n {
            let x = q as f64 * step;
            while k + 1 < v.len() && z[k + 1] < x {
                k += 1;
            }
            let p = v[k];
            let dx = x - p as f64 * step;
            out.push(dx * dx + f[p]);
        }
    }
}

/// 对 `grid` 的每条 `axis` 方向扫描线做一维变换.
#[cfg(not(feature = "rayon"))]
fn transform_axis(grid: &mut Array3<f64>, axis: usize, step: f64) {
    let mut env = Envelope::default();
    for lane in grid.lanes_mut(Axis(axis)) {
        env.transform(lane, step);
    }
}

/// 借助 `rayon`, 并行地对 `grid` 的每条 `axis` 方向扫描线做一维变换.
#[cfg(feature = "rayon")]
fn transform_axis(grid: &mut Array3<f64>, axis: usize, step: f64) {
    Zip::from(grid.lanes_mut(Axis(axis))).par_for_each(|lane| {
        Envelope::default().transform(lane, step);
    });
}

/// 计算前景体素到最近背景体素中心的欧氏距离平方 (mm^2). 背景体素为 0.
///
/// 网格外不视为背景. 如果整个网格都是前景, 则视为网格外包裹了一层背景.
pub(crate) fn squared_distance(mask: ArrayView3<u8>, spacing: &Spacing) -> Array3<f64> {
    let (z, h, w) = mask.dim();
    if !mask.iter().any(|&p| is_foreground(p)) {
        return Array3::zeros((z, h, w));
    }

    if !mask.iter().any(|&p| is_background(p)) {
        let mut padded = Array3::<u8>::zeros((z + 2, h + 2, w + 2));
        padded
            .slice_mut(s![1..z + 1, 1..h + 1, 1..w + 1])
            .assign(&mask);
        return squared_distance(padded.view(), spacing)
            .slice(s![1..z + 1, 1..h + 1, 1..w + 1])
            .to_owned();
    }

    let mut grid = mask.mapv(|p| if is_background(p) { 0.0 } else { f64::INFINITY });
    for (axis, step) in spacing.as_array().into_iter().enumerate() {
        transform_axis(&mut grid, axis, step);
    }
    grid
}

/// 直接 (不过采样) 的欧氏距离变换.
///
/// 距离按体素中心到最近背景体素中心计算. 与连续边界定义相比,
/// 靠近边界处的半径会偏大约半个体素, 但与旧版厚度结果兼容.
pub fn distance_transform(mask: &BoneMask) -> DistanceMap {
    let data = squared_distance(mask.data(), mask.spacing()).mapv_into(f64::sqrt);
    DistanceMap::from_parts(mask.header().clone(), data)
}

/// 将掩膜按 `OVERSAMPLE_FACTOR` 做最近邻上采样.
pub(crate) fn upsample(mask: ArrayView3<u8>) -> Array3<u8> {
    let f = OVERSAMPLE_FACTOR;
    let (z, h, w) = mask.dim();
    Array3::from_shape_fn((z * f, h * f, w * f), |(i, j, k)| mask[(i / f, j / f, k / f)])
}

/// 将上采样网格上的距离平方取回原分辨率.
///
/// 原体素中心恰为其 `2 x 2 x 2` 子体素块的公共顶点. 块内最小值近似原体素中心到
/// 最近背景体素 **边界** 的距离, 相当于把离散边界向外推了半个原始体素.
pub(crate) fn block_min(fine: ArrayView3<f64>, mask: ArrayView3<u8>) -> Array3<f64> {
    let f = OVERSAMPLE_FACTOR;
    Array3::from_shape_fn(mask.dim(), |(i, j, k)| {
        if is_background(mask[(i, j, k)]) {
            return 0.0;
        }
        iproduct!(0..f, 0..f, 0..f)
            .map(|(a, b, c)| fine[(i * f + a, j * f + b, k * f + c)])
            .fold(f64::INFINITY, f64::min)
    })
}

/// 过采样修正的欧氏距离变换.
///
/// 1. 以倍率 2 对掩膜做最近邻上采样;
/// 2. 以半分辨率做精确距离变换;
/// 3. 在每个原体素中心处取值 (子体素块最小值).
///
/// 由于第 2 步直接使用子体素的物理分辨率, 结果已是原网格下的毫米单位,
/// 不再需要按倍率缩放. 对单体素厚的无限大平板, 结果半径恰为半个体素.
pub fn oversampled_distance_transform(mask: &BoneMask) -> DistanceMap {
    if mask.is_empty() {
        return DistanceMap::from_parts(mask.header().clone(), Array3::zeros(mask.shape()));
    }
    let fine = upsample(mask.data());
    let fine = squared_distance(fine.view(), &mask.spacing().subdivided(OVERSAMPLE_FACTOR));
    let data = block_min(fine.view(), mask.data()).mapv_into(f64::sqrt);
    DistanceMap::from_parts(mask.header().clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GridHeader;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn mask_from_fn(
        shape: (usize, usize, usize),
        spacing: [f64; 3],
        f: impl Fn((usize, usize, usize)) -> bool,
    ) -> BoneMask {
        let data = Array3::from_shape_fn(shape, |p| u8::from(f(p)));
        BoneMask::new(data, GridHeader::new(Spacing::new(spacing).unwrap()))
    }

    /// 暴力计算: 到所有背景体素中心的最短距离.
    fn brute_force(mask: &BoneMask) -> Array3<f64> {
        let bg: Vec<_> = mask
            .data()
            .indexed_iter()
            .filter_map(|(p, &v)| is_background(v).then_some(p))
            .collect();
        let sp = *mask.spacing();
        Array3::from_shape_fn(mask.shape(), |(i, j, k)| {
            bg.iter()
                .map(|&(a, b, c)| {
                    sp.dist2([
                        i as isize - a as isize,
                        j as isize - b as isize,
                        k as isize - c as isize,
                    ])
                })
                .fold(f64::INFINITY, f64::min)
                .sqrt()
        })
    }

    #[test]
    fn test_envelope_1d() {
        let mut env = Envelope::default();
        env.f = vec![f64::INFINITY, 0.0, f64::INFINITY, f64::INFINITY, 0.0];
        env.solve(1.0);
        assert_eq!(env.out, vec![1.0, 0.0, 1.0, 1.0, 0.0]);

        env.f = vec![f64::INFINITY; 3];
        env.solve(0.5);
        assert!(env.out.iter().all(|v| v.is_infinite()));

        env.f = vec![0.0, f64::INFINITY, f64::INFINITY, f64::INFINITY];
        env.solve(0.5);
        assert_eq!(env.out, vec![0.0, 0.25, 1.0, 2.25]);
    }

    #[test]
    fn test_exact_against_brute_force() {
        let shapes: [(_, fn((usize, usize, usize)) -> bool); 3] = [
            ((5, 6, 7), |(z, h, w)| {
                (1..4).contains(&z) && (1..5).contains(&h) && (1..6).contains(&w)
            }),
            ((7, 7, 7), |(z, h, w)| {
                let d = |v: usize| (v as isize - 3).pow(2);
                d(z) + d(h) + d(w) <= 8
            }),
            ((6, 8, 5), |(z, h, w)| (z + h + w) % 7 != 0 && h > 0),
        ];
        for spacing in [[1.0, 1.0, 1.0], [0.7, 0.25, 0.4]] {
            for (shape, f) in shapes.iter() {
                let mask = mask_from_fn(*shape, spacing, f);
                let expected = brute_force(&mask);
                let dist = distance_transform(&mask);
                for (pos, &d) in dist.data().indexed_iter() {
                    assert!(f64_eq(d, expected[pos]), "{pos:?}: {d} vs {}", expected[pos]);
                }
            }
        }
    }

    #[test]
    fn test_plate_distances() {
        // 单体素厚、横向铺满网格的平板.
        let mask = mask_from_fn((3, 6, 6), [1.0; 3], |(z, _, _)| z == 1);
        let direct = distance_transform(&mask);
        let over = oversampled_distance_transform(&mask);
        for h in 0..6 {
            for w in 0..6 {
                assert!(f64_eq(direct[(1, h, w)], 1.0));
                assert!(f64_eq(over[(1, h, w)], 0.5));
                assert_eq!(over[(0, h, w)], 0.0);
            }
        }

        // 三体素厚平板, 各向异性分辨率.
        let mask = mask_from_fn((5, 4, 4), [0.5, 2.0, 2.0], |(z, _, _)| (1..4).contains(&z));
        let over = oversampled_distance_transform(&mask);
        assert!(f64_eq(over[(2, 1, 1)], 0.75));
        assert!(f64_eq(over[(1, 1, 1)], 0.25));
        assert!(f64_eq(distance_transform(&mask)[(2, 1, 1)], 1.0));
    }

    #[test]
    fn test_oversampling_compensation() {
        // 过采样结果等于: 先显式上采样, 再以半分辨率做直接变换, 最后取块最小值.
        let mask = mask_from_fn((6, 7, 5), [1.0, 0.5, 0.8], |(z, h, w)| {
            (1..5).contains(&z) && (1..6).contains(&h) && (w + z) % 4 != 0
        });
        let fine = BoneMask::new(
            upsample(mask.data()),
            GridHeader::new(mask.spacing().subdivided(OVERSAMPLE_FACTOR)),
        );
        let fine_direct = distance_transform(&fine);
        let expected = block_min(fine_direct.data().mapv(|d| d * d).view(), mask.data());
        let over = oversampled_distance_transform(&mask);
        let direct = distance_transform(&mask);
        for (pos, &d) in over.data().indexed_iter() {
            assert!(f64_eq(d, expected[pos].sqrt()));
            // 修正只会让半径变小.
            assert!(d <= direct[pos] + 1e-12);
        }
    }

    #[test]
    fn test_degenerate_masks() {
        let empty = mask_from_fn((3, 3, 3), [1.0; 3], |_| false);
        assert!(distance_transform(&empty).data().iter().all(|&d| d == 0.0));
        assert!(oversampled_distance_transform(&empty)
            .data()
            .iter()
            .all(|&d| d == 0.0));

        // 全前景: 视为外面包裹一层背景.
        let full = mask_from_fn((3, 3, 3), [1.0; 3], |_| true);
        let d = distance_transform(&full);
        assert!(f64_eq(d[(1, 1, 1)], 2.0));
        assert!(f64_eq(d[(0, 0, 0)], 1.0));
        assert!(f64_eq(oversampled_distance_transform(&full)[(1, 1, 1)], 1.5));
    }

    #[test]
    fn test_origin_propagated() {
        let mut mask = mask_from_fn((3, 3, 3), [1.0; 3], |p| p == (1, 1, 1));
        let header = mask.header().clone().with_origin([4.0, 5.0, 6.0]);
        mask = BoneMask::new(mask.into_parts().1, header);
        assert_eq!(distance_transform(&mask).header().origin(), [4.0, 5.0, 6.0]);
        assert_eq!(
            oversampled_distance_transform(&mask).header().origin(),
            [4.0, 5.0, 6.0]
        );
    }
}
