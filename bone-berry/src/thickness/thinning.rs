//! 保持拓扑的三维形态学细化.
//!
//! 采用 26/6 连通性 (前景 26 连通, 背景 6 连通), 沿六个面方向交替做子迭代.
//! 每次子迭代只考虑在该方向上与背景相邻的边界体素, 删除其中的简单点,
//! 但保留曲线端点, 直到一轮六个方向都没有体素被删除为止.

use ndarray::{Array3, ArrayView3};
use once_cell::sync::Lazy;

use crate::consts::gray::*;
use crate::Idx3d;

/// 3x3x3 邻域中心的下标.
const CENTER: usize = 13;

/// 六个面方向, 也是子迭代的顺序.
const DIRECTIONS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// 邻域下标 `i` 对应的位移.
#[inline]
const fn offset(i: usize) -> [isize; 3] {
    [(i / 9) as isize - 1, (i / 3 % 3) as isize - 1, (i % 3) as isize - 1]
}

/// 3x3x3 邻域的拓扑查找表. 邻域以 27 位掩码表示, 第 `i` 位对应 [`offset`]`(i)`.
struct Topology {
    /// 每个格子在邻域内的 26 邻接格子.
    adj26: [u32; 27],

    /// 每个格子在邻域内的 6 邻接格子.
    adj6: [u32; 27],

    /// 除中心外的 26 个格子.
    n26: u32,

    /// 除中心外的 18 个格子 (面邻居与棱邻居).
    n18: u32,

    /// 6 个面邻居.
    n6: u32,
}

impl Topology {
    fn new() -> Self {
        let mut t = Self {
            adj26: [0; 27],
            adj6: [0; 27],
            n26: 0,
            n18: 0,
            n6: 0,
        };
        for i in 0..27 {
            let a = offset(i);
            for j in (0..27).filter(|&j| j != i) {
                let b = offset(j);
                let d: [usize; 3] = [0, 1, 2].map(|k| a[k].abs_diff(b[k]));
                if d.iter().all(|&v| v <= 1) {
                    t.adj26[i] |= 1 << j;
                }
                if d.iter().sum::<usize>() == 1 {
                    t.adj6[i] |= 1 << j;
                }
            }
            if i != CENTER {
                let l1: isize = a.iter().map(|v| v.abs()).sum();
                t.n26 |= 1 << i;
                if l1 <= 2 {
                    t.n18 |= 1 << i;
                }
                if l1 == 1 {
                    t.n6 |= 1 << i;
                }
            }
        }
        t
    }

    /// 从 `seed` 出发, 在 `set` 内按 `adj` 连通性扩展得到的连通分量.
    #[inline]
    fn flood(seed: u32, set: u32, adj: &[u32; 27]) -> u32 {
        let mut comp = seed;
        let mut frontier = seed;
        while frontier != 0 {
            let i = frontier.trailing_zeros() as usize;
            frontier &= frontier - 1;
            let next = adj[i] & set & !comp;
            comp |= next;
            frontier |= next;
        }
        comp
    }

    /// `set` 中按 `adj` 连通性划分的连通分量中, 与 `touch` 有交集的个数.
    fn components(set: u32, touch: u32, adj: &[u32; 27]) -> usize {
        let mut rest = set;
        let mut count = 0;
        while rest & touch != 0 {
            let seed = 1 << (rest & touch).trailing_zeros();
            rest &= !Self::flood(seed, rest, adj);
            count += 1;
        }
        count
    }

    /// 在 26/6 连通性下, 邻域为 `nb` (中心为前景) 的中心体素是否为简单点?
    fn is_simple(&self, nb: u32) -> bool {
        let fg = nb & self.n26;
        if Self::components(fg, fg, &self.adj26) != 1 {
            return false;
        }
        let bg = !nb & self.n18;
        Self::components(bg, self.n6, &self.adj6) == 1
    }

    /// 中心体素是否可以删除: 它是简单点, 并且不是孤立点或曲线端点.
    #[inline]
    fn is_deletable(&self, nb: u32) -> bool {
        (nb & self.n26).count_ones() > 1 && self.is_simple(nb)
    }
}

static TOPOLOGY: Lazy<Topology> = Lazy::new(Topology::new);

/// 获取 `pos` 处的 3x3x3 邻域掩码. 越界视为背景.
fn neighbourhood(img: &Array3<bool>, (z, h, w): Idx3d) -> u32 {
    (0..27).fold(0, |acc, i| {
        let [a, b, c] = offset(i);
        let fg = (|| {
            let pos = (
                z.checked_add_signed(a)?,
                h.checked_add_signed(b)?,
                w.checked_add_signed(c)?,
            );
            img.get(pos).copied()
        })()
        .unwrap_or(false);
        if fg {
            acc | 1 << i
        } else {
            acc
        }
    })
}

/// 对二值掩膜做细化, 返回骨架. 骨架是前景的子集, 且与前景拓扑等价.
pub(crate) fn thin(mask: ArrayView3<u8>) -> Array3<bool> {
    let topo = &*TOPOLOGY;
    let mut img = mask.map(|&p| is_foreground(p));
    let mut rounds = 0usize;

    loop {
        let mut removed = 0usize;
        for [a, b, c] in DIRECTIONS {
            let direction_bit = 1u32 << (CENTER as isize + a * 9 + b * 3 + c) as usize;
            let candidates: Vec<(Idx3d, u32)> = img
                .indexed_iter()
                .filter(|&(_, &fg)| fg)
                .map(|(pos, _)| (pos, neighbourhood(&img, pos)))
                .filter(|&(_, nb)| nb & direction_bit == 0 && topo.is_deletable(nb))
                .collect();

            // 同一子迭代中的删除会相互影响, 逐个重新检查.
            for (pos, _) in candidates {
                if topo.is_deletable(neighbourhood(&img, pos)) {
                    img[pos] = false;
                    removed += 1;
                }
            }
        }
        rounds += 1;
        log::trace!("thinning round {rounds}: removed {removed} voxels");
        if removed == 0 {
            break;
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 收集 `img` 中为真的体素并检查它们是否 26 连通.
    fn is_connected(img: &Array3<bool>) -> bool {
        let all: HashSet<Idx3d> = img
            .indexed_iter()
            .filter_map(|(p, &b)| b.then_some(p))
            .collect();
        let Some(&start) = all.iter().next() else {
            return true;
        };
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some((z, h, w)) = stack.pop() {
            for i in (0..27).filter(|&i| i != CENTER) {
                let [a, b, c] = offset(i);
                let n = (
                    (z as isize + a) as usize,
                    (h as isize + b) as usize,
                    (w as isize + c) as usize,
                );
                if all.contains(&n) && seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        seen.len() == all.len()
    }

    #[test]
    fn test_topology_tables() {
        let t = &*TOPOLOGY;
        assert_eq!(t.n26.count_ones(), 26);
        assert_eq!(t.n18.count_ones(), 18);
        assert_eq!(t.n6.count_ones(), 6);
        assert_eq!(t.adj26[CENTER].count_ones(), 26);
        assert_eq!(t.adj6[CENTER], t.n6);
        assert_eq!(t.adj26[0].count_ones(), 7);
        assert_eq!(t.adj6[0].count_ones(), 3);
    }

    #[test]
    fn test_simple_points() {
        let t = &*TOPOLOGY;
        let bit = |a: isize, b: isize, c: isize| 1u32 << ((a + 1) * 9 + (b + 1) * 3 + (c + 1));
        let center = 1 << CENTER;

        // 线段中间的点: 删除会断开.
        let nb = center | bit(-1, 0, 0) | bit(1, 0, 0);
        assert!(!t.is_simple(nb));

        // 线段端点: 简单, 但作为端点保留.
        let nb = center | bit(-1, 0, 0);
        assert!(t.is_simple(nb));
        assert!(!t.is_deletable(nb));

        // 平面一角的点.
        let nb = center | bit(0, 1, 0) | bit(0, 0, 1) | bit(0, 1, 1);
        assert!(t.is_deletable(nb));

        // 被完全包围的内部点: 删除会产生空洞.
        let nb = (1 << 27) - 1;
        assert!(!t.is_simple(nb));
    }

    #[test]
    fn test_line_kept() {
        let mut mask = Array3::<u8>::zeros((3, 3, 9));
        mask.slice_mut(ndarray::s![1, 1, 1..8]).fill(FOREGROUND);
        let skeleton = thin(mask.view());
        assert_eq!(skeleton, mask.map(|&p| is_foreground(p)));
    }

    #[test]
    fn test_block_thinned() {
        let mut mask = Array3::<u8>::zeros((7, 7, 7));
        mask.slice_mut(ndarray::s![1..6, 1..6, 1..6]).fill(FOREGROUND);
        let skeleton = thin(mask.view());

        let count = skeleton.iter().filter(|&&b| b).count();
        assert!(count > 0);
        assert!(count < 125);
        assert!(is_connected(&skeleton));
        for (pos, &b) in skeleton.indexed_iter() {
            assert!(!b || is_foreground(mask[pos]));
        }
    }

    #[test]
    fn test_single_voxel() {
        let mut mask = Array3::<u8>::zeros((3, 3, 3));
        mask[(1, 1, 1)] = FOREGROUND;
        let skeleton = thin(mask.view());
        assert_eq!(skeleton.iter().filter(|&&b| b).count(), 1);

        let skeleton = thin(Array3::<u8>::zeros((2, 2, 2)).view());
        assert!(skeleton.iter().all(|&b| !b));
    }
}
