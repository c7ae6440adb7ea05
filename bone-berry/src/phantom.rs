//! 几何体模 (phantom) 生成.
//!
//! 体模的尺寸均以体素为单位, 渲染时再赋予物理分辨率.
//! 球体在三个维度上都留有背景边距; 圆柱只在径向留边距, 轴向 (z) 贯穿网格,
//! 相当于无限长; 平板只在 z 方向留边距, 平面内贯穿网格, 相当于无限大.

use std::fmt;

use ndarray::Array3;

use crate::data::{BoneMask, GridHeader, Spacing};

/// 几何体模.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phantom {
    /// 实心球.
    FilledSphere {
        /// 半径.
        radius: usize,
    },

    /// 空心球壳. 到球心距离在 `(inner, outer]` 内的体素为前景.
    HollowSphere {
        /// 外半径.
        outer: usize,

        /// 内半径.
        inner: usize,
    },

    /// 沿 z 方向的实心圆柱.
    FilledCylinder {
        /// 半径.
        radius: usize,

        /// 轴向长度.
        length: usize,
    },

    /// 沿 z 方向的空心圆管.
    HollowCylinder {
        /// 外半径.
        outer: usize,

        /// 内半径.
        inner: usize,

        /// 轴向长度.
        length: usize,
    },

    /// 垂直于 z 方向的平板.
    Plate {
        /// 厚度 (z 方向层数).
        thickness: usize,

        /// 平面内边长.
        extent: usize,
    },
}

impl Phantom {
    /// 简称, 用于输出表格.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FilledSphere { .. } => "F_SPH",
            Self::HollowSphere { .. } => "H_SPH",
            Self::FilledCylinder { .. } => "F_CYL",
            Self::HollowCylinder { .. } => "H_CYL",
            Self::Plate { .. } => "PLATE",
        }
    }

    /// 名义厚度 (体素). 实心体为直径, 空心体为壁厚, 平板为层数.
    pub fn nominal_thickness(&self) -> f64 {
        match *self {
            Self::FilledSphere { radius } | Self::FilledCylinder { radius, .. } => {
                2.0 * radius as f64
            }
            Self::HollowSphere { outer, inner } | Self::HollowCylinder { outer, inner, .. } => {
                outer.saturating_sub(inner) as f64
            }
            Self::Plate { thickness, .. } => thickness as f64,
        }
    }

    /// 以 `padding` 个体素的背景边距和给定分辨率渲染为掩膜.
    pub fn render(&self, padding: usize, spacing: Spacing) -> BoneMask {
        let header = GridHeader::new(spacing);
        let data = match *self {
            Self::FilledSphere { radius } => ball(radius, padding, |d2| d2 <= sq(radius)),
            Self::HollowSphere { outer, inner } => {
                ball(outer, padding, |d2| d2 > sq(inner) && d2 <= sq(outer))
            }
            Self::FilledCylinder { radius, length } => {
                tube(radius, length, padding, |d2| d2 <= sq(radius))
            }
            Self::HollowCylinder {
                outer,
                inner,
                length,
            } => tube(outer, length, padding, |d2| d2 > sq(inner) && d2 <= sq(outer)),
            Self::Plate { thickness, extent } => {
                Array3::from_shape_fn((thickness + 2 * padding, extent, extent), |(z, _, _)| {
                    u8::from((padding..padding + thickness).contains(&z))
                })
            }
        };
        BoneMask::new(data, header)
    }
}

impl fmt::Display for Phantom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FilledSphere { radius } => write!(f, "{}(r={radius})", self.name()),
            Self::HollowSphere { outer, inner } | Self::HollowCylinder { outer, inner, .. } => {
                write!(f, "{}(r={inner}..{outer})", self.name())
            }
            Self::FilledCylinder { radius, .. } => write!(f, "{}(r={radius})", self.name()),
            Self::Plate { thickness, .. } => write!(f, "{}(t={thickness})", self.name()),
        }
    }
}

#[inline]
fn sq(v: usize) -> usize {
    v * v
}

/// 到中心的整数距离平方 (体素单位).
#[inline]
fn d2(a: usize, b: usize) -> usize {
    let d = a.abs_diff(b);
    d * d
}

/// 以 `r + padding` 为中心, 对三个维度都按 `inside` 判定的立方网格.
fn ball(r: usize, padding: usize, inside: impl Fn(usize) -> bool) -> Array3<u8> {
    let n = 2 * (r + padding) + 1;
    let c = r + padding;
    Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        u8::from(inside(d2(i, c) + d2(j, c) + d2(k, c)))
    })
}

/// 轴向为 z 的管状网格, 只在径向留边距.
fn tube(r: usize, length: usize, padding: usize, inside: impl Fn(usize) -> bool) -> Array3<u8> {
    let n = 2 * (r + padding) + 1;
    let c = r + padding;
    Array3::from_shape_fn((length, n, n), |(_, j, k)| u8::from(inside(d2(j, c) + d2(k, c))))
}
