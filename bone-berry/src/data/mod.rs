use std::ops::Index;

use ndarray::{Array3, ArrayBase, ArrayView3, Data, Ix3};
use num::Zero;

use crate::consts::gray::*;
use crate::error::{ThicknessError, ThicknessResult};
use crate::Idx3d;

mod header;

pub use header::{GridHeader, Spacing};

/// 体素网格的共用属性和部分通用操作.
///
/// 所有网格均以 `(z, height, width)` 顺序索引.
pub trait GridHeaderAttr {
    /// 获取元信息部分.
    fn header(&self) -> &GridHeader;

    /// 获取数据形状大小.
    fn shape(&self) -> Idx3d;

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

    /// 获取分辨率.
    #[inline]
    fn spacing(&self) -> &Spacing {
        self.header().spacing()
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高, 宽.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.spacing().as_array()
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        self.spacing().is_isotropic()
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.spacing().voxel()
    }

    /// 确认 `other` 与自身形状一致. `what` 用于在错误中指明 `other` 的身份.
    fn ensure_same_shape<G: GridHeaderAttr>(
        &self,
        other: &G,
        what: &'static str,
    ) -> ThicknessResult<()> {
        let (expected, found) = (self.shape(), other.shape());
        if expected == found {
            Ok(())
        } else {
            Err(ThicknessError::ShapeMismatch {
                what,
                expected,
                found,
            })
        }
    }
}

/// 生成只读体素网格类型的公共部分.
macro_rules! voxel_grid {
    ($(#[$attr:meta])* $name:ident, $elem:ty) => {
        $(#[$attr])*
        #[derive(Debug, Clone)]
        pub struct $name {
            header: GridHeader,
            data: Array3<$elem>,
        }

        impl GridHeaderAttr for $name {
            #[inline]
            fn header(&self) -> &GridHeader {
                &self.header
            }

            #[inline]
            fn shape(&self) -> Idx3d {
                self.data.dim()
            }
        }

        impl Index<Idx3d> for $name {
            type Output = $elem;

            #[inline]
            fn index(&self, index: Idx3d) -> &Self::Output {
                &self.data[index]
            }
        }

        impl $name {
            /// 由元信息和已经满足约束的数据直接拼装.
            #[inline]
            #[allow(dead_code)]
            pub(crate) fn from_parts(header: GridHeader, data: Array3<$elem>) -> Self {
                Self { header, data }
            }

            /// 获得数据的一份不可变 shallow copy.
            #[inline]
            pub fn data(&self) -> ArrayView3<'_, $elem> {
                self.data.view()
            }

            /// 获取给定位置的值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx3d) -> Option<&$elem> {
                self.data.get(pos)
            }

            /// 消费自我, 获得元信息和底层数据.
            #[inline]
            pub fn into_parts(self) -> (GridHeader, Array3<$elem>) {
                (self.header, self.data)
            }
        }
    };
}

voxel_grid!(
    /// 骨结构二值掩膜. 体素值只可能为 `BACKGROUND` 或 `FOREGROUND`.
    BoneMask,
    u8
);

voxel_grid!(
    /// 距离图. 前景体素的值为以该体素为中心、完全落在结构内的最大球半径 (mm),
    /// 背景体素为 0.
    DistanceMap,
    f64
);

voxel_grid!(
    /// 距离脊 (骨架). 值为 `true` 的体素是前景中距离值为正的子集.
    SkeletonMask,
    bool
);

voxel_grid!(
    /// 局部厚度图. 前景体素的值为包含它的最大球直径 (mm), 背景体素为 0.
    ThicknessMap,
    f64
);

impl BoneMask {
    /// 由任意数值数组创建掩膜. 非零值视为前景.
    pub fn from_array<S, T>(data: &ArrayBase<S, Ix3>, header: GridHeader) -> Self
    where
        S: Data<Elem = T>,
        T: Zero,
    {
        let data = data.map(|p| if p.is_zero() { BACKGROUND } else { FOREGROUND });
        Self { header, data }
    }

    /// 由 `u8` 数组创建掩膜. 非零值会被统一为 `FOREGROUND`.
    pub fn new(mut data: Array3<u8>, header: GridHeader) -> Self {
        data.mapv_inplace(|p| if is_background(p) { BACKGROUND } else { FOREGROUND });
        Self { header, data }
    }

    /// 给定位置是否为前景. 越界时视为背景.
    #[inline]
    pub fn is_foreground(&self, pos: Idx3d) -> bool {
        self.data.get(pos).is_some_and(|&p| is_foreground(p))
    }

    /// 前景体素个数.
    #[inline]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&p| is_foreground(p)).count()
    }

    /// 掩膜是否不含任何前景?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&p| is_foreground(p))
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, &p)| is_foreground(p).then_some(pos))
            .collect()
    }

    /// 获取 `pos` 周围 26 个邻居中不越界的坐标, 以及对应的索引位移.
    pub(crate) fn neighbours26(
        &self,
        (z, h, w): Idx3d,
    ) -> impl Iterator<Item = (Idx3d, [isize; 3])> + '_ {
        NEIGHBOUR_OFFSETS.iter().filter_map(move |&d| {
            let pos = (
                z.checked_add_signed(d[0])?,
                h.checked_add_signed(d[1])?,
                w.checked_add_signed(d[2])?,
            );
            self.check(&pos).then_some((pos, d))
        })
    }
}

impl DistanceMap {
    /// 最大半径. 空网格返回 0.
    pub fn max_radius(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}

impl SkeletonMask {
    /// 骨架体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// 收集所有骨架体素的下标. 结果按行优先存储.
    pub fn positions(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, &b)| b.then_some(pos))
            .collect()
    }
}

impl ThicknessMap {
    /// 最大厚度. 空网格返回 0.
    pub fn max_thickness(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}

/// 3x3x3 邻域中除中心外的 26 个位移.
const NEIGHBOUR_OFFSETS: [[isize; 3]; 26] = {
    let mut out = [[0isize; 3]; 26];
    let mut i = 0;
    let mut n = 0;
    while i < 27 {
        if i != 13 {
            out[n] = [(i / 9) as isize - 1, (i / 3 % 3) as isize - 1, (i % 3) as isize - 1];
            n += 1;
        }
        i += 1;
    }
    out
};
