//! 运行时错误.

use crate::Idx3d;
use thiserror::Error;

/// 局部厚度计算的运行时错误. 均由调用方输入引起, 重试没有意义.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThicknessError {
    /// 掩膜中没有前景体素 (或经过厚度下限过滤后没有剩余体素), 统计量无定义.
    #[error("structure is empty: no foreground voxel to aggregate")]
    EmptyStructure,

    /// 体素分辨率非正或非有限值.
    ///
    /// `axis` 为出错的维度 (0: z, 1: height, 2: width), `value` 为其取值.
    #[error("invalid spacing on axis {axis}: {value} (must be positive and finite)")]
    InvalidSpacing {
        /// 出错的维度.
        axis: usize,

        /// 出错的分辨率取值.
        value: f64,
    },

    /// 一起传入的网格形状不一致.
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// 形状不一致的网格名称.
        what: &'static str,

        /// 期望的形状 (通常为掩膜形状).
        expected: Idx3d,

        /// 实际的形状.
        found: Idx3d,
    },

    /// 厚度下限为负数或非有限值.
    #[error("invalid minimum thickness floor: {0}")]
    InvalidFloor(f64),
}

/// 局部厚度计算结果.
pub type ThicknessResult<T> = Result<T, ThicknessError>;
