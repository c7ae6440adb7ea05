#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 计算 HR-pQCT 骨结构二值掩膜的局部厚度图及其统计量.
//!
//! 局部厚度按 Hildebrand 的模型无关定义: 结构内一点的厚度是包含该点、
//! 且完全落在结构内的最大球的直径.
//!
//! 该 crate 目前仅提供 `safe` 接口, 所有长度均以毫米为单位.
//!
//! # 注意
//!
//! 1. 所有网格均以 `(z, height, width)` 顺序索引, 分辨率随掩膜元信息一起传递.
//! 2. 该 crate 不负责读写任何影像格式. 调用方需要自行将数据转换为 `ndarray` 数组.
//!
//! # 开发计划
//!
//! ### 精确欧氏距离变换 & 过采样修正 ✅
//!
//! 各向异性分辨率下的精确距离变换; 以 2 倍上采样修正体素中心到中心的距离偏差.
//!
//! 实现位于 `bone-berry/src/thickness/edt.rs`.
//!
//! ### 距离脊提取 ✅
//!
//! 1. 基于离散球包含关系的距离脊, 剔除的球心不影响厚度结果. ✅
//! 2. 保持拓扑的形态学细化 (与旧版流程一致). ✅
//!
//! 实现位于 `bone-berry/src/thickness/ridge.rs` 和 `bone-berry/src/thickness/thinning.rs`.
//!
//! ### 球填充 ✅
//!
//! 逐点取最大直径. 打开 `rayon` feature 时并行处理球心.
//!
//! 实现位于 `bone-berry/src/thickness/stamp.rs`.
//!
//! ### 厚度统计 ✅
//!
//! 均值, 总体标准差, 非零最值. 支持厚度下限的两种处理方式.
//!
//! 实现位于 `bone-berry/src/thickness/stats.rs`.
//!
//! ### 几何体模与消融实验 ✅
//!
//! 实心/空心球, 实心/空心圆柱, 平板. 消融实验位于 `ablations/phantoms`.
//!
//! ### 分块计算超大体数据 ⌛️
//!
//! 按 z 方向分块并在块边界留出最大半径的重叠区, 以降低峰值内存.

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 网格数据结构.
mod data;

pub use data::{
    BoneMask, DistanceMap, GridHeader, GridHeaderAttr, SkeletonMask, Spacing, ThicknessMap,
};

pub mod consts;
pub mod error;
pub mod phantom;
pub mod prelude;
pub mod thickness;
