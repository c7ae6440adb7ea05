//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{
    BoneMask, DistanceMap, GridHeader, GridHeaderAttr, SkeletonMask, Spacing, ThicknessMap,
};

pub use crate::consts::gray::{BACKGROUND, FOREGROUND};

pub use crate::error::{ThicknessError, ThicknessResult};

pub use crate::phantom::Phantom;

pub use crate::thickness::{
    aggregate_thickness_statistics, compute_local_thickness, structure_thickness, FloorMode,
    SkeletonMethod, ThicknessConfig, ThicknessReport, ThicknessStats,
};
