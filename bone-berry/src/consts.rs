//! 通用常量.

/// 单通道体素值.
pub mod gray {
    /// 二值掩膜中, 背景的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 二值掩膜中, 骨结构 (前景) 的体素值.
    pub const FOREGROUND: u8 = 1;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否是前景? 任何非零值都视为前景.
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// 过采样距离变换的上采样倍率. 每个原始体素变为 `2 x 2 x 2` 个子体素.
///
/// 下采样时取子体素块最小值的做法只对该倍率成立, 因此它不是可配置参数.
pub const OVERSAMPLE_FACTOR: usize = 2;
