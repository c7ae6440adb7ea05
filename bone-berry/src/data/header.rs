use crate::error::{ThicknessError, ThicknessResult};

/// 单个体素的物理分辨率, 以毫米为单位, 按 `[z, height, width]` 存储.
///
/// 该结构只能通过 [`Spacing::new`] 或 [`Spacing::isotropic`] 构造,
/// 因此持有的三个分量总是正的有限值. 反序列化同样经过 [`Spacing::new`] 校验.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "[f64; 3]", into = "[f64; 3]"))]
pub struct Spacing([f64; 3]);

impl TryFrom<[f64; 3]> for Spacing {
    type Error = ThicknessError;

    fn try_from(zhw: [f64; 3]) -> ThicknessResult<Self> {
        Self::new(zhw)
    }
}

impl From<Spacing> for [f64; 3] {
    fn from(spacing: Spacing) -> Self {
        spacing.0
    }
}

impl Spacing {
    /// 以 `[z, height, width]` 三个方向的分辨率构建.
    ///
    /// 任一分量非正或非有限时返回 [`ThicknessError::InvalidSpacing`].
    pub fn new(zhw: [f64; 3]) -> ThicknessResult<Self> {
        for (axis, &value) in zhw.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ThicknessError::InvalidSpacing { axis, value });
            }
        }
        Ok(Self(zhw))
    }

    /// 构建各向同性分辨率.
    #[inline]
    pub fn isotropic(mm: f64) -> ThicknessResult<Self> {
        Self::new([mm; 3])
    }

    /// 获取 `[z, height, width]` 分量.
    #[inline]
    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }

    /// 空间方向 (相邻切片方向) 分辨率.
    #[inline]
    pub fn z_mm(&self) -> f64 {
        self.0[0]
    }

    /// height 方向分辨率.
    #[inline]
    pub fn height_mm(&self) -> f64 {
        self.0[1]
    }

    /// width 方向分辨率.
    #[inline]
    pub fn width_mm(&self) -> f64 {
        self.0[2]
    }

    /// 三个维度是否各向同性?
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.0;
        z == h && z == w
    }

    /// 体素体积, 以立方毫米为单位.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.0.iter().product()
    }

    /// 按整数倍率细分后的子体素分辨率.
    #[inline]
    pub(crate) fn subdivided(&self, factor: usize) -> Self {
        debug_assert!(factor >= 1);
        Self(self.0.map(|s| s / factor as f64))
    }

    /// 索引位移 `(dz, dh, dw)` 对应的物理距离平方 (mm^2).
    ///
    /// 球内判定和距离脊模板都必须经由此函数计算, 两者的浮点结果才能逐位一致.
    #[inline]
    pub(crate) fn dist2(&self, [dz, dh, dw]: [isize; 3]) -> f64 {
        let [sz, sh, sw] = self.0;
        let (a, b, c) = (dz as f64 * sz, dh as f64 * sh, dw as f64 * sw);
        a * a + b * b + c * c
    }

    /// 物理半径 `r` 在各维度上覆盖的最大索引偏移.
    #[inline]
    pub(crate) fn reach(&self, r: f64) -> [usize; 3] {
        self.0.map(|s| (r / s).ceil() as usize)
    }
}

/// 体素网格的元信息: 分辨率, 原点与方向.
///
/// 原点与方向只做传递, 局部厚度计算中的任何阶段都不会修改或使用它们.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridHeader {
    spacing: Spacing,
    origin: [f64; 3],
    direction: [f64; 9],
}

impl GridHeader {
    /// 以给定分辨率构建, 原点为零, 方向为单位阵.
    pub fn new(spacing: Spacing) -> Self {
        Self {
            spacing,
            origin: [0.0; 3],
            direction: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// 替换原点 (单位: 毫米).
    #[inline]
    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    /// 替换方向余弦矩阵 (行优先).
    #[inline]
    pub fn with_direction(mut self, direction: [f64; 9]) -> Self {
        self.direction = direction;
        self
    }

    /// 分辨率.
    #[inline]
    pub fn spacing(&self) -> &Spacing {
        &self.spacing
    }

    /// 原点.
    #[inline]
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// 方向余弦矩阵.
    #[inline]
    pub fn direction(&self) -> [f64; 9] {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::{GridHeader, Spacing};
    use crate::error::ThicknessError;

    #[test]
    fn test_spacing_rejects_invalid() {
        assert_eq!(
            Spacing::new([1.0, 0.0, 1.0]).unwrap_err(),
            ThicknessError::InvalidSpacing {
                axis: 1,
                value: 0.0
            }
        );
        assert!(matches!(
            Spacing::new([1.0, 1.0, -0.5]),
            Err(ThicknessError::InvalidSpacing { axis: 2, .. })
        ));
        assert!(Spacing::new([f64::NAN, 1.0, 1.0]).is_err());
        assert!(Spacing::isotropic(f64::INFINITY).is_err());
    }

    #[test]
    fn test_spacing_basic() {
        let s = Spacing::new([0.5, 0.25, 0.25]).unwrap();
        assert!(!s.is_isotropic());
        assert_eq!(s.voxel(), 0.5 * 0.25 * 0.25);
        assert_eq!(s.subdivided(2).as_array(), [0.25, 0.125, 0.125]);
        assert_eq!(s.dist2([1, -2, 0]), 0.25 + 0.25);
        assert_eq!(s.reach(0.6), [2, 3, 3]);
        assert!(Spacing::isotropic(0.082).unwrap().is_isotropic());
    }

    #[test]
    fn test_header_defaults() {
        let h = GridHeader::new(Spacing::isotropic(1.0).unwrap()).with_origin([1.0, 2.0, 3.0]);
        assert_eq!(h.origin(), [1.0, 2.0, 3.0]);
        assert_eq!(h.direction()[0], 1.0);
        assert_eq!(h.direction()[4], 1.0);
        assert_eq!(h.direction()[1], 0.0);
    }

    /// 反序列化时同样拒绝非法分辨率.
    #[cfg(feature = "serde")]
    #[test]
    fn test_spacing_deserialize_validates() {
        let s: Spacing = serde_json::from_str("[0.5, 0.25, 0.25]").unwrap();
        assert_eq!(s, Spacing::new([0.5, 0.25, 0.25]).unwrap());
        assert_eq!(serde_json::to_string(&s).unwrap(), "[0.5,0.25,0.25]");

        assert!(serde_json::from_str::<Spacing>("[-1.0, 1.0, 1.0]").is_err());
        assert!(serde_json::from_str::<Spacing>("[1.0, 0.0, 1.0]").is_err());

        let json = r#"{"spacing":[1.0,1.0,-0.1],"origin":[0.0,0.0,0.0],
            "direction":[1.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0]}"#;
        assert!(serde_json::from_str::<GridHeader>(json).is_err());

        let h = GridHeader::new(Spacing::isotropic(0.082).unwrap());
        let back: GridHeader = serde_json::from_str(&serde_json::to_string(&h).unwrap()).unwrap();
        assert_eq!(back, h);
    }
}
