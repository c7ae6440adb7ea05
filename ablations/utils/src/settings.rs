//! 从环境变量读取消融实验设置.

use std::env;
use std::str::FromStr;

use bone_berry::error::ThicknessResult;
use bone_berry::Spacing;

/// 体模背景边距 (体素) 的环境变量名.
pub const PADDING_VAR: &str = "BONE_BERRY_PHANTOM_PADDING";

/// 各向同性分辨率 (mm) 的环境变量名.
pub const SPACING_VAR: &str = "BONE_BERRY_SPACING";

/// 默认背景边距.
pub const DEFAULT_PADDING: usize = 3;

/// 默认分辨率, 取自 XtremeCT II 的标称体素尺寸.
pub const DEFAULT_SPACING_MM: f64 = 0.0607;

/// 读取并解析环境变量 `key`. 未设置时返回 `None`, 无法解析时记录警告并返回 `None`.
fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring ${key}: cannot parse {raw:?}");
            None
        }
    }
}

/// 获取体模背景边距.
///
/// 1. 若环境变量 `$BONE_BERRY_PHANTOM_PADDING` 可以解析为非负整数, 则返回其值;
/// 2. 否则, 返回 [`DEFAULT_PADDING`].
pub fn padding_from_env_or_default() -> usize {
    parse_var(PADDING_VAR).unwrap_or(DEFAULT_PADDING)
}

/// 获取各向同性分辨率.
///
/// 1. 若设置了环境变量 `$BONE_BERRY_SPACING`, 则使用其值;
/// 2. 否则, 使用 [`DEFAULT_SPACING_MM`].
///
/// 取值非正或非有限时返回 [`ThicknessError::InvalidSpacing`](bone_berry::error::ThicknessError::InvalidSpacing).
pub fn spacing_from_env_or_default() -> ThicknessResult<Spacing> {
    Spacing::isotropic(parse_var(SPACING_VAR).unwrap_or(DEFAULT_SPACING_MM))
}
