//! 体模消融实验: 在每种配置下计算所有几何体模的局部厚度, 并与名义厚度对比.
//!
//! 环境变量 `$BONE_BERRY_PHANTOM_PADDING` 与 `$BONE_BERRY_SPACING`
//! 分别控制背景边距 (体素) 与各向同性分辨率 (mm).

mod profile;
mod result;
mod runner;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use utils::settings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let padding = settings::padding_from_env_or_default();
    let spacing = settings::spacing_from_env_or_default()?;
    log::info!(
        "padding = {padding} voxels, spacing = {} mm, {} cpus",
        spacing.z_mm(),
        utils::cpus()
    );

    runner::run(padding, spacing).analyze()?;
    Ok(())
}
