//! 程序运行函数.

use std::panic;
use std::thread;

use bone_berry::prelude::*;

use crate::profile::Profile;
use crate::result::AblationResult;

/// 参与对比的配置.
fn engines() -> [(&'static str, ThicknessConfig); 5] {
    let base = ThicknessConfig::default();
    [
        ("legacy", ThicknessConfig::legacy()),
        ("direct+ridge", base.with_oversample(false)),
        ("oversample+ridge", base),
        (
            "oversample+thinning",
            base.with_skeleton_method(SkeletonMethod::Thinning),
        ),
        ("oversample+full", base.with_skeleton(false)),
    ]
}

/// 体模集合.
fn suite() -> Vec<Phantom> {
    let mut out = vec![
        Phantom::FilledSphere { radius: 10 },
        Phantom::HollowSphere {
            outer: 12,
            inner: 8,
        },
        Phantom::FilledCylinder {
            radius: 8,
            length: 16,
        },
        Phantom::HollowCylinder {
            outer: 10,
            inner: 6,
            length: 16,
        },
    ];
    out.extend([1, 2, 4, 8].map(|thickness| Phantom::Plate {
        thickness,
        extent: 24,
    }));
    out
}

/// 在 `config` 下依次处理所有体模.
fn profile_engine(config: &ThicknessConfig, masks: &[(Phantom, BoneMask)]) -> Profile {
    let mut profile = Profile::new();
    for (phantom, mask) in masks {
        let nominal = phantom.nominal_thickness() * mask.spacing().z_mm();
        profile.target_start();
        let outcome = structure_thickness(mask, config).map(|r| r.stats);
        profile.record(*phantom, nominal, outcome);
    }
    profile.finish()
}

/// 实际运行. 每种配置使用一个线程.
pub fn run(padding: usize, spacing: Spacing) -> AblationResult {
    let masks: Vec<_> = suite()
        .into_iter()
        .map(|p| (p, p.render(padding, spacing)))
        .collect();
    log::info!("Running ablation studies on {} phantoms...", masks.len());

    thread::scope(|s| {
        let masks = masks.as_slice();
        let handles =
            engines().map(|(name, config)| (name, s.spawn(move || profile_engine(&config, masks))));

        AblationResult::from_iter(handles.into_iter().map(|(name, th)| {
            let profile = th.join().unwrap_or_else(|e| panic::resume_unwind(e));
            log::info!("{name}: done in {} us", profile.get_real_time_us());
            (name, profile)
        }))
    })
}
