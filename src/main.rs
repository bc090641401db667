//! 合成场景演示
//!
//! 用法: `fsr_upscaler [config.toml]`
//!
//! 渲染一个缓慢平移的棋盘格，逐帧超分辨率并记录与静止参考的收敛情况。

use fsr_upscaler::config::UpscalerConfig;
use fsr_upscaler::core::init_logging;
use fsr_upscaler::upscaling::{FrameInputs, JitterOffset, Texture, UpscalerContext};
use fsr_upscaler::UpscalerResult;
use glam::{Vec2, Vec3};

const DEMO_FRAMES: u32 = 32;

/// 棋盘格在连续坐标上的颜色 (以显示像素为单位)
fn checker(x: f32, y: f32) -> Vec3 {
    let cell = ((x / 16.0).floor() + (y / 16.0).floor()) as i64;
    if cell.rem_euclid(2) == 0 {
        Vec3::new(0.8, 0.7, 0.6)
    } else {
        Vec3::new(0.1, 0.15, 0.2)
    }
}

fn load_config() -> UpscalerConfig {
    let mut config = match std::env::args().nth(1) {
        Some(path) => match UpscalerConfig::from_toml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}, using defaults", path, e);
                UpscalerConfig::default()
            }
        },
        None => UpscalerConfig::new(
            1280,
            720,
            fsr_upscaler::QualityTier::Performance,
        ),
    };
    config.apply_env_overrides();
    config
}

fn run(config: UpscalerConfig) -> UpscalerResult<()> {
    let display = config.display.as_tuple();
    let mut context = UpscalerContext::new();
    let settings = context.initialize(config)?;
    let (render_width, render_height) = (settings.render_width, settings.render_height);
    let scale = Vec2::new(
        display.0 as f32 / render_width as f32,
        display.1 as f32 / render_height as f32,
    );

    // 每帧平移的显示像素
    let pan = Vec2::new(0.5, 0.0);
    let motion = Texture::filled(
        render_width,
        render_height,
        // 默认缩放为 (-宽, 高)，x 取反后得到指向上一帧的 UV 位移
        Vec2::new(-pan.x / display.0 as f32, 0.0),
    );
    let depth = Texture::filled(render_width, render_height, 0.5f32);

    for frame in 0..DEMO_FRAMES {
        let jitter = if settings.upscaling_enabled {
            context.next_jitter((render_width, render_height))?
        } else {
            JitterOffset::default()
        };
        let offset = pan * frame as f32;
        let color = Texture::from_fn(render_width, render_height, |x, y| {
            let sample = (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5) + jitter.as_vec2()) * scale;
            checker(sample.x + offset.x, sample.y + offset.y)
        });

        let inputs = FrameInputs::new(&color, &depth, &motion)
            .with_opaque_color(&color)
            .with_jitter(jitter);
        let output = context.execute(&inputs)?;

        let reference = Texture::from_fn(display.0, display.1, |x, y| {
            checker(x as f32 + 0.5 + offset.x, y as f32 + 0.5 + offset.y)
        });
        let error = if output.color.size() == reference.size() {
            let total: f32 = output
                .color
                .data()
                .iter()
                .zip(reference.data())
                .map(|(a, b)| (*a - *b).abs().max_element())
                .sum();
            total / reference.data().len() as f32
        } else {
            f32::NAN
        };

        tracing::info!(
            target: "upscaler",
            "frame {:2}: jitter ({:+.3}, {:+.3}), history {:6} px, mean abs error {:.4}",
            frame,
            jitter.x,
            jitter.y,
            output.history_pixels,
            error
        );
    }

    context.destroy();
    Ok(())
}

fn main() {
    let config = load_config();
    init_logging(&config.logging);

    if let Err(e) = run(config) {
        tracing::error!(target: "upscaler", "upscaler demo failed: {} ({:?})", e, e.recovery_strategy());
        std::process::exit(1);
    }
}
