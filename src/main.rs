use clap::Parser;
use log::{error, info};
use prec::error::Result;
use prec::features2d::{MatcherParams, SiftParams};
use prec::imgcodecs::{imwrite, write_bmp_24};
use prec::imgproc::draw_line;
use prec::pipeline::{Pipeline, PipelineConfig};
use std::f32::consts::PI;
use std::path::PathBuf;
use std::process::ExitCode;

/// Panorama recognizer: finds panoramic scenes in a set of photos and
/// writes one stitched image per scene to the working directory.
#[derive(Parser, Debug)]
#[command(name = "prec", version, about)]
struct Args {
    /// Input images (BMP natively; JPEG/PNG and friends via the decoder)
    images: Vec<PathBuf>,

    /// Seed for geometric verification, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Minimum matches an image pair needs to survive
    #[arg(long, default_value_t = 8)]
    min_matches: usize,

    /// Keep at most this many best matches per pair (0 keeps all)
    #[arg(long, default_value_t = 20)]
    max_matches: usize,

    /// 2x upsample inputs before building the pyramid
    #[arg(long)]
    double_size: bool,

    /// Smoothing levels per pyramid octave
    #[arg(long, default_value_t = 3)]
    scales: usize,

    /// Render keypoint arrows over each input into <input>.keys.bmp
    /// instead of stitching
    #[arg(long)]
    keys: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if args.images.is_empty() {
        return Ok(());
    }

    let config = PipelineConfig {
        sift: SiftParams {
            double_image_size: args.double_size,
            scales: args.scales,
            ..SiftParams::default()
        },
        matcher: MatcherParams {
            minimum_matches: args.min_matches,
            maximum_matches: args.max_matches,
            seed: args.seed,
            ..MatcherParams::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config);

    if args.keys {
        return render_keypoints(&pipeline, &args.images);
    }

    let composites = pipeline.run(&args.images)?;
    for (i, composite) in composites.iter().enumerate() {
        let name = result_name(i);
        imwrite(&name, composite)?;
        info!("wrote {name}");
    }
    Ok(())
}

fn result_name(index: usize) -> String {
    if index < 26 {
        format!("result_{}.jpg", (b'a' + index as u8) as char)
    } else {
        format!("result_{index}.jpg")
    }
}

/// Debug rendering: an arrow per keypoint showing position, scale and
/// orientation, drawn over the original image.
fn render_keypoints(pipeline: &Pipeline, paths: &[PathBuf]) -> Result<()> {
    const RED: [f32; 3] = [1.0, 0.0, 0.0];

    for path in paths {
        let image = pipeline.load_image(path)?;
        let mut overlay = image.original().clone();

        let width = overlay.width() as f32;
        let height = overlay.height() as f32;
        let to_pixels = 1.0 / image.key_point_scale_factor();

        for key in image.keypoints() {
            // Keypoints live in the centered normalized frame; map back to
            // original pixels.
            let x1 = key.x * to_pixels + width / 2.0;
            let y1 = key.y * to_pixels + height / 2.0;
            let scale = key.scale / image.downscale_factor();
            let x2 = x1 + 5.0 * scale * key.angle.cos();
            let y2 = y1 + 5.0 * scale * key.angle.sin();
            draw_line(&mut overlay, x1 as i32, y1 as i32, x2 as i32, y2 as i32, RED);

            for head in [key.angle - PI * 0.75, key.angle + PI * 0.75] {
                let x3 = x2 + scale * head.cos();
                let y3 = y2 + scale * head.sin();
                draw_line(&mut overlay, x2 as i32, y2 as i32, x3 as i32, y3 as i32, RED);
            }
        }

        let out = format!("{}.keys.bmp", path.display());
        write_bmp_24(&out, &overlay)?;
        info!(
            "wrote {out} ({} keypoints over {})",
            image.keypoints().len(),
            path.display()
        );
    }
    Ok(())
}
