use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pixel_watermark_removal::{
    default_output_path, Algorithm, ProcessOptions, ProcessResult, WatermarkRemover,
};

#[derive(Parser)]
#[command(
    name = "pixel-watermark",
    about = "Remove text and rectangular watermarks with pixel heuristics and inpainting",
    version,
    after_help = "Simple usage: pixel-watermark <image>  (writes <name>_cleaned.<ext>)\n\
                  Batch usage:  pixel-watermark <input_dir> -o <output_dir>\n\n\
                  NOTE: Detection is heuristic. Expect some missed strokes and some\n\
                  inpainted background; PNG output avoids extra compression artifacts."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_cleaned.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Threshold preset
    #[arg(short, long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Watermark text (accepted for compatibility, not used by detection)
    #[arg(long)]
    text: Option<String>,

    /// JSON file with processing options; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bright-pixel intensity threshold (0-255)
    #[arg(long)]
    brightness: Option<f32>,

    /// Local contrast threshold (0-255)
    #[arg(long)]
    contrast: Option<f32>,

    /// Maximum channel spread for flat-colour overlays (0-255)
    #[arg(long)]
    uniformity: Option<f32>,

    /// Radius of the first, gap-closing mask dilation
    #[arg(long)]
    dilate: Option<u32>,

    /// Mask erosion radius
    #[arg(long)]
    erode: Option<u32>,

    /// Radius of the dilation that restores coverage after erosion
    #[arg(long)]
    restore: Option<u32>,

    /// Starting inpaint window radius
    #[arg(long)]
    inpaint_radius: Option<u32>,

    /// Unmasked samples required per inpainted pixel
    #[arg(long)]
    min_samples: Option<usize>,

    /// Largest image in pixels processed with masking
    #[arg(long)]
    max_pixels: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> ProcessOptions {
        let mut opts = match &self.config {
            Some(path) => match ProcessOptions::from_json_file(path) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("Error: Cannot load config {}: {e}", path.display());
                    process::exit(1);
                }
            },
            None => ProcessOptions::default(),
        };

        if let Some(a) = self.algorithm {
            opts.algorithm = a;
        }
        opts.watermark_text = self.text.clone().or(opts.watermark_text);
        opts.brightness_threshold = self.brightness.or(opts.brightness_threshold);
        opts.contrast_threshold = self.contrast.or(opts.contrast_threshold);
        opts.uniformity_threshold = self.uniformity.or(opts.uniformity_threshold);
        opts.dilate_radius = self.dilate.or(opts.dilate_radius);
        opts.erode_radius = self.erode.or(opts.erode_radius);
        opts.restore_radius = self.restore.or(opts.restore_radius);
        opts.inpaint_radius = self.inpaint_radius.or(opts.inpaint_radius);
        opts.min_samples = self.min_samples.or(opts.min_samples);
        opts.max_pixels = self.max_pixels.or(opts.max_pixels);
        opts.verbose = self.verbose;
        opts.quiet = self.quiet;
        opts
    }
}

fn init_tracing(opts: &ProcessOptions) {
    let level = if opts.quiet {
        "error"
    } else if opts.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    let opts = cli.options();
    init_tracing(&opts);

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let remover = WatermarkRemover::new(&opts);

    if !opts.quiet {
        eprintln!("Algorithm: {}", opts.algorithm);
        if opts.watermark_text.is_some() {
            eprintln!("Note: --text is accepted but not used by pixel detection");
        }
        eprintln!();
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: pixel-watermark <input_dir> -o <output_dir>");
            process::exit(1);
        };
        let results = remover.process_directory(input_path, &output_dir);
        if results.is_empty() {
            eprintln!("No image files found in {}", input_path.display());
        }
        results
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![remover.process_file(input_path, &output_path)]
    };

    let mut success_count = 0u32;
    let mut fallback_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &opts);
        if !r.success {
            fail_count += 1;
        } else if r.fallback {
            fallback_count += 1;
        } else {
            success_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fallback_count > 0 {
            eprint!(", Fallback: {fallback_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if !result.success {
        eprintln!("[FAIL] {filename}: {}", result.message);
    } else if result.fallback {
        eprintln!("[WARN] {filename}: {}", result.message);
    } else if result.masked_pixels > 0 {
        eprintln!("[OK] {filename} ({} pixels masked)", result.masked_pixels);
    } else {
        eprintln!("[OK] {filename}");
    }

    if opts.verbose && result.success && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
