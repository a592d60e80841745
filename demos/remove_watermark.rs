//! Remove a watermark from a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example remove_watermark -- input.png output.png [algorithm]
//! ```

use std::env;
use std::process;

use pixel_watermark_removal::{Algorithm, ProcessOptions, WatermarkRemover};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [basic|edge-preserving|frequency-domain|inpainting]", args[0]);
        process::exit(1);
    }

    let algorithm = match args.get(3).map(String::as_str) {
        None | Some("inpainting") => Algorithm::Inpainting,
        Some("basic") => Algorithm::Basic,
        Some("edge-preserving") => Algorithm::EdgePreserving,
        Some("frequency-domain") => Algorithm::FrequencyDomain,
        Some(other) => {
            eprintln!("Unknown algorithm: {other}");
            process::exit(1);
        }
    };

    let opts = ProcessOptions {
        algorithm,
        ..ProcessOptions::default()
    };
    let remover = WatermarkRemover::new(&opts);
    let result = remover.process_file(args[1].as_ref(), args[2].as_ref());

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
