//! Converts `.3GM` models to Wavefront OBJ.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_crate_dependencies)]

mod obj;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gm_model::Shape;

#[derive(Debug, Parser)]
#[command(about = "Convert a .3GM model container to Wavefront OBJ")]
struct Args {
    /// The input `.3GM` file.
    input: PathBuf,
    /// Output OBJ path. Defaults to the input path with an `.obj` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write a `.mtl` next to the OBJ when texture names are present.
    #[arg(long)]
    materials: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("obj"));

    let shape = match Shape::from_file(&args.input) {
        Ok(shape) => shape,
        Err(err) => {
            match err.event_code() {
                Some(code) => tracing::error!("decode failed: {err} (event code {code})"),
                None => tracing::error!("decode failed: {err}"),
            }
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        vertices = shape.vertex_count(),
        triangles = shape.indices().len() / 3,
        surfaces = shape.surfaces().len(),
        animated = shape.has_animation(),
        "decoded {}",
        args.input.display(),
    );

    if let Err(err) = obj::write(&shape, &output, args.materials) {
        tracing::error!("writing {} failed: {err}", output.display());
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
