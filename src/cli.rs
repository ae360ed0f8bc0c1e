use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "img2bezier")]
#[command(about = "Trace a raster image into Bézier curves and render them to PNG")]
#[command(version)]
pub struct Cli {
    /// Input image file
    pub input: Option<PathBuf>,

    /// Output PNG file
    #[arg(short, long, default_value = "output.png")]
    pub output: PathBuf,

    /// Output scale relative to the source dimensions
    #[arg(short, long, default_value = "1.0")]
    pub scale: f32,

    /// Render curves in colour sampled from the source image
    #[arg(short, long)]
    pub color: bool,
}
