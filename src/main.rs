// main.rs — `grayscale`: decode a JPEG, convert it on the GPU, write a JPEG.
//
// USAGE
//   grayscale                                   # input.jpg + kernel.wgsl → output.jpg
//   grayscale -i photo.jpg -o gray.jpg -q 90
//   RUST_LOG=debug grayscale --device any-platform
//
// Exit status: 0 on success, 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gpu_grayscale::config::{
    BackendChoice, DeviceOptions, DeviceSelection, PipelineConfig, DEFAULT_ENTRY_POINT,
    DEFAULT_INPUT, DEFAULT_KERNEL, DEFAULT_OUTPUT, DEFAULT_QUALITY, DEFAULT_WORKGROUP_SIZE,
};
use gpu_grayscale::gpu::WgpuRuntime;

#[derive(Parser)]
#[command(name = "grayscale")]
#[command(about = "Convert a JPEG to grayscale on a GPU compute device")]
#[command(version)]
struct Cli {
    /// Input image (any format the decoder understands)
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// WGSL kernel source
    #[arg(short, long, default_value = DEFAULT_KERNEL)]
    kernel: PathBuf,

    /// Output JPEG, overwritten if present
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
    quality: u8,

    /// Kernel entry point
    #[arg(short, long, default_value = DEFAULT_ENTRY_POINT)]
    entry_point: String,

    /// Device selection policy
    #[arg(long, value_enum, default_value = "first-platform")]
    device: DeviceSelection,

    /// Backends considered as platforms
    #[arg(long, value_enum, default_value = "all")]
    backend: BackendChoice,

    /// Invocations per workgroup (power of two, at most 256)
    #[arg(long, default_value_t = DEFAULT_WORKGROUP_SIZE)]
    workgroup_size: u32,
}

impl Cli {
    fn into_config(self) -> PipelineConfig {
        PipelineConfig {
            input_path: self.input,
            kernel_path: self.kernel,
            output_path: self.output,
            quality: self.quality,
            entry_point: self.entry_point,
            device: DeviceOptions {
                selection: self.device,
                backends: self.backend,
                workgroup_size: self.workgroup_size,
            },
        }
    }
}

fn main() -> ExitCode {
    gpu_grayscale::init_tracing();

    let config = Cli::parse().into_config();
    let runtime = WgpuRuntime::new(config.device);

    match gpu_grayscale::run(&config, &runtime) {
        Ok(report) => {
            println!(
                "Converted {}x{} image on {}",
                report.width, report.height, report.device
            );
            println!("Grayscale image saved as {}", report.output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "pipeline failed");
            if let Some(log) = e.build_log() {
                eprintln!("Build log:\n{log}");
            }
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
