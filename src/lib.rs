// gpu-grayscale: convert an image to grayscale on a GPU compute device.
//
// Layers, bottom-up:
//   image / convert — host image buffer, JPEG codec, CPU reference luma
//   gpu             — compute runtime seam + wgpu implementation
//   pipeline        — the driver: decode → upload → kernel → read-back → encode
//   platforms       — the platform enumeration demo
//
// Binaries: `grayscale` (src/main.rs) and `list_platforms`.

pub mod config;
pub mod convert;
pub mod error;
pub mod gpu;
pub mod image;
pub mod pipeline;
pub mod platforms;

pub use config::PipelineConfig;
pub use error::{ComputeError, PipelineError};
pub use pipeline::{run, RunReport};

/// Install the `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` controls the level, e.g. `RUST_LOG=debug` or
/// `RUST_LOG=gpu_grayscale=info,wgpu_core=warn`. Defaults to `warn`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
