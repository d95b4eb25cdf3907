// pipeline.rs — The grayscale pipeline driver.
//
//   input.jpg ──decode──▶ HostImage (RGB, 3 B/px)
//                            │ upload
//                            ▼
//            input buffer ──kernel──▶ output buffer (1 B/px)
//                                        │ blocking read-back
//                                        ▼
//                            HostImage (gray) ──encode──▶ output.jpg
//
// Every resource is a local owned by the function that acquired it, so the
// reverse-order release happens on every return path, including the `?`
// early returns. The output file is written last, from a fully encoded
// in-memory JPEG, through a temporary file in the same directory that is
// renamed over the target. A failure at any point, including a short write,
// leaves the previous output untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::error::{ComputeError, PipelineError};
use crate::gpu::{AdapterInfo, ComputeRuntime, ComputeSession, KernelArg};
use crate::image::HostImage;

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub width: u32,
    pub height: u32,
    pub device: AdapterInfo,
    pub output_path: PathBuf,
    /// Size of the encoded JPEG in bytes.
    pub output_bytes: usize,
    pub elapsed: Duration,
}

/// Run the whole pipeline described by `config` on `runtime`.
pub fn run<R: ComputeRuntime>(
    config: &PipelineConfig,
    runtime: &R,
) -> Result<RunReport, PipelineError> {
    config.validate()?;
    let started = Instant::now();

    let image = HostImage::load_rgb(&config.input_path)?;
    tracing::info!(
        width = image.width(),
        height = image.height(),
        input = %config.input_path.display(),
        "loaded image"
    );

    let source = fs::read_to_string(&config.kernel_path).map_err(|source| {
        PipelineError::KernelLoad {
            path: config.kernel_path.clone(),
            source,
        }
    })?;

    let (gray, device) = convert_on_device(runtime, &image, &source, &config.entry_point)?;

    let encoded = gray
        .encode_jpeg(config.quality)
        .map_err(|source| PipelineError::ImageEncode {
            path: config.output_path.clone(),
            source,
        })?;
    write_output(&config.output_path, &encoded).map_err(|source| PipelineError::OutputWrite {
        path: config.output_path.clone(),
        source,
    })?;

    let report = RunReport {
        width: gray.width(),
        height: gray.height(),
        device,
        output_path: config.output_path.clone(),
        output_bytes: encoded.len(),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        output = %report.output_path.display(),
        bytes = report.output_bytes,
        elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
        "wrote grayscale image"
    );
    Ok(report)
}

/// Replace `path` with `bytes` atomically.
///
/// The bytes go to a temporary file next to `path`, which is renamed into
/// place once fully written. On error the temporary file is removed and
/// `path` is not modified. An existing file's permissions carry over.
pub fn write_output(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Convert an RGB image to grayscale with `kernel_source` on one device of
/// `runtime`. Returns the 1-channel image and the device that produced it.
///
/// Acquisition order: session, input buffer, output buffer, program,
/// kernel. They are released in the opposite order when this returns.
///
/// # Panics
/// Panics if `image` is not 3-channel.
pub fn convert_on_device<R: ComputeRuntime>(
    runtime: &R,
    image: &HostImage,
    kernel_source: &str,
    entry_point: &str,
) -> Result<(HostImage, AdapterInfo), ComputeError> {
    assert_eq!(image.channels(), 3, "expected an RGB image");
    let pixel_count = image.pixel_count();
    let work_items = u32::try_from(pixel_count).map_err(|_| {
        ComputeError::operation("dispatch", format!("{pixel_count} pixels exceed a 32-bit range"))
    })?;

    let session = runtime.open()?;
    let input = session.create_input_buffer(image.as_bytes())?;
    let output = session.create_output_buffer(pixel_count)?;
    let program = session.build_program(kernel_source)?;
    let kernel = session.create_kernel(&program, entry_point)?;

    let args = [
        KernelArg::Buffer(&input),
        KernelArg::Buffer(&output),
        KernelArg::U32(image.width()),
        KernelArg::U32(image.height()),
    ];
    session.dispatch(&kernel, &args, work_items)?;
    let gray = session.read_buffer(&output, pixel_count)?;

    let gray = HostImage::from_vec(image.width(), image.height(), 1, gray);
    Ok((gray, session.device_info().clone()))
}
