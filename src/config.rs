// config.rs — Pipeline configuration.
//
// Everything the driver used to hardcode (file names, JPEG quality, kernel
// entry point, device policy) lives here. `Default` reproduces the classic
// behaviour: input.jpg + kernel.wgsl → output.jpg at quality 100, using the
// first GPU of the first platform.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const DEFAULT_INPUT: &str = "input.jpg";
pub const DEFAULT_KERNEL: &str = "kernel.wgsl";
pub const DEFAULT_OUTPUT: &str = "output.jpg";
pub const DEFAULT_QUALITY: u8 = 100;
pub const DEFAULT_ENTRY_POINT: &str = "rgb_to_grayscale";
pub const DEFAULT_WORKGROUP_SIZE: u32 = 64;

/// Largest local size accepted. Matches wgpu's default
/// `max_compute_invocations_per_workgroup`.
pub const MAX_WORKGROUP_SIZE: u32 = 256;

/// How a compute device is picked from the enumerated platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeviceSelection {
    /// First GPU-class device of the first platform. Never looks further.
    #[default]
    FirstPlatform,
    /// First GPU-class device on any platform, in enumeration order.
    AnyPlatform,
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::FirstPlatform => write!(f, "first-platform"),
            DeviceSelection::AnyPlatform => write!(f, "any-platform"),
        }
    }
}

/// Which wgpu backends count as platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendChoice {
    #[default]
    All,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl BackendChoice {
    pub fn backends(self) -> wgpu::Backends {
        match self {
            BackendChoice::All => wgpu::Backends::all(),
            BackendChoice::Vulkan => wgpu::Backends::VULKAN,
            BackendChoice::Metal => wgpu::Backends::METAL,
            BackendChoice::Dx12 => wgpu::Backends::DX12,
            BackendChoice::Gl => wgpu::Backends::GL,
        }
    }
}

/// Options for opening a compute session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    pub selection: DeviceSelection,
    pub backends: BackendChoice,
    /// Local size substituted for the kernel's `{{WORKGROUP_SIZE}}` token.
    pub workgroup_size: u32,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            selection: DeviceSelection::default(),
            backends: BackendChoice::default(),
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

/// Full configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub kernel_path: PathBuf,
    pub output_path: PathBuf,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    pub entry_point: String,
    pub device: DeviceOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            input_path: PathBuf::from(DEFAULT_INPUT),
            kernel_path: PathBuf::from(DEFAULT_KERNEL),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            quality: DEFAULT_QUALITY,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            device: DeviceOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=100).contains(&self.quality) {
            return Err(PipelineError::Config(format!(
                "quality must be in 1..=100 (got {})",
                self.quality
            )));
        }
        if self.entry_point.trim().is_empty() {
            return Err(PipelineError::Config("entry point must not be empty".into()));
        }
        let ws = self.device.workgroup_size;
        if ws == 0 || ws > MAX_WORKGROUP_SIZE || !ws.is_power_of_two() {
            return Err(PipelineError::Config(format!(
                "workgroup size must be a power of two in 1..={MAX_WORKGROUP_SIZE} (got {ws})"
            )));
        }
        if same_location(&self.input_path, &self.output_path) {
            return Err(PipelineError::Config(format!(
                "output path {} would overwrite the input",
                self.output_path.display()
            )));
        }
        Ok(())
    }
}

/// Absolute form of `path` with its directory resolved, so `./a.jpg` and
/// `sub/../a.jpg` compare equal. `None` if the directory does not exist.
fn resolve(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(dir).ok()?.join(name))
}

/// True if both paths name the same directory entry.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
