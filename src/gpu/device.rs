// gpu/device.rs — Platform enumeration, device selection, session open.
//
// PLATFORMS
// ─────────
// A platform is a wgpu backend (Vulkan, Metal, DX12, GL) that exposes at
// least one adapter. wgpu enumerates adapters backend by backend, so grouping
// consecutive adapters by backend yields the platforms in a stable order.
//
// SELECTION
// ─────────
// Deliberately naive. `FirstPlatform` looks only at the platform of the first
// enumerated adapter and takes its first GPU-class adapter; `AnyPlatform`
// takes the first GPU-class adapter anywhere. GPU-class means every adapter
// type except `Cpu` (llvmpipe, WARP, SwiftShader). There is no fallback to a
// software device: that is reported as `NoGpuDevice`.
//
//   Vulkan  [DiscreteGpu, Cpu]   FirstPlatform → Vulkan #0
//   Vulkan  [Cpu]                FirstPlatform → NoGpuDevice
//   Gl      [IntegratedGpu]      AnyPlatform   → Gl #0
//
// ERROR SCOPES
// ────────────
// wgpu reports validation and out-of-memory errors asynchronously. Each
// fallible call goes through `GpuDevice::scoped`, which wraps it in error
// scopes and turns a captured error into `ComputeError::Operation`. Anything
// that escapes a scope reaches the uncaptured-error handler, which logs
// instead of panicking.

use std::fmt;

use crate::config::{DeviceOptions, DeviceSelection};
use crate::error::ComputeError;
use crate::gpu::ComputeRuntime;

// ---------------------------------------------------------------------------
// Adapter / platform descriptions
// ---------------------------------------------------------------------------

/// Cached adapter information for logging and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl AdapterInfo {
    /// True for any adapter that is not a software/CPU implementation.
    pub fn is_gpu_class(&self) -> bool {
        !matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

impl From<&wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: &wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name.clone(),
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.name, self.backend, self.device_type
        )
    }
}

/// One compute platform and the devices it exposes, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub backend: wgpu::Backend,
    pub devices: Vec<AdapterInfo>,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({} device(s))", self.backend, self.devices.len())
    }
}

/// Group adapters into platforms, keeping first-seen backend order.
pub fn group_platforms(adapters: &[AdapterInfo]) -> Vec<Platform> {
    let mut platforms: Vec<Platform> = Vec::new();
    for info in adapters {
        match platforms.iter_mut().find(|p| p.backend == info.backend) {
            Some(p) => p.devices.push(info.clone()),
            None => platforms.push(Platform {
                backend: info.backend,
                devices: vec![info.clone()],
            }),
        }
    }
    platforms
}

/// Pick the index of the adapter to open.
pub fn select_device(
    adapters: &[AdapterInfo],
    selection: DeviceSelection,
) -> Result<usize, ComputeError> {
    let first = adapters.first().ok_or(ComputeError::NoPlatform)?;
    match selection {
        DeviceSelection::FirstPlatform => adapters
            .iter()
            .position(|a| a.backend == first.backend && a.is_gpu_class())
            .ok_or_else(|| ComputeError::NoGpuDevice {
                platform: format!("{:?}", first.backend),
            }),
        DeviceSelection::AnyPlatform => adapters
            .iter()
            .position(AdapterInfo::is_gpu_class)
            .ok_or_else(|| ComputeError::NoGpuDevice {
                platform: "any".to_string(),
            }),
    }
}

// ---------------------------------------------------------------------------
// Instance / enumeration
// ---------------------------------------------------------------------------

fn create_instance(backends: wgpu::Backends) -> wgpu::Instance {
    // Validation layer in debug builds for shader error feedback.
    // Non-compliant adapters (e.g. dzn on WSL2) are still real GPUs for
    // compute-only work, so they are enumerated too.
    let flags = if cfg!(debug_assertions) {
        wgpu::InstanceFlags::VALIDATION
            | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    } else {
        wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    };
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        flags,
        ..Default::default()
    })
}

/// Enumerate every adapter visible on `backends`.
pub fn enumerate_adapters(backends: wgpu::Backends) -> Vec<AdapterInfo> {
    let instance = create_instance(backends);
    instance
        .enumerate_adapters(backends)
        .iter()
        .map(|a| AdapterInfo::from(&a.get_info()))
        .collect()
}

/// Enumerate adapters on `backends` and group them into platforms.
pub fn enumerate_platforms(backends: wgpu::Backends) -> Vec<Platform> {
    group_platforms(&enumerate_adapters(backends))
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// The wgpu compute runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgpuRuntime {
    pub options: DeviceOptions,
}

impl WgpuRuntime {
    pub fn new(options: DeviceOptions) -> Self {
        WgpuRuntime { options }
    }
}

impl ComputeRuntime for WgpuRuntime {
    type Session = GpuDevice;

    fn open(&self) -> Result<GpuDevice, ComputeError> {
        GpuDevice::open(self.options)
    }
}

// ---------------------------------------------------------------------------
// GpuDevice
// ---------------------------------------------------------------------------

/// An open compute session: device, queue, and what was selected.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives `device` and `queue`; some Vulkan
/// layers (dzn on WSL2) crash when the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub limits: wgpu::Limits,
    /// Local size substituted into the kernel's `{{WORKGROUP_SIZE}}`.
    pub workgroup_size: u32,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Enumerate, select, and open a device according to `options`.
    pub fn open(options: DeviceOptions) -> Result<Self, ComputeError> {
        pollster::block_on(Self::open_async(options))
    }

    async fn open_async(options: DeviceOptions) -> Result<Self, ComputeError> {
        let backends = options.backends.backends();
        let instance = create_instance(backends);

        let mut adapters = instance.enumerate_adapters(backends);
        let infos: Vec<AdapterInfo> = adapters
            .iter()
            .map(|a| AdapterInfo::from(&a.get_info()))
            .collect();
        for info in &infos {
            tracing::debug!(adapter = %info, "found adapter");
        }

        let index = select_device(&infos, options.selection)?;
        let adapter = adapters.swap_remove(index);
        let adapter_info = infos[index].clone();
        tracing::info!(adapter = %adapter_info, policy = %options.selection, "selected device");

        // Request what the adapter actually supports so large images are
        // limited by the hardware, not by wgpu's conservative defaults.
        let limits = adapter.limits();

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gpu-grayscale"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| {
            tracing::error!(error = %e, "uncaptured wgpu error");
        }));

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            limits,
            workgroup_size: options.workgroup_size,
            _instance: instance,
        })
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    ///
    /// Returns `ComputeError::Operation { operation, .. }` if wgpu reported
    /// an error for anything `f` did.
    pub(crate) fn scoped<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, ComputeError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(e) => Err(ComputeError::operation(operation, e.to_string())),
            None => Ok(value),
        }
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

// ============================================================
// Tests
// ============================================================
