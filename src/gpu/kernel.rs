// gpu/kernel.rs — Kernel compilation, entry-point resolution, dispatch.
//
// KERNEL CONTRACT
// ───────────────
// A kernel is WGSL source with one compute entry point. Arguments are bound
// positionally to `@group(0) @binding(i)`: buffer arguments as storage
// buffers, scalar arguments as `var<uniform> name: u32`. The local size is
// owned by the runtime; the source must spell it as a placeholder token:
//
//   @compute @workgroup_size({{WORKGROUP_SIZE}})
//
// naga in wgpu 22 cannot evaluate `override` expressions inside
// @workgroup_size, so the token is substituted textually before compiling.
//
// 1-D RANGES LARGER THAN ONE DIMENSION
// ────────────────────────────────────
// A dispatch may have at most `max_compute_workgroups_per_dimension` (65535
// by default) groups per axis. With 64 invocations per group that caps a
// 1-D range at ~4.2M items, below a 12 MP photo. Groups are therefore folded
// into a 2-D grid and the kernel recovers its linear index:
//
//   index = gid.y * (num_workgroups.x * WORKGROUP_SIZE) + gid.x
//
// The grid may overshoot by up to one row of groups, so kernels must guard
// `index >= count`.
//
// BUILD LOG
// ─────────
// A failed build yields the compiler's messages (`get_compilation_info`)
// with line:column positions, followed by the validation error captured
// from the error scope. The log is never empty.

use std::fmt::Write;

use wgpu::util::DeviceExt;

use crate::error::ComputeError;
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::device::GpuDevice;
use crate::gpu::KernelArg;

/// Placeholder substituted with the runtime's local size.
pub const WORKGROUP_SIZE_TOKEN: &str = "{{WORKGROUP_SIZE}}";

/// A compiled kernel program.
#[derive(Debug)]
pub struct GpuProgram {
    pub module: wgpu::ShaderModule,
}

/// A kernel: a compute pipeline for one entry point.
#[derive(Debug)]
pub struct GpuKernel {
    pub pipeline: wgpu::ComputePipeline,
    pub entry_point: String,
}

/// Scalar kernel argument as laid out in a uniform buffer. Padded to 16
/// bytes, the uniform buffer alignment.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ScalarArg {
    value: u32,
    _pad: [u32; 3],
}

/// A kernel argument resolved to the buffer it binds.
enum Bound<'a> {
    Storage(&'a wgpu::Buffer),
    Uniform(wgpu::Buffer),
}

/// Substitute the local size into kernel source.
pub fn specialise(source: &str, workgroup_size: u32) -> String {
    source.replace(WORKGROUP_SIZE_TOKEN, &workgroup_size.to_string())
}

/// Workgroup grid `(x, y)` covering `work_items` invocations.
pub fn dispatch_grid(
    work_items: u32,
    workgroup_size: u32,
    max_per_dimension: u32,
) -> Result<(u32, u32), ComputeError> {
    let groups = work_items.div_ceil(workgroup_size);
    if groups == 0 {
        return Ok((0, 0));
    }
    let x = groups.min(max_per_dimension);
    let y = groups.div_ceil(x);
    if y > max_per_dimension {
        return Err(ComputeError::operation(
            "dispatch",
            format!("{work_items} work-items exceed the device's dispatch limit"),
        ));
    }
    Ok((x, y))
}

/// Render compiler messages and a captured validation error as a build log.
pub fn format_build_log(
    messages: &[wgpu::CompilationMessage],
    scope_error: Option<&str>,
) -> String {
    let mut log = String::new();
    for m in messages {
        let severity = match m.message_type {
            wgpu::CompilationMessageType::Error => "error",
            wgpu::CompilationMessageType::Warning => "warning",
            _ => "info",
        };
        match &m.location {
            Some(loc) => {
                let _ = writeln!(
                    log,
                    "{}:{}: {severity}: {}",
                    loc.line_number, loc.line_position, m.message
                );
            }
            None => {
                let _ = writeln!(log, "{severity}: {}", m.message);
            }
        }
    }
    if let Some(e) = scope_error {
        let _ = writeln!(log, "{e}");
    }
    if log.trim().is_empty() {
        log.push_str("kernel build failed with no diagnostics from the compiler\n");
    }
    log
}

impl GpuDevice {
    /// Compile WGSL kernel source for this device.
    pub fn build_program(&self, source: &str) -> Result<GpuProgram, ComputeError> {
        if !source.contains(WORKGROUP_SIZE_TOKEN) {
            return Err(ComputeError::BuildFailed {
                log: format!(
                    "kernel source must declare @workgroup_size({WORKGROUP_SIZE_TOKEN}); \
                     the local size is chosen by the runtime\n"
                ),
            });
        }
        let source = specialise(source, self.workgroup_size);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let scope_error = pollster::block_on(self.device.pop_error_scope());
        let info = pollster::block_on(module.get_compilation_info());

        let has_errors = info
            .messages
            .iter()
            .any(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error));
        if has_errors || scope_error.is_some() {
            let scope_text = scope_error.map(|e| e.to_string());
            let log = format_build_log(&info.messages, scope_text.as_deref());
            return Err(ComputeError::BuildFailed { log });
        }
        for m in &info.messages {
            tracing::warn!(message = %m.message, "kernel compiler diagnostic");
        }
        Ok(GpuProgram { module })
    }

    /// Create a compute pipeline for `entry_point`. The bind group layout is
    /// derived from the kernel's declared bindings.
    pub fn create_kernel(
        &self,
        program: &GpuProgram,
        entry_point: &str,
    ) -> Result<GpuKernel, ComputeError> {
        let pipeline = self.scoped("create_kernel", |device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &program.module,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        })?;
        Ok(GpuKernel {
            pipeline,
            entry_point: entry_point.to_string(),
        })
    }

    /// Bind `args` positionally and dispatch `work_items` invocations.
    ///
    /// Returns once the work is queued; a following `read_back` blocks until
    /// it has finished.
    pub fn dispatch(
        &self,
        kernel: &GpuKernel,
        args: &[KernelArg<'_, GpuBuffer>],
        work_items: u32,
    ) -> Result<(), ComputeError> {
        let (groups_x, groups_y) = dispatch_grid(
            work_items,
            self.workgroup_size,
            self.limits.max_compute_workgroups_per_dimension,
        )?;

        // Scalars become small uniform buffers; buffers bind as they are.
        let bound: Vec<Bound<'_>> = args
            .iter()
            .map(|arg| match arg {
                KernelArg::Buffer(b) => Bound::Storage(&b.buffer),
                KernelArg::U32(value) => Bound::Uniform(self.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("scalar argument"),
                        contents: bytemuck::bytes_of(&ScalarArg { value: *value, _pad: [0; 3] }),
                        usage: wgpu::BufferUsages::UNIFORM,
                    },
                )),
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
            .iter()
            .enumerate()
            .map(|(i, b)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: match b {
                    Bound::Storage(buffer) => buffer.as_entire_binding(),
                    Bound::Uniform(buffer) => buffer.as_entire_binding(),
                },
            })
            .collect();

        tracing::debug!(
            kernel = %kernel.entry_point,
            work_items,
            groups_x,
            groups_y,
            "dispatching kernel"
        );

        self.scoped("dispatch", |device| {
            let layout = kernel.pipeline.get_bind_group_layout(0);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kernel arguments"),
                layout: &layout,
                entries: &entries,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("dispatch"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel.entry_point.as_str()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
