// gpu/mod.rs — Compute runtime seam and its wgpu implementation.
//
// The pipeline driver talks to the GPU only through two traits:
//
//   ComputeRuntime  — discovers platforms and opens a session on one device.
//   ComputeSession  — the device-level lifecycle: buffers, program, kernel,
//                     dispatch, blocking read-back.
//
// Every handle a session hands out is an owned value that releases its
// runtime resource on Drop. The driver holds them as locals, so they are
// released in reverse acquisition order on every return path.
//
// The wgpu implementation is split by concern:
//   device.rs — platform enumeration, device selection, session open
//   buffer.rs — storage buffers, upload, read-back
//   kernel.rs — WGSL compilation + build log, compute pipeline, dispatch

pub mod buffer;
pub mod device;
pub mod kernel;

use crate::error::ComputeError;

pub use device::{AdapterInfo, GpuDevice, WgpuRuntime};

/// One positional kernel argument.
///
/// Position `i` in the argument list binds to `@binding(i)` in group 0.
#[derive(Debug)]
pub enum KernelArg<'a, B> {
    /// A device buffer, bound as a storage buffer.
    Buffer(&'a B),
    /// A scalar, bound as a uniform `u32`.
    U32(u32),
}

/// A compute runtime able to open a session on one device.
pub trait ComputeRuntime {
    type Session: ComputeSession;

    fn open(&self) -> Result<Self::Session, ComputeError>;
}

/// Device-level operations of an open session.
pub trait ComputeSession {
    type Buffer;
    type Program;
    type Kernel;

    /// Identity of the selected device.
    fn device_info(&self) -> &AdapterInfo;

    /// Create a kernel-readable buffer pre-populated with `contents`.
    fn create_input_buffer(&self, contents: &[u8]) -> Result<Self::Buffer, ComputeError>;

    /// Create a zero-initialised, kernel-writable buffer of `len` bytes.
    fn create_output_buffer(&self, len: usize) -> Result<Self::Buffer, ComputeError>;

    /// Compile kernel source. Fails with `ComputeError::BuildFailed`
    /// carrying the build log.
    fn build_program(&self, source: &str) -> Result<Self::Program, ComputeError>;

    /// Resolve `entry_point` in a compiled program.
    fn create_kernel(
        &self,
        program: &Self::Program,
        entry_point: &str,
    ) -> Result<Self::Kernel, ComputeError>;

    /// Run `kernel` over a 1-D range of `work_items` invocations with the
    /// given positional arguments.
    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<'_, Self::Buffer>],
        work_items: u32,
    ) -> Result<(), ComputeError>;

    /// Copy the first `len` bytes of `buffer` back to the host. Blocks until
    /// all previously dispatched work has finished.
    fn read_buffer(&self, buffer: &Self::Buffer, len: usize) -> Result<Vec<u8>, ComputeError>;
}

impl ComputeSession for GpuDevice {
    type Buffer = buffer::GpuBuffer;
    type Program = kernel::GpuProgram;
    type Kernel = kernel::GpuKernel;

    fn device_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn create_input_buffer(&self, contents: &[u8]) -> Result<Self::Buffer, ComputeError> {
        self.upload(contents)
    }

    fn create_output_buffer(&self, len: usize) -> Result<Self::Buffer, ComputeError> {
        self.allocate(len)
    }

    fn build_program(&self, source: &str) -> Result<Self::Program, ComputeError> {
        GpuDevice::build_program(self, source)
    }

    fn create_kernel(
        &self,
        program: &Self::Program,
        entry_point: &str,
    ) -> Result<Self::Kernel, ComputeError> {
        GpuDevice::create_kernel(self, program, entry_point)
    }

    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<'_, Self::Buffer>],
        work_items: u32,
    ) -> Result<(), ComputeError> {
        GpuDevice::dispatch(self, kernel, args, work_items)
    }

    fn read_buffer(&self, buffer: &Self::Buffer, len: usize) -> Result<Vec<u8>, ComputeError> {
        self.read_back(buffer, len)
    }
}
