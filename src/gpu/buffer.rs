// gpu/buffer.rs — Device storage buffers: upload and blocking read-back.
//
// WGSL has no 8-bit storage type, so kernels see these buffers as
// `array<u32>` and unpack bytes themselves. wgpu requires buffer sizes and
// copy sizes to be multiples of `COPY_BUFFER_ALIGNMENT` (4 bytes), so every
// buffer is allocated at `align_to(len, 4)` and remembers its logical `len`.
//
//   logical len = 10       [b0 b1 b2 b3][b4 b5 b6 b7][b8 b9 00 00]
//   allocated   = 12       └── word 0 ─┘└── word 1 ─┘└── word 2 ─┘
//
// Read-back copies the padded size into a MAP_READ staging buffer, maps it,
// and returns only the first `len` bytes.

use wgpu::util::DeviceExt;

use crate::error::ComputeError;
use crate::gpu::device::GpuDevice;

/// A storage buffer owned by one session. Dropping it releases the device
/// memory.
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    /// Logical length in bytes (allocation may be padded).
    pub len: usize,
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Allocation size for a `len`-byte storage buffer under `limits`.
///
/// The padded size must fit both one storage binding and one buffer.
pub fn padded_size(len: usize, limits: &wgpu::Limits) -> Result<u64, ComputeError> {
    let size = align_to(len as u64, wgpu::COPY_BUFFER_ALIGNMENT);
    let max = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    if size > max {
        return Err(ComputeError::BufferTooLarge { requested: size, max });
    }
    Ok(size)
}

impl GpuDevice {

    /// Upload `contents` into a new storage buffer.
    pub fn upload(&self, contents: &[u8]) -> Result<GpuBuffer, ComputeError> {
        let size = padded_size(contents.len(), &self.limits)?;
        let mut padded = contents.to_vec();
        padded.resize(size as usize, 0);

        let buffer = self.scoped("create_buffer(input)", |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("input buffer"),
                contents: &padded,
                usage: wgpu::BufferUsages::STORAGE,
            })
        })?;
        tracing::debug!(bytes = contents.len(), "uploaded input buffer");
        Ok(GpuBuffer { buffer, len: contents.len() })
    }

    /// Allocate a zero-initialised storage buffer the kernel can write and
    /// the host can read back.
    pub fn allocate(&self, len: usize) -> Result<GpuBuffer, ComputeError> {
        let size = padded_size(len, &self.limits)?;
        let buffer = self.scoped("create_buffer(output)", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("output buffer"),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        })?;
        Ok(GpuBuffer { buffer, len })
    }

    /// Copy the first `len` bytes of `src` to the host.
    ///
    /// **Synchronous**: submits the copy, then blocks on `Maintain::Wait`
    /// until the GPU has finished everything queued before it.
    pub fn read_back(&self, src: &GpuBuffer, len: usize) -> Result<Vec<u8>, ComputeError> {
        if len > src.len {
            return Err(ComputeError::operation(
                "read_buffer",
                format!("requested {len} bytes from a {}-byte buffer", src.len),
            ));
        }
        let size = align_to(len as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = self.scoped("read_buffer", |device| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("read-back staging"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_buffer"),
            });
            encoder.copy_buffer_to_buffer(&src.buffer, 0, &staging, 0, size);
            self.queue.submit(std::iter::once(encoder.finish()));
            staging
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only goes away if read_back already returned.
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| ComputeError::operation("read_buffer", "map callback never fired"))??;

        let mapped = slice.get_mapped_range();
        let out = mapped[..len].to_vec();
        drop(mapped);
        staging.unmap();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_already_aligned() {
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(256, 4), 256);
    }

    #[test]
    fn test_align_to_rounds_up() {
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(10, 4), 12);
        // 3 bytes per pixel, 5 pixels.
        assert_eq!(align_to(15, 4), 16);
    }

    #[test]
    fn test_align_to_zero() {
        assert_eq!(align_to(0, 4), 0);
    }

    fn limits(binding: u32, buffer: u64) -> wgpu::Limits {
        wgpu::Limits {
            max_storage_buffer_binding_size: binding,
            max_buffer_size: buffer,
            ..wgpu::Limits::default()
        }
    }

    #[test]
    fn test_padded_size_at_limit() {
        assert_eq!(padded_size(1024, &limits(1024, 1 << 20)).unwrap(), 1024);
        assert_eq!(padded_size(0, &limits(1024, 1 << 20)).unwrap(), 0);
    }

    #[test]
    fn test_padded_size_one_past_limit() {
        match padded_size(1025, &limits(1024, 1 << 20)) {
            Err(ComputeError::BufferTooLarge { requested, max }) => {
                assert_eq!((requested, max), (1028, 1024));
            }
            other => panic!("expected BufferTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_padding_pushes_past_limit() {
        // 1025 fits a 1026-byte limit, its 4-byte padded size does not.
        let err = padded_size(1025, &limits(1026, 1 << 20)).unwrap_err();
        assert!(matches!(err, ComputeError::BufferTooLarge { requested: 1028, max: 1026 }));
        assert_eq!(padded_size(1024, &limits(1026, 1 << 20)).unwrap(), 1024);
    }

    #[test]
    fn test_padded_size_respects_smaller_buffer_limit() {
        let err = padded_size(600, &limits(1024, 512)).unwrap_err();
        assert!(matches!(err, ComputeError::BufferTooLarge { requested: 600, max: 512 }));
    }

    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
            .output()
            .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}");
        eprint!("{stderr}");
        stdout + &stderr
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_upload_read_back_unaligned() {
        use crate::config::DeviceOptions;

        let gpu = GpuDevice::open(DeviceOptions::default()).expect("need a GPU");
        let bytes: Vec<u8> = (0u8..15).collect();
        let buf = gpu.upload(&bytes).unwrap();
        assert_eq!(buf.len, 15);
        // Input buffers are STORAGE only and cannot be read back. Output
        // buffers start zeroed and come back trimmed to their logical length.
        let out = gpu.allocate(10).unwrap();
        let zeros = gpu.read_back(&out, 10).unwrap();
        assert_eq!(zeros, vec![0u8; 10]);
        assert!(gpu.read_back(&out, 11).is_err());
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_upload_read_back_unaligned() {
        let out = run_gpu_test_in_subprocess("gpu::buffer::tests::inner_upload_read_back_unaligned");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
