// platforms.rs — The platform enumeration demo.
//
// Prints how many compute platforms are visible and, optionally, what each
// one exposes. Zero platforms is a failure: the count line is still printed
// and the process exits with status 255.

use std::fmt::Write;

use crate::gpu::device::Platform;

/// Exit status when no platform is available.
pub const EXIT_NO_PLATFORM: u8 = 255;

/// The one-line summary.
pub fn count_line(platforms: &[Platform]) -> String {
    format!("Found {} compute platform(s).", platforms.len())
}

/// Full report: the count line, plus one block per platform if `verbose`.
pub fn report(platforms: &[Platform], verbose: bool) -> String {
    let mut out = count_line(platforms);
    out.push('\n');
    if verbose {
        for (i, platform) in platforms.iter().enumerate() {
            let _ = writeln!(out, "  [{i}] {platform}");
            for (j, device) in platform.devices.iter().enumerate() {
                let kind = if device.is_gpu_class() { "gpu" } else { "cpu" };
                let _ = writeln!(
                    out,
                    "      [{j}] {} ({:?}, {kind}, vendor {:#06x}, device {:#06x})",
                    device.name, device.device_type, device.vendor, device.device
                );
            }
        }
    }
    out
}

/// Process exit status for the enumeration result.
pub fn exit_status(platforms: &[Platform]) -> u8 {
    if platforms.is_empty() {
        EXIT_NO_PLATFORM
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::AdapterInfo;

    fn platform(backend: wgpu::Backend, names: &[&str]) -> Platform {
        Platform {
            backend,
            devices: names
                .iter()
                .map(|n| AdapterInfo {
                    name: n.to_string(),
                    vendor: 0x10de,
                    device: 0x2204,
                    device_type: wgpu::DeviceType::DiscreteGpu,
                    backend,
                })
                .collect(),
        }
    }

    #[test]
    fn test_zero_platforms_prints_zero_and_fails() {
        assert_eq!(count_line(&[]), "Found 0 compute platform(s).");
        assert_eq!(exit_status(&[]), EXIT_NO_PLATFORM);
    }

    #[test]
    fn test_counts_each_platform_once() {
        for n in 1..=10usize {
            let platforms: Vec<Platform> =
                (0..n).map(|_| platform(wgpu::Backend::Vulkan, &["gpu"])).collect();
            assert_eq!(count_line(&platforms), format!("Found {n} compute platform(s)."));
            assert_eq!(exit_status(&platforms), 0);
        }
    }

    #[test]
    fn test_verbose_report_lists_devices() {
        let platforms = vec![
            platform(wgpu::Backend::Vulkan, &["RTX 3090", "llvmpipe"]),
            platform(wgpu::Backend::Gl, &["ANGLE"]),
        ];
        let text = report(&platforms, true);
        assert!(text.starts_with("Found 2 compute platform(s).\n"));
        assert!(text.contains("[0] Vulkan (2 device(s))"));
        assert!(text.contains("[1] llvmpipe"));
        assert!(text.contains("vendor 0x10de"));
        assert!(text.contains("[1] Gl (1 device(s))"));
    }

    #[test]
    fn test_quiet_report_is_count_only() {
        let platforms = vec![platform(wgpu::Backend::Metal, &["M2"])];
        assert_eq!(report(&platforms, false), "Found 1 compute platform(s).\n");
    }
}
