// error.rs — Error types for the grayscale pipeline and the compute layer.
//
// Two layers:
//   ComputeError  — anything the compute runtime reports (device discovery,
//                   allocation, kernel build, dispatch, read-back).
//   PipelineError — the driver's view: file I/O, image codec, configuration,
//                   plus a wrapped ComputeError.
//
// Every error travels up with `?` to the one handler in `main`, which prints
// it and exits. Resources held by the driver are dropped on the way up.

use std::path::PathBuf;

/// Process exit status for any pipeline failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors reported by a compute runtime.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// No compute platform (backend with at least one adapter) is available.
    #[error("no compute platform available")]
    NoPlatform,

    /// Platforms exist, but none offers a GPU-class device under the
    /// active selection policy.
    #[error("no GPU device found on platform {platform}")]
    NoGpuDevice { platform: String },

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// A buffer would exceed the device's storage binding limit.
    #[error("buffer of {requested} bytes exceeds device limit of {max} bytes")]
    BufferTooLarge { requested: u64, max: u64 },

    /// Kernel compilation failed. `log` holds the full build log.
    #[error("kernel build failed")]
    BuildFailed { log: String },

    /// A runtime call failed. `operation` names the call.
    #[error("error during operation '{operation}': {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },

    #[error("buffer read-back failed: {0}")]
    ReadBack(#[from] wgpu::BufferAsyncError),
}

impl ComputeError {
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        ComputeError::Operation {
            operation,
            message: message.into(),
        }
    }

    /// The build log, if this is a kernel build failure.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            ComputeError::BuildFailed { log } => Some(log),
            _ => None,
        }
    }
}

/// Errors from the grayscale pipeline driver.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {} has no pixels", path.display())]
    EmptyImage { path: PathBuf },

    #[error("failed to load kernel {}: {source}", path.display())]
    KernelLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("failed to encode {}: {source}", path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Exit status the binary reports for this error. Every class maps to
    /// the same status; none is retried.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// The kernel build log carried by this error, if any.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            PipelineError::Compute(e) => e.build_log(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display_names_the_call() {
        let err = ComputeError::operation("create_kernel", "entry point not found");
        assert_eq!(
            err.to_string(),
            "error during operation 'create_kernel': entry point not found"
        );
    }

    #[test]
    fn test_build_log_reaches_pipeline_error() {
        let err: PipelineError = ComputeError::BuildFailed {
            log: "1:5: expected ';'".into(),
        }
        .into();
        assert_eq!(err.build_log(), Some("1:5: expected ';'"));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_non_build_errors_have_no_log() {
        let err = PipelineError::EmptyImage { path: "a.jpg".into() };
        assert!(err.build_log().is_none());
        assert!(PipelineError::from(ComputeError::NoPlatform).build_log().is_none());
    }

    #[test]
    fn test_kernel_load_mentions_path() {
        let err = PipelineError::KernelLoad {
            path: "missing.wgsl".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("missing.wgsl"));
    }
}
