// image.rs — Host-side image buffer plus JPEG decode/encode.
//
// Layout: row-major, tightly packed, interleaved channels.
//
//   RGB  (channels = 3):  R00 G00 B00 R01 G01 B01 ... R10 G10 B10 ...
//   Gray (channels = 1):  Y00 Y01 ... Y10 ...
//
// There is no stride: `data.len() == width * height * channels` always.
// The GPU buffers mirror this layout byte-for-byte, so upload is a plain
// copy and read-back needs no un-padding beyond trimming the tail.
//
// Decoding and encoding are delegated to the `image` crate. Decode forces
// three channels whatever the file holds; encode writes one channel.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::PipelineError;

/// A decoded image owned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostImage {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl HostImage {
    /// Wrap an existing buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * channels`.
    pub fn from_vec(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        assert!(
            matches!(channels, 1 | 3),
            "only 1- and 3-channel images are supported (got {channels})"
        );
        assert_eq!(
            data.len(),
            width as usize * height as usize * channels as usize,
            "buffer length does not match {width}x{height}x{channels}"
        );
        HostImage { width, height, channels, data }
    }

    /// Decode any supported image file into a 3-channel RGB buffer.
    pub fn load_rgb(path: &Path) -> Result<Self, PipelineError> {
        let decoded = image::open(path).map_err(|source| PipelineError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_decoded(path, &decoded)
    }

    /// Convert an already decoded image to RGB. `path` only labels errors.
    ///
    /// Zero-area images are rejected. The JPEG and PNG decoders already
    /// refuse such files; this covers images built in memory.
    pub fn from_decoded(path: &Path, decoded: &image::DynamicImage) -> Result<Self, PipelineError> {
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::EmptyImage { path: path.to_path_buf() });
        }
        tracing::debug!(width, height, path = %path.display(), "decoded image");
        Ok(HostImage::from_vec(width, height, 3, rgb.into_raw()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Number of pixels (width × height).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The channel values of pixel (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let i = (y as usize * self.width as usize + x as usize) * c;
        &self.data[i..i + c]
    }

    /// Encode as JPEG into memory.
    ///
    /// The file itself is written separately so a failed encode never
    /// leaves a truncated output behind.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let color = match self.channels {
            1 => ExtendedColorType::L8,
            _ => ExtendedColorType::Rgb8,
        };
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(&self.data, self.width, self.height, color)?;
        Ok(out.into_inner())
    }
}
