// Copyright 2025 The pixelbean Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoder for Divoom pixel-animation container files (commonly `.dat`).
//!
//! Divoom devices distribute small animation assets using a family of eight
//! closely related container formats, each wrapping a different combination
//! of AES-CBC encryption, LZO compression, palette-indexed bitstream coding,
//! embedded JPEG sequences, zstd-compressed raw RGB, or embedded GIF/WebP
//! streams. [`decode_bytes`] inspects the leading format byte, routes to the
//! matching decoder, and returns a uniform [`Animation`] of ordered RGB
//! frames plus a per-frame delay.
//!
//! # Example
//!
//! ```no_run
//! let data = std::fs::read("example.dat").unwrap();
//! let anim = pixelbean::decode_bytes(&data).unwrap();
//! println!("{} frames at {}x{}", anim.frame_count(), anim.width, anim.height);
//! ```

mod anim_multi;
mod anim_multi64;
mod anim_single;
mod bitstream;
mod dispatch;
mod embedded_image;
mod hier_palette;
mod jpeg_anim;
mod pic_multi;
mod primitives;
mod tile;
mod zstd_raw;

use std::path::Path;

/// An 8-bit RGB color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A single decoded animation frame: `height * width` RGB samples in
/// row-major, top-to-bottom, left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Builds a frame from a row-major RGB byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedPayload`] if `data.len() !=
    /// height*width*3`.
    pub fn from_rgb_bytes(width: usize, height: usize, data: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(DecodeError::TruncatedPayload {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    fn black(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * 3],
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major RGB bytes, `height*width*3` long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)`. Panics if out of bounds, mirroring slice indexing.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Rgb {
        let off = (y * self.width + x) * 3;
        Rgb::new(self.data[off], self.data[off + 1], self.data[off + 2])
    }

    fn set(&mut self, x: usize, y: usize, color: Rgb) {
        let off = (y * self.width + x) * 3;
        self.data[off] = color.r;
        self.data[off + 1] = color.g;
        self.data[off + 2] = color.b;
    }

    /// Resizes to `(new_width, new_height)` using nearest-neighbor sampling.
    #[must_use]
    pub fn resize_nearest(&self, new_width: usize, new_height: usize) -> Frame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }
        let mut data = vec![0u8; new_width * new_height * 3];
        for y in 0..new_height {
            let src_y = (y * self.height) / new_height.max(1);
            let src_y = src_y.min(self.height.saturating_sub(1));
            for x in 0..new_width {
                let src_x = (x * self.width) / new_width.max(1);
                let src_x = src_x.min(self.width.saturating_sub(1));
                let pixel = self.get(src_x, src_y);
                let off = (y * new_width + x) * 3;
                data[off] = pixel.r;
                data[off + 1] = pixel.g;
                data[off + 2] = pixel.b;
            }
        }
        Frame {
            width: new_width,
            height: new_height,
            data,
        }
    }
}

/// A fully decoded Divoom animation: ordered frames plus shared timing and
/// tile geometry.
#[derive(Debug, Clone)]
pub struct Animation {
    pub speed_ms: u16,
    pub row_count: u8,
    pub column_count: u8,
    pub width: usize,
    pub height: usize,
    pub frames: Vec<Frame>,
}

impl Animation {
    /// Number of frames, derived from `frames.len()` so it can never drift
    /// from the actual frame count.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// 1-indexed frame access, mirroring the original Python API's
    /// `get_frame_image(frame_number)` contract.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FrameOutOfRange`] if `frame_number` is 0 or
    /// greater than `frame_count()`.
    pub fn get_frame_one_indexed(&self, frame_number: usize) -> Result<&Frame, DecodeError> {
        if frame_number == 0 || frame_number > self.frames.len() {
            return Err(DecodeError::FrameOutOfRange {
                requested: frame_number,
                frame_count: self.frames.len(),
            });
        }
        Ok(&self.frames[frame_number - 1])
    }
}

/// Outcome of decoding one frame inside a multi-frame container.
///
/// Every multi-frame decode loop (`anim_multi`, `anim_multi64`) follows the
/// same per-frame recovery policy instead of propagating a `DecodeError`
/// out of the container: a bad frame duplicates the previous one if there
/// is one, otherwise it falls back to black, and either way the container
/// stops accepting further frames. This type names that policy so the
/// loops consume it uniformly rather than repeating the match by hand.
pub(crate) enum FrameOutcome {
    /// The frame decoded cleanly; the loop should keep going.
    Ok(Frame),
    /// The frame failed to decode; the previous frame was duplicated.
    Recovered(Frame),
    /// The frame failed to decode and there was no previous frame to
    /// duplicate; a black frame was substituted.
    OutOfData(Frame),
}

impl FrameOutcome {
    /// Resolves a raw per-frame decode result against the frames decoded
    /// so far. `black` is only invoked when there is no previous frame.
    pub(crate) fn from_result(
        result: Result<Frame, DecodeError>,
        previous: Option<&Frame>,
        black: impl FnOnce() -> Frame,
    ) -> Self {
        match result {
            Ok(frame) => FrameOutcome::Ok(frame),
            Err(_) => match previous {
                Some(prev) => FrameOutcome::Recovered(prev.clone()),
                None => FrameOutcome::OutOfData(black()),
            },
        }
    }

    /// Whether the decode loop should proceed to the next frame.
    pub(crate) fn should_continue(&self) -> bool {
        matches!(self, FrameOutcome::Ok(_))
    }

    /// The frame to push into the container's frame list.
    pub(crate) fn into_frame(self) -> Frame {
        match self {
            FrameOutcome::Ok(f) | FrameOutcome::Recovered(f) | FrameOutcome::OutOfData(f) => f,
        }
    }
}

/// Error taxonomy for container-level decode failures.
///
/// Per-frame recoverable conditions (a malformed or truncated frame inside
/// an otherwise-healthy container) are handled internally by duplicating
/// the previous frame or emitting black and do not surface as a
/// `DecodeError` — see each decoder module's recovery loop.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported format byte: 0x{0:02X}")]
    UnsupportedFormat(u8),

    #[error("container header truncated")]
    TruncatedHeader,

    #[error("frame payload truncated: expected {expected} bytes, got {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    #[error("expected 0xAA frame marker, not found")]
    BadMarker,

    #[error("palette offset {offset} exceeds payload length {len}")]
    PaletteOutOfRange { offset: usize, len: usize },

    #[error("expected encryption type 0x{expected:02X}, got 0x{actual:02X}")]
    InvalidEncryption { expected: u8, actual: u8 },

    #[error("primitive codec failure: {0}")]
    PrimitiveFailure(String),

    #[error("bitstream ran out of data mid-frame")]
    PartialFrame,

    #[error("frame {requested} out of range (animation has {frame_count} frames)")]
    FrameOutOfRange { requested: usize, frame_count: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes a container byte buffer into an [`Animation`].
///
/// # Errors
///
/// Returns `Err(DecodeError)` on container-level fatal errors
/// (`UnsupportedFormat`, `TruncatedHeader`). Per-frame recoverable
/// conditions never abort the decode; they reduce the returned frame count
/// or duplicate a prior frame instead.
pub fn decode_bytes(data: &[u8]) -> Result<Animation, DecodeError> {
    decode_bytes_traced(data, false)
}

/// Same as [`decode_bytes`] but with the HierPalette per-tile trace flag
/// enabled (requires the `debug-logging` feature to produce output).
///
/// # Errors
///
/// See [`decode_bytes`].
pub fn decode_bytes_traced(data: &[u8], trace: bool) -> Result<Animation, DecodeError> {
    dispatch::decode(data, trace)
}

/// Reads `path` and decodes it as a Divoom container.
///
/// # Errors
///
/// Propagates [`DecodeError::Io`] on read failure, or any error from
/// [`decode_bytes`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<Animation, DecodeError> {
    let data = std::fs::read(path)?;
    decode_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_from_rgb_bytes_rejects_wrong_length() {
        let err = Frame::from_rgb_bytes(2, 2, vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedPayload { .. }));
    }

    #[test]
    fn frame_get_round_trips_set() {
        let mut frame = Frame::from_rgb_bytes(2, 2, vec![0u8; 12]).unwrap();
        frame.set(1, 0, Rgb::new(10, 20, 30));
        assert_eq!(frame.get(1, 0), Rgb::new(10, 20, 30));
        assert_eq!(frame.get(0, 0), Rgb::BLACK);
    }

    #[test]
    fn animation_frame_count_tracks_frames_len() {
        let anim = Animation {
            speed_ms: 100,
            row_count: 1,
            column_count: 1,
            width: 16,
            height: 16,
            frames: vec![Frame::black(16, 16)],
        };
        assert_eq!(anim.frame_count(), 1);
        assert!(anim.get_frame_one_indexed(1).is_ok());
        assert!(anim.get_frame_one_indexed(0).is_err());
        assert!(anim.get_frame_one_indexed(2).is_err());
    }

    #[test]
    fn unsupported_format_byte_is_rejected() {
        let err = decode_bytes(&[0xFFu8]).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(0xFF)));
    }

    #[test]
    fn empty_buffer_is_truncated_header() {
        let err = decode_bytes(&[]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }
}
