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

//! Format `0x2A` (`ANIM_CONTAINER_ZSTD`): a single zstd-compressed block of
//! back-to-back raw RGB frames (no tile remapping, already scanline order).

use crate::{primitives, Animation, DecodeError, Frame};

/// Decodes a `0x2A` container's body.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 5-byte header is
/// missing, or a primitive failure if the zstd magic can't be located or
/// the frame dimensions are degenerate. Fewer frames than `total_frames`
/// declares are accepted if the decompressed stream is short.
pub fn decode(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 5 {
        return Err(DecodeError::TruncatedHeader);
    }
    let total_frames = usize::from(body[0]);
    let speed_ms = u16::from_be_bytes([body[1], body[2]]);
    let row_count = body[3];
    let column_count = body[4];
    let width = usize::from(column_count) * 16;
    let height = usize::from(row_count) * 16;

    let decompressed = primitives::zstd_find_and_decompress(&body[5..])?;
    let frame_bytes = width * height * 3;
    if frame_bytes == 0 {
        return Err(DecodeError::PrimitiveFailure(
            "zero-sized frame dimensions".to_string(),
        ));
    }
    let available = decompressed.len() / frame_bytes;
    let target_frames = total_frames.min(available);

    let mut frames = Vec::with_capacity(target_frames);
    for i in 0..target_frames {
        let chunk = decompressed[i * frame_bytes..(i + 1) * frame_bytes].to_vec();
        frames.push(Frame::from_rgb_bytes(width, height, chunk)?);
    }

    Ok(Animation {
        speed_ms,
        row_count,
        column_count,
        width,
        height,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_header() {
        let err = decode(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }
}
