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

//! Format `0x11` (`PIC_MULTIPLE`): a single still image, AES-CBC wrapping
//! one LZO1X-compressed tile-major frame.

use crate::{primitives, tile, Animation, DecodeError};

/// Fixed playback speed for single-image containers; there's no animation
/// timing to carry, so the original decoder hardcodes 40ms.
const STILL_IMAGE_SPEED_MS: u16 = 40;

/// Decodes a `0x11` container's body.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 6-byte header is
/// missing, or a primitive failure from AES/LZO1X.
pub fn decode(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 6 {
        return Err(DecodeError::TruncatedHeader);
    }
    let row_count = body[0];
    let column_count = body[1];
    let length = u32::from_be_bytes([body[2], body[3], body[4], body[5]]) as usize;

    let width = usize::from(column_count) * 16;
    let height = usize::from(row_count) * 16;
    let uncompressed_frame_size = width * height * 3;

    let data = primitives::decrypt_aes_cbc(&body[6..])?;
    if length > data.len() {
        return Err(DecodeError::TruncatedPayload {
            expected: length,
            actual: data.len(),
        });
    }
    let raw = primitives::lzo_decompress(&data[..length], uncompressed_frame_size)?;
    let frame = tile::assemble(&raw, row_count, column_count);

    Ok(Animation {
        speed_ms: STILL_IMAGE_SPEED_MS,
        row_count,
        column_count,
        width,
        height,
        frames: vec![frame],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_header() {
        let err = decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }
}
