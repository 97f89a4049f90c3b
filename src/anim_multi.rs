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

//! Format `0x12` (`ANIM_MULTIPLE`): 32x32 or 64x64 animation, AES-CBC over
//! a sequence of LZO1X-compressed, tile-major frames.

use crate::{primitives, tile, Animation, DecodeError, Frame, FrameOutcome};

/// Decodes a `0x12` container's body.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 5-byte frame header is
/// missing, or a primitive failure from AES decryption. Individual
/// malformed frames are recovered (duplicate previous / black) rather than
/// failing the whole container.
pub fn decode(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 5 {
        return Err(DecodeError::TruncatedHeader);
    }
    let total_frames = body[0];
    let speed_ms = u16::from_be_bytes([body[1], body[2]]);
    let row_count = body[3];
    let column_count = body[4];

    let width = usize::from(column_count) * 16;
    let height = usize::from(row_count) * 16;
    let uncompressed_frame_size = width * height * 3;

    let data = primitives::decrypt_aes_cbc(&body[5..])?;

    let mut frames = Vec::new();
    let mut pos = 0usize;
    for _ in 0..total_frames {
        let decoded = (|| -> Result<Frame, DecodeError> {
            if pos + 4 > data.len() {
                return Err(DecodeError::TruncatedPayload {
                    expected: pos + 4,
                    actual: data.len(),
                });
            }
            let frame_size =
                u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                    as usize;
            let start = pos + 4;
            if start + frame_size > data.len() {
                return Err(DecodeError::TruncatedPayload {
                    expected: start + frame_size,
                    actual: data.len(),
                });
            }
            let raw = primitives::lzo_decompress(
                &data[start..start + frame_size],
                uncompressed_frame_size,
            )?;
            pos = start + frame_size;
            Ok(tile::assemble(&raw, row_count, column_count))
        })();

        let outcome = FrameOutcome::from_result(decoded, frames.last(), || {
            Frame::from_rgb_bytes(width, height, vec![0u8; width * height * 3])
                .expect("buffer sized exactly width*height*3")
        });
        let keep_going = outcome.should_continue();
        frames.push(outcome.into_frame());
        if !keep_going {
            break;
        }
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
