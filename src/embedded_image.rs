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

//! Format `0x2B` (`ANIM_EMBEDDED_IMAGE`): an embedded GIF or WebP
//! container, composited frame-by-frame over a white backdrop and resized
//! to the declared tile geometry.

use crate::{primitives, Animation, DecodeError, Frame};

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decodes a `0x2B` container's body.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 5-byte header is
/// missing, or [`DecodeError::PrimitiveFailure`] if neither a `GIF8` nor a
/// `RIFF....WEBP` signature can be located and the payload doesn't sniff
/// as a plain still image either.
pub fn decode(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 5 {
        return Err(DecodeError::TruncatedHeader);
    }
    let total_frames_hint = usize::from(body[0]);
    let speed_ms = u16::from_be_bytes([body[1], body[2]]);
    let row_count = body[3];
    let column_count = body[4];
    let width = usize::from(column_count) * 16;
    let height = usize::from(row_count) * 16;
    let data = &body[5..];

    let rgb_frames = extract_frames_rgb(data, width, height)?;
    let _ = total_frames_hint; // frame count is derived from what actually decoded

    let frames = rgb_frames
        .into_iter()
        .map(|rgb| Frame::from_rgb_bytes(width, height, rgb))
        .collect::<Result<_, _>>()?;

    Ok(Animation {
        speed_ms,
        row_count,
        column_count,
        width,
        height,
        frames,
    })
}

fn extract_frames_rgb(data: &[u8], width: usize, height: usize) -> Result<Vec<Vec<u8>>, DecodeError> {
    if let Some(off) = find(data, b"GIF8") {
        return primitives::decode_animated_frames(&data[off..], image::ImageFormat::Gif, width, height);
    }
    if let Some(off) = find(data, b"RIFF") {
        if data.get(off + 8..off + 12) == Some(b"WEBP".as_slice()) {
            return primitives::decode_animated_frames(
                &data[off..],
                image::ImageFormat::WebP,
                width,
                height,
            );
        }
    }
    // Last resort: sniff a plain still image and treat it as a single frame.
    let img = image::load_from_memory(data)
        .map_err(|e| DecodeError::PrimitiveFailure(format!("embedded image sniff failed: {e}")))?;
    let (jw, jh, rgb) = primitives::dynamic_image_to_rgb(&img);
    let rgb = if jw == width && jh == height {
        rgb
    } else {
        primitives::resize_nearest_rgb(&rgb, jw as u32, jh as u32, width as u32, height as u32)
    };
    Ok(vec![rgb])
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
