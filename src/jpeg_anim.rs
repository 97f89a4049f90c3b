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

//! Formats `0x1F` (`ANIM_FORMAT_0x1F`) and `0x29` (`ANIM_FORMAT_0x29`):
//! animations stored as a run of concatenated JPEG images rather than a
//! palette-indexed bitstream.

use crate::{primitives, Animation, DecodeError, Frame};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Decodes a `0x1F` container's body: plain concatenated JPEG frames, no
/// gap metadata between them.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 5-byte header is
/// missing.
pub fn decode_0x1f(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 5 {
        return Err(DecodeError::TruncatedHeader);
    }
    let total_frames = body[0];
    let speed_ms = u16::from_be_bytes([body[1], body[2]]);
    let row_count = body[3];
    let column_count = body[4];
    let width = usize::from(column_count) * 16;
    let height = usize::from(row_count) * 16;
    let payload = &body[5..];

    let mut frames = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() && frames.len() < usize::from(total_frames) {
        let Some(soi) = find(payload, &SOI, pos) else {
            break;
        };
        let eoi = find(payload, &EOI, soi + 2).unwrap_or(payload.len().saturating_sub(2));
        let jpeg_data = &payload[soi..(eoi + 2).min(payload.len())];

        if let Ok((jw, jh, rgb)) = primitives::decode_jpeg(jpeg_data) {
            let rgb = if jw == width && jh == height {
                rgb
            } else {
                primitives::resize_nearest_rgb(&rgb, jw as u32, jh as u32, width as u32, height as u32)
            };
            if let Ok(frame) = Frame::from_rgb_bytes(width, height, rgb) {
                frames.push(frame);
            }
        }
        pos = eoi + 2;
    }

    if frames.is_empty() {
        frames = (0..total_frames)
            .map(|_| Frame::from_rgb_bytes(width, height, vec![0u8; width * height * 3]))
            .collect::<Result<_, _>>()?;
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

const GAP_PREFIX: [u8; 3] = [0x02, 0x00, 0x00];
const RESERVED_HEADER_LEN: usize = 9;

/// Decodes a `0x29` container's body: a 5-byte header, an opaque 9-byte
/// reserved block, then JPEG frames optionally separated by a 5-byte gap
/// marker (`\x02\x00\x00` + 2 more bytes).
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the header and reserved
/// block don't fit, or [`DecodeError::TruncatedPayload`] if no JPEG frame
/// could be extracted at all.
pub fn decode_0x29(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 5 + RESERVED_HEADER_LEN {
        return Err(DecodeError::TruncatedHeader);
    }
    let total_frames = usize::from(body[0]);
    let speed_raw = (u16::from(body[1]) << 8) | u16::from(body[2]);
    let mut row_count = if body[3] == 0 { 1 } else { body[3] };
    let mut column_count = if body[4] == 0 { 1 } else { body[4] };

    let payload = &body[5 + RESERVED_HEADER_LEN..];
    if payload.is_empty() {
        return Err(DecodeError::TruncatedPayload {
            expected: 1,
            actual: 0,
        });
    }

    let jpeg_frames = extract_gapped_jpeg_frames(payload, total_frames);
    if jpeg_frames.is_empty() {
        return Err(DecodeError::TruncatedPayload {
            expected: 1,
            actual: 0,
        });
    }

    let mut width = usize::from(column_count) * 16;
    let mut height = usize::from(row_count) * 16;
    let have_declared_size = body[3] != 0 && body[4] != 0;

    let mut frames = Vec::with_capacity(jpeg_frames.len());
    let mut target: Option<(usize, usize)> = if have_declared_size {
        Some((width, height))
    } else {
        None
    };

    for jpeg_data in jpeg_frames {
        let Ok((jw, jh, rgb)) = primitives::decode_jpeg(jpeg_data) else {
            break;
        };
        let (tw, th) = *target.get_or_insert((jw, jh));
        let rgb = if jw == tw && jh == th {
            rgb
        } else {
            primitives::resize_nearest_rgb(&rgb, jw as u32, jh as u32, tw as u32, th as u32)
        };
        if let Ok(frame) = Frame::from_rgb_bytes(tw, th, rgb) {
            frames.push(frame);
        }
    }

    if let Some((tw, th)) = target {
        if !have_declared_size {
            width = tw;
            height = th;
            row_count = (height / 16).max(1) as u8;
            column_count = (width / 16).max(1) as u8;
        }
    }

    if frames.is_empty() {
        return Err(DecodeError::TruncatedPayload {
            expected: 1,
            actual: 0,
        });
    }

    Ok(Animation {
        speed_ms: if speed_raw == 0 { 50 } else { speed_raw },
        row_count,
        column_count,
        width,
        height,
        frames,
    })
}

fn extract_gapped_jpeg_frames(data: &[u8], expected_frames: usize) -> Vec<&[u8]> {
    let mut frames = Vec::new();
    let mut cursor = 0usize;
    while cursor < data.len() {
        let Some(start) = find(data, &SOI, cursor) else {
            break;
        };
        let Some(end) = find(data, &EOI, start) else {
            break;
        };
        let end = end + 2;
        frames.push(&data[start..end]);
        cursor = end;

        if cursor + 5 <= data.len() && data[cursor..cursor + 3] == GAP_PREFIX {
            cursor += 5;
        }

        if expected_frames != 0 && frames.len() >= expected_frames {
            break;
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_0x1f_rejects_short_header() {
        let err = decode_0x1f(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }

    #[test]
    fn decode_0x29_rejects_short_header() {
        let err = decode_0x29(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }

    #[test]
    fn extract_gapped_jpeg_frames_respects_frame_cap() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&SOI);
            data.push(0);
            data.extend_from_slice(&EOI);
        }
        let frames = extract_gapped_jpeg_frames(&data, 2);
        assert_eq!(frames.len(), 2);
    }
}
