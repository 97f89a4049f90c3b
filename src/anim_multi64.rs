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

//! Format `0x1A` (`ANIM_MULTIPLE_64`): 64x64 or 128x128 animation with two
//! mutually exclusive per-container frame encodings:
//!
//! - direct `0x0C` encryption: each frame is a flat, bit-packed 64x64
//!   index stream decoded by [`decode_frame_data_0x0c`] and then run
//!   through the ordinary tile assembler;
//! - `0xAA`-marked frames (`0x11` raw / `0x13` delta-palette / `0x15`
//!   full-palette), where `0x13`/`0x15` defer to [`hier_palette`].
//!
//! 64x64 containers always use the direct `0x0C` path; larger containers
//! probe the stream for which encoding is in play.

use crate::hier_palette::HierPaletteFrame;
use crate::{tile, Animation, DecodeError, Frame, FrameOutcome, Rgb};

/// Header shared by both sub-encodings: `total_frames, speed, row_count,
/// column_count`, all big-endian, 5 bytes total.
struct Header {
    total_frames: u8,
    speed_ms: u16,
    row_count: u8,
    column_count: u8,
}

fn parse_header(body: &[u8]) -> Result<Header, DecodeError> {
    if body.len() < 5 {
        return Err(DecodeError::TruncatedHeader);
    }
    Ok(Header {
        total_frames: body[0],
        speed_ms: u16::from_be_bytes([body[1], body[2]]),
        row_count: body[3],
        column_count: body[4],
    })
}

/// Extracts the palette-index bit width/offset parameters (`bVar9`,
/// `iVar11`) from the frame's control byte (`data[6]`), matching the
/// reference decoder's bit-twiddled derivation exactly.
fn derive_b_var9_and_i_var11(control_byte: u8) -> (u32, u32) {
    if control_byte == 0 {
        return (8, 768);
    }
    let i_var11 = u32::from(control_byte) * 3;
    let mut u_var13 = u32::from(control_byte);
    let mut b_var9: i64 = -1;
    let mut b_var15: i64 = 1;
    loop {
        if u_var13 & 1 != 0 {
            let was_unset = b_var9 == -1;
            b_var9 = b_var15;
            if was_unset {
                b_var9 = b_var15 - 1;
            }
        }
        let u_var14 = u_var13 & 0xFFFE;
        b_var15 += 1;
        u_var13 = u_var14 >> 1;
        if u_var14 == 0 {
            break;
        }
    }
    (b_var9.max(0) as u32, i_var11)
}

/// Extracts a single palette index for `pixel_idx`, `Ok(-1)` if the
/// required bytes fall outside `data` (treated by the caller as "emit
/// black" for that pixel only), or `Err` if `bVar9 >= 9` — the reference
/// decoder has no implementation for that case and raises, which aborts
/// the whole frame rather than just that pixel.
fn get_dot_info(data: &[u8], pos: usize, pixel_idx: u32, b_var9: u32) -> Result<i64, DecodeError> {
    if pos >= data.len() {
        return Ok(-1);
    }
    if b_var9 >= 9 {
        return Err(DecodeError::PrimitiveFailure(format!(
            "0x0C dot decode: unimplemented bVar9={b_var9}"
        )));
    }
    let u_var2 = (b_var9 * pixel_idx) & 7;
    let u_var4 = (b_var9 * pixel_idx) >> 3;
    let u_var3 = b_var9 + u_var2;

    if u_var3 < 9 {
        let idx = pos + u_var4 as usize;
        if idx >= data.len() {
            return Ok(-1);
        }
        let shift1 = (8 - u_var3) & 0xFF;
        let mut v = (u32::from(data[idx]) << shift1) & 0xFF;
        let shift2 = (u_var2 + (8 - u_var3)) & 0xFF;
        v >>= shift2;
        Ok(i64::from(v))
    } else {
        let idx1 = pos + u_var4 as usize + 1;
        let idx0 = pos + u_var4 as usize;
        if idx1 >= data.len() || idx0 >= data.len() {
            return Ok(-1);
        }
        let shift1 = (0x10 - u_var3) & 0xFF;
        let mut v = (u32::from(data[idx1]) << shift1) & 0xFF;
        v >>= (0x10 - u_var3) & 0xFF;
        v &= 0xFFFF;
        v <<= (8 - u_var2) & 0xFF;
        v |= u32::from(data[idx0]) >> u_var2;
        Ok(i64::from(v))
    }
}

/// Decodes one `0x0C`-encrypted frame into a flat 64x64 tile-major RGB
/// buffer (12288 bytes), ready for [`tile::assemble`].
fn decode_frame_data_0x0c(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::TruncatedPayload {
            expected: 8,
            actual: data.len(),
        });
    }
    let encrypt_type = data[5];
    if encrypt_type != 0x0C {
        return Err(DecodeError::InvalidEncryption {
            expected: 0x0C,
            actual: encrypt_type,
        });
    }
    let (b_var9, i_var11) = derive_b_var9_and_i_var11(data[6]);
    let pos = ((i_var11 + 8) & 0xFFFF) as usize;

    let mut output = vec![0u8; 12288];
    for pixel_idx in 0..4096u32 {
        let color_index = get_dot_info(data, pos, pixel_idx & 0xFFFF, b_var9)?;
        let target = pixel_idx as usize * 3;
        if color_index < 0 {
            continue; // already zeroed (black)
        }
        let color_pos = 8 + color_index as usize * 3;
        if color_pos + 2 < data.len() {
            output[target] = data[color_pos];
            output[target + 1] = data[color_pos + 1];
            output[target + 2] = data[color_pos + 2];
        }
    }
    Ok(output)
}

/// Decodes the sequence of `0x0C`-encrypted frames, each prefixed by a
/// big-endian `u32` byte length.
fn decode_0x0c_frames(
    header: &Header,
    all_frame_data: &[u8],
    width: usize,
    height: usize,
) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut pos = 0usize;
    for _ in 0..header.total_frames {
        let result = (|| -> Result<Frame, DecodeError> {
            if pos + 4 > all_frame_data.len() {
                return Err(DecodeError::TruncatedPayload {
                    expected: pos + 4,
                    actual: all_frame_data.len(),
                });
            }
            let size = u32::from_be_bytes([
                all_frame_data[pos],
                all_frame_data[pos + 1],
                all_frame_data[pos + 2],
                all_frame_data[pos + 3],
            ]) as usize;
            let start = pos + 4;
            if start + size > all_frame_data.len() {
                return Err(DecodeError::TruncatedPayload {
                    expected: start + size,
                    actual: all_frame_data.len(),
                });
            }
            let raw = decode_frame_data_0x0c(&all_frame_data[start..start + size])?;
            pos = start + size;
            Ok(tile::assemble(&raw, header.row_count, header.column_count))
        })();

        let outcome = FrameOutcome::from_result(result, frames.last(), || black_frame(width, height));
        let keep_going = outcome.should_continue();
        frames.push(outcome.into_frame());
        if !keep_going {
            break;
        }
    }
    frames
}

fn black_frame(width: usize, height: usize) -> Frame {
    Frame::from_rgb_bytes(width, height, vec![0u8; width * height * 3])
        .expect("buffer sized exactly width*height*3")
}

fn looks_like_0x0c_container(all_frame_data: &[u8]) -> bool {
    if all_frame_data.len() < 10 || all_frame_data[4] == 0xAA {
        return false;
    }
    let first_frame_size = u32::from_be_bytes([
        all_frame_data[0],
        all_frame_data[1],
        all_frame_data[2],
        all_frame_data[3],
    ]) as usize;
    first_frame_size > 0
        && first_frame_size < all_frame_data.len()
        && all_frame_data[9] == 0x0C
}

/// Decodes the `0xAA`-marked frame sequence (`0x11`/`0x13`/`0x15`),
/// persisting the HierPalette palette across frames within the container.
fn decode_marker_frames(
    header: &Header,
    all_frame_data: &[u8],
    width: usize,
    height: usize,
    trace: bool,
) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    let mut palette: Vec<Rgb> = Vec::new();
    let mut pos = 0usize;

    for _ in 0..header.total_frames {
        if pos >= all_frame_data.len() {
            break;
        }
        let step = (|| -> Result<(Frame, Vec<Rgb>, usize), DecodeError> {
            let idx = pos + 4;
            if idx + 2 >= all_frame_data.len() {
                return Err(DecodeError::TruncatedHeader);
            }
            if all_frame_data[idx] != 0xAA {
                return Err(DecodeError::BadMarker);
            }
            let payload_len =
                usize::from(all_frame_data[idx + 1]) | (usize::from(all_frame_data[idx + 2]) << 8);
            if idx + payload_len > all_frame_data.len() {
                return Err(DecodeError::TruncatedPayload {
                    expected: idx + payload_len,
                    actual: all_frame_data.len(),
                });
            }
            let frame_data = &all_frame_data[idx..idx + payload_len];
            if frame_data.len() < 8 {
                return Err(DecodeError::TruncatedPayload {
                    expected: 8,
                    actual: frame_data.len(),
                });
            }
            let encrypt_type = frame_data[5] & 0x7F;
            let next_pos = idx + payload_len;

            if encrypt_type == 0x11 {
                let expected_raw = width * height * 3;
                if frame_data.len() < 8 + expected_raw {
                    return Err(DecodeError::TruncatedPayload {
                        expected: 8 + expected_raw,
                        actual: frame_data.len(),
                    });
                }
                let frame = Frame::from_rgb_bytes(
                    width,
                    height,
                    frame_data[8..8 + expected_raw].to_vec(),
                )?;
                Ok((frame, Vec::new(), next_pos))
            } else {
                let hier = HierPaletteFrame::parse(frame_data, width, height, &palette, trace)?;
                let updated_palette = hier.palette.clone();
                let frame = hier.decode_frame()?;
                Ok((frame, updated_palette, next_pos))
            }
        })();

        match step {
            Ok((frame, updated_palette, next_pos)) => {
                frames.push(frame);
                palette = updated_palette;
                pos = next_pos;
            }
            Err(err) => {
                let outcome = FrameOutcome::from_result(Err(err), frames.last(), || {
                    black_frame(width, height)
                });
                frames.push(outcome.into_frame());
                break;
            }
        }
    }
    frames
}

/// Decodes a `0x1A` container's body.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if the 5-byte frame header is
/// missing. Per-frame failures are recovered internally.
pub fn decode(body: &[u8], trace: bool) -> Result<Animation, DecodeError> {
    let header = parse_header(body)?;
    let all_frame_data = &body[5..];

    let width = usize::from(header.column_count) * 16;
    let height = usize::from(header.row_count) * 16;

    let frames = if width == 64 && height == 64 {
        decode_0x0c_frames(&header, all_frame_data, width, height)
    } else if looks_like_0x0c_container(all_frame_data) {
        decode_0x0c_frames(&header, all_frame_data, width, height)
    } else {
        decode_marker_frames(&header, all_frame_data, width, height, trace)
    };

    Ok(Animation {
        speed_ms: header.speed_ms,
        row_count: header.row_count,
        column_count: header.column_count,
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
        let err = decode(&[0u8; 3], false).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }

    #[test]
    fn derive_b_var9_zero_control_byte_uses_fixed_values() {
        assert_eq!(derive_b_var9_and_i_var11(0), (8, 768));
    }

    #[test]
    fn get_dot_info_rejects_b_var9_nine_or_above() {
        let data = vec![0u8; 16];
        assert!(get_dot_info(&data, 0, 0, 9).is_err());
        assert!(get_dot_info(&data, 0, 0, 8).is_ok());
    }

    #[test]
    fn looks_like_0x0c_container_requires_marker_absence_and_tag_byte() {
        let mut data = vec![0u8; 10];
        data[9] = 0x0C;
        data[0..4].copy_from_slice(&5u32.to_be_bytes());
        assert!(looks_like_0x0c_container(&data));

        let mut marker_data = data.clone();
        marker_data[4] = 0xAA;
        assert!(!looks_like_0x0c_container(&marker_data));
    }
}
