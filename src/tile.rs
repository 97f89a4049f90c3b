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

//! Tile-major to scanline pixel remapping (component C2).
//!
//! Frames for [`AnimSingleDecoder`][crate::anim_single],
//! [`AnimMultiDecoder`][crate::anim_multi] and the direct 64x64/`0x0C` path
//! are stored as a sequence of 16x16 tiles rather than plain scanlines. This
//! module walks that tile-major byte stream and writes each pixel to its
//! final row-major position.
//!
//! The grid wraps its `grid_x` counter against `row_count`, not
//! `column_count`. That looks backwards, but it matches the device/original
//! decoder exactly, so it is preserved here rather than "fixed".

use crate::Frame;

/// Reassembles `frame_size = row_count*column_count*16*16*3` bytes of
/// tile-major RGB data into a [`Frame`] of `width = column_count*16` by
/// `height = row_count*16`.
///
/// Trailing bytes beyond `frame_size` are ignored; a buffer shorter than
/// `frame_size` is read only up to its own length (remaining pixels stay
/// black), matching the source's tolerance for truncated tile data.
#[must_use]
pub fn assemble(frame_data: &[u8], row_count: u8, column_count: u8) -> Frame {
    let row_count = usize::from(row_count);
    let column_count = usize::from(column_count);
    let width = column_count * 16;
    let height = row_count * 16;
    let frame_size = row_count * column_count * 16 * 16 * 3;

    let mut out = vec![0u8; width * height * 3];

    let mut pos = 0usize;
    let mut x = 0usize;
    let mut y = 0usize;
    let mut grid_x = 0usize;
    let mut grid_y = 0usize;

    while pos < frame_size && pos + 3 <= frame_data.len() {
        let real_x = x + grid_x * 16;
        let real_y = y + grid_y * 16;

        if real_x < width && real_y < height {
            let dst = (real_y * width + real_x) * 3;
            out[dst] = frame_data[pos];
            out[dst + 1] = frame_data[pos + 1];
            out[dst + 2] = frame_data[pos + 2];
        }

        x += 1;
        pos += 3;
        if (pos / 3) % 16 == 0 {
            x = 0;
            y += 1;
        }

        if (pos / 3) % 256 == 0 {
            x = 0;
            y = 0;
            grid_x += 1;

            if grid_x == row_count {
                grid_x = 0;
                grid_y += 1;
            }
        }
    }

    Frame::from_rgb_bytes(width, height, out).expect("buffer sized exactly width*height*3")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tile_is_identity() {
        let mut data = vec![0u8; 256 * 3];
        for i in 0..256 {
            data[i * 3] = (i % 256) as u8;
        }
        let frame = assemble(&data, 1, 1);
        assert_eq!(frame.width(), 16);
        assert_eq!(frame.height(), 16);
        assert_eq!(frame.get(0, 0).r, 0);
        assert_eq!(frame.get(15, 0).r, 15);
        assert_eq!(frame.get(0, 1).r, 16);
    }

    #[test]
    fn two_by_two_grid_places_tiles_by_row_count_modulus() {
        // row_count=2, column_count=2: grid_x wraps at row_count (2),
        // matching the quirk preserved from the original decoder.
        let mut data = vec![0u8; 2 * 2 * 256 * 3];
        for tile in 0..4 {
            for i in 0..256 {
                let pos = (tile * 256 + i) * 3;
                data[pos] = tile as u8;
            }
        }
        let frame = assemble(&data, 2, 2);
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 32);
        // Tile 0 -> grid_x=0, grid_y=0 -> top-left.
        assert_eq!(frame.get(0, 0).r, 0);
        // Tile 1 -> grid_x=1, grid_y=0 -> top-right (16..32, 0..16).
        assert_eq!(frame.get(16, 0).r, 1);
        // Tile 2 -> grid_x wraps to 0 since row_count==2, grid_y=1 -> bottom-left.
        assert_eq!(frame.get(0, 16).r, 2);
        // Tile 3 -> grid_x=1, grid_y=1 -> bottom-right.
        assert_eq!(frame.get(16, 16).r, 3);
    }

    #[test]
    fn truncated_input_leaves_remainder_black() {
        let data = vec![0xAAu8; 10 * 3];
        let frame = assemble(&data, 1, 1);
        assert_eq!(frame.get(9, 0).r, 0xAA);
        assert_eq!(frame.get(10, 0).r, 0);
    }
}
