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

//! Component C7: the HierPalette quad-tree pixel decoder used by the
//! `0x1A` container's `0x13`/`0x15` frame encodings.
//!
//! Each 64x64 quadrant is encoded as a tree of tiles (64 -> 32 -> 16 -> 8)
//! where a per-tile control byte says whether the tile is a terminal leaf
//! painted directly from the inherited palette map, a terminal leaf with
//! its own palette-restriction mask, or an interior node that recurses into
//! four same-sized children.

use crate::bitstream::read_values;
use crate::{DecodeError, Frame, Rgb};

/// `ceil(log2(num_colors))`, with 0 and 1 colors both needing zero bits.
#[must_use]
pub fn bits_per_pixel_from_count(num_colors: usize) -> u32 {
    if num_colors <= 1 {
        return 0;
    }
    let mut bits = 1u32;
    while (1usize << bits) < num_colors {
        bits += 1;
    }
    bits
}

/// A parsed `0x13`/`0x15` frame, ready to paint its quadrant(s).
pub struct HierPaletteFrame<'a> {
    pub palette: Vec<Rgb>,
    pixel: &'a [u8],
    width: usize,
    height: usize,
    base_bpp: u32,
    out: Vec<Rgb>,
    trace: bool,
}

impl<'a> HierPaletteFrame<'a> {
    /// Parses the palette and locates the pixel bitstream within
    /// `frame_data`, which must start with the `0xAA` frame marker.
    ///
    /// `previous_palette` is consumed (appended to) only when this frame's
    /// encrypt type is `0x13`; any other type (notably `0x15`) replaces the
    /// palette wholesale.
    pub fn parse(
        frame_data: &'a [u8],
        width: usize,
        height: usize,
        previous_palette: &[Rgb],
        trace: bool,
    ) -> Result<Self, DecodeError> {
        if frame_data.len() < 8 {
            return Err(DecodeError::TruncatedPayload {
                expected: 8,
                actual: frame_data.len(),
            });
        }
        if frame_data[0] != 0xAA {
            return Err(DecodeError::BadMarker);
        }
        let encrypt_type = frame_data[5] & 0x7F;
        let palette_size = u16::from(frame_data[6]) | (u16::from(frame_data[7]) << 8);
        let palette_size = palette_size as usize;
        let palette_start = 8usize;

        let mut palette = if encrypt_type == 0x13 {
            previous_palette.to_vec()
        } else {
            Vec::new()
        };
        for i in 0..palette_size {
            let off = palette_start + i * 3;
            if off + 2 >= frame_data.len() {
                return Err(DecodeError::PaletteOutOfRange {
                    offset: off,
                    len: frame_data.len(),
                });
            }
            palette.push(Rgb::new(
                frame_data[off],
                frame_data[off + 1],
                frame_data[off + 2],
            ));
        }
        let pixel_data_offset = palette_start + palette_size * 3;
        let pixel = frame_data.get(pixel_data_offset..).unwrap_or(&[]);
        let base_bpp = bits_per_pixel_from_count(palette.len());

        Ok(Self {
            palette,
            pixel,
            width,
            height,
            base_bpp,
            out: vec![Rgb::BLACK; width * height],
            trace,
        })
    }

    fn palette_at(&self, idx: usize) -> Rgb {
        self.palette.get(idx).copied().unwrap_or(Rgb::BLACK)
    }

    fn mask_selected(&self, ptr: usize, n: usize) -> Result<Vec<usize>, DecodeError> {
        let mask_bytes = (n + 7) / 8;
        if ptr + mask_bytes > self.pixel.len() {
            return Err(DecodeError::PartialFrame);
        }
        let mut selected = Vec::new();
        for i in 0..n {
            if (self.pixel[ptr + (i >> 3)] >> (i & 7)) & 1 != 0 {
                selected.push(i);
            }
        }
        Ok(selected)
    }

    fn mask_mapped(&self, ptr: usize, n: usize, parent_map: &[usize]) -> Result<Vec<usize>, DecodeError> {
        let mask_bytes = (n + 7) / 8;
        if ptr + mask_bytes > self.pixel.len() {
            return Err(DecodeError::PartialFrame);
        }
        let mut mapping = Vec::new();
        for i in 0..n {
            if (self.pixel[ptr + (i >> 3)] >> (i & 7)) & 1 != 0 {
                if let Some(&v) = parent_map.get(i) {
                    mapping.push(v);
                }
            }
        }
        Ok(mapping)
    }

    /// Reads the 1- or 2-byte tile header at `offset`: returns
    /// `(ctrl, n_if_present, ptr_after_header)`.
    fn read_header(&self, offset: usize) -> Result<(u8, usize, usize), DecodeError> {
        if offset + 1 >= self.pixel.len() {
            return Err(DecodeError::PartialFrame);
        }
        let ctrl = self.pixel[offset];
        if ctrl == 0 {
            Ok((ctrl, 0, offset + 1))
        } else {
            let raw = self.pixel[offset + 1];
            let n = if raw == 0 { 0x100 } else { usize::from(raw) };
            Ok((ctrl, n, offset + 2))
        }
    }

    /// `fallback` is the palette-index-into-`palette` substitute used when a
    /// decoded bitstream value falls outside `0..palette.len()`. The
    /// `ctrl==2` terminal case at this level clamps to `selected[0]` (the
    /// first mask-selected index) rather than a literal `0`, matching the
    /// reference decoder's `_decode_fix_64` exactly; other callers pass `0`.
    fn paint_64(
        &mut self,
        x0: usize,
        y0: usize,
        bpp: u32,
        ptr: usize,
        palette: &[usize],
        fallback: usize,
    ) -> Result<usize, DecodeError> {
        let read = read_values(self.pixel, ptr, 64 * 64, bpp);
        let w = self.width;
        let mut it = read.values.into_iter();
        for br in 0..8 {
            for bc in 0..8 {
                for row in 0..8 {
                    let y = y0 + br * 8 + row;
                    let base = y * w + (x0 + bc * 8);
                    for col in 0..8 {
                        let idx = it.next().unwrap() as usize;
                        let pal_index = palette.get(idx).copied().unwrap_or(fallback);
                        self.out[base + col] = self.palette_at(pal_index);
                    }
                }
            }
        }
        Ok(read.next_pos)
    }

    fn paint_32(&mut self, x0: usize, y0: usize, bpp: u32, ptr: usize, palette: &[usize]) -> Result<usize, DecodeError> {
        let read = read_values(self.pixel, ptr, 32 * 32, bpp);
        let w = self.width;
        let mut it = read.values.into_iter();
        for br in 0..4 {
            for bc in 0..4 {
                for row in 0..8 {
                    let y = y0 + br * 8 + row;
                    let base = y * w + (x0 + bc * 8);
                    for col in 0..8 {
                        let idx = it.next().unwrap() as usize;
                        let pal_index = palette.get(idx).copied().unwrap_or(0);
                        self.out[base + col] = self.palette_at(pal_index);
                    }
                }
            }
        }
        Ok(read.next_pos)
    }

    fn paint_16(&mut self, x0: usize, y0: usize, bpp: u32, ptr: usize, palette: &[usize]) -> Result<usize, DecodeError> {
        let read = read_values(self.pixel, ptr, 16 * 16, bpp);
        let w = self.width;
        let mut it = read.values.into_iter();
        for row_block in 0..2 {
            for band in 0..2 {
                let x_band = x0 + band * 8;
                for row in 0..8 {
                    let y = y0 + row_block * 8 + row;
                    let base = y * w + x_band;
                    for col in 0..8 {
                        let idx = it.next().unwrap() as usize;
                        let pal_index = palette.get(idx).copied().unwrap_or(0);
                        self.out[base + col] = self.palette_at(pal_index);
                    }
                }
            }
        }
        Ok(read.next_pos)
    }

    fn paint_8(&mut self, x0: usize, y0: usize, bpp: u32, ptr: usize, palette: &[usize]) -> Result<usize, DecodeError> {
        let read = read_values(self.pixel, ptr, 8 * 8, bpp);
        let w = self.width;
        let mut it = read.values.into_iter();
        for row in 0..8 {
            let base = (y0 + row) * w + x0;
            for col in 0..8 {
                let idx = it.next().unwrap() as usize;
                let pal_index = palette.get(idx).copied().unwrap_or(0);
                self.out[base + col] = self.palette_at(pal_index);
            }
        }
        Ok(read.next_pos)
    }

    fn decode_fix_64(&mut self, offset: usize, xq: usize, yq: usize) -> Result<usize, DecodeError> {
        let x0 = xq * 64;
        let y0 = yq * 64;
        let (ctrl, n, ptr) = self.read_header(offset)?;
        #[cfg(feature = "debug-logging")]
        if self.trace {
            log::trace!("[64] off={offset} ctrl={ctrl} ptr={ptr}");
        }
        match ctrl {
            2 => {
                let selected = self.mask_selected(ptr, n)?;
                let fallback = selected.first().copied().unwrap_or(0);
                let ptr = ptr + (n + 7) / 8;
                let bpp = bits_per_pixel_from_count(selected.len());
                let end = self.paint_64(x0, y0, bpp, ptr, &selected, fallback)?;
                Ok(end - offset)
            }
            0 => {
                let bpp = self.base_bpp;
                let identity: Vec<usize> = (0..self.palette.len().max(1)).collect();
                let end = self.paint_64(x0, y0, bpp, ptr, &identity, 0)?;
                Ok(end - offset)
            }
            _ => {
                let mapping = self.mask_selected(ptr, n)?;
                let mask_bytes = (n + 7) / 8;
                let base = ptr + mask_bytes;
                let mut consumed = 0usize;
                consumed += self.decode_fix_32(base + consumed, xq * 2, yq * 2, &mapping)?;
                consumed += self.decode_fix_32(base + consumed, xq * 2 + 1, yq * 2, &mapping)?;
                consumed += self.decode_fix_32(base + consumed, xq * 2, yq * 2 + 1, &mapping)?;
                consumed += self.decode_fix_32(base + consumed, xq * 2 + 1, yq * 2 + 1, &mapping)?;
                Ok(2 + mask_bytes + consumed)
            }
        }
    }

    fn decode_fix_32(&mut self, offset: usize, xq: usize, yq: usize, parent_map: &[usize]) -> Result<usize, DecodeError> {
        let x0 = xq * 32;
        let y0 = yq * 32;
        let (ctrl, n, ptr) = self.read_header(offset)?;
        match ctrl {
            2 => {
                let raw_selected = self.mask_mapped(ptr, n, parent_map)?;
                let selected = if raw_selected.is_empty() { vec![0] } else { raw_selected };
                let ptr = ptr + (n + 7) / 8;
                let bpp = bits_per_pixel_from_count(selected.len());
                let end = self.paint_32(x0, y0, bpp, ptr, &selected)?;
                Ok(end - offset)
            }
            0 => {
                let bpp = bits_per_pixel_from_count(if parent_map.is_empty() { 1 } else { parent_map.len() });
                let end = self.paint_32(x0, y0, bpp, ptr, parent_map)?;
                Ok(end - offset)
            }
            _ => {
                let raw_mapping = self.mask_mapped(ptr, n, parent_map)?;
                let mapping = if raw_mapping.is_empty() { vec![0] } else { raw_mapping };
                let mask_bytes = (n + 7) / 8;
                let base = ptr + mask_bytes;
                let mut consumed = 0usize;
                consumed += self.decode_fix_16(base + consumed, xq * 2, yq * 2, &mapping)?;
                consumed += self.decode_fix_16(base + consumed, xq * 2 + 1, yq * 2, &mapping)?;
                consumed += self.decode_fix_16(base + consumed, xq * 2, yq * 2 + 1, &mapping)?;
                consumed += self.decode_fix_16(base + consumed, xq * 2 + 1, yq * 2 + 1, &mapping)?;
                Ok(2 + mask_bytes + consumed)
            }
        }
    }

    fn decode_fix_16(&mut self, offset: usize, xq: usize, yq: usize, parent_map: &[usize]) -> Result<usize, DecodeError> {
        let x0 = xq * 16;
        let y0 = yq * 16;
        let (ctrl, n, ptr) = self.read_header(offset)?;
        match ctrl {
            2 => {
                let raw_selected = self.mask_mapped(ptr, n, parent_map)?;
                let selected = if raw_selected.is_empty() { vec![0] } else { raw_selected };
                let ptr = ptr + (n + 7) / 8;
                let bpp = bits_per_pixel_from_count(selected.len());
                let end = self.paint_16(x0, y0, bpp, ptr, &selected)?;
                Ok(end - offset)
            }
            0 => {
                let bpp = bits_per_pixel_from_count(if parent_map.is_empty() { 1 } else { parent_map.len() });
                let end = self.paint_16(x0, y0, bpp, ptr, parent_map)?;
                Ok(end - offset)
            }
            _ => {
                let raw_mapping = self.mask_mapped(ptr, n, parent_map)?;
                let mapping = if raw_mapping.is_empty() { vec![0] } else { raw_mapping };
                let mask_bytes = (n + 7) / 8;
                let base = ptr + mask_bytes;
                let mut consumed = 0usize;
                consumed += self.decode_fix_8(base + consumed, xq * 2, yq * 2, &mapping)?;
                consumed += self.decode_fix_8(base + consumed, xq * 2 + 1, yq * 2, &mapping)?;
                consumed += self.decode_fix_8(base + consumed, xq * 2, yq * 2 + 1, &mapping)?;
                consumed += self.decode_fix_8(base + consumed, xq * 2 + 1, yq * 2 + 1, &mapping)?;
                Ok(2 + mask_bytes + consumed)
            }
        }
    }

    fn decode_fix_8(&mut self, offset: usize, xq: usize, yq: usize, parent_map: &[usize]) -> Result<usize, DecodeError> {
        let x0 = xq * 8;
        let y0 = yq * 8;
        if offset >= self.pixel.len() {
            return Err(DecodeError::PartialFrame);
        }
        let first = self.pixel[offset];
        if first & 0x80 != 0 {
            let n = usize::from(first & 0x7F);
            let ptr = offset + 1;
            let raw_selected = self.mask_mapped(ptr, n, parent_map)?;
            let selected = if raw_selected.is_empty() { vec![0] } else { raw_selected };
            let ptr = ptr + (n + 7) / 8;
            let bpp = bits_per_pixel_from_count(selected.len());
            let end = self.paint_8(x0, y0, bpp, ptr, &selected)?;
            Ok(end - offset)
        } else {
            let bpp = bits_per_pixel_from_count(parent_map.len());
            let ptr = offset + 1;
            let end = self.paint_8(x0, y0, bpp, ptr, parent_map)?;
            Ok(end - offset)
        }
    }

    /// Decodes the top-left quadrant (and, for 128x128 frames, the
    /// remaining three quadrants in top-right/bottom-left/bottom-right
    /// order) and returns the assembled frame.
    pub fn decode_frame(mut self) -> Result<Frame, DecodeError> {
        let mut off = self.decode_fix_64(0, 0, 0)?;
        if self.width == 128 && self.height == 128 {
            off += self.decode_fix_64(off, 1, 0)?;
            off += self.decode_fix_64(off, 0, 1)?;
            off += self.decode_fix_64(off, 1, 1)?;
        }
        let _ = off;
        let mut bytes = Vec::with_capacity(self.width * self.height * 3);
        for px in &self.out {
            bytes.push(px.r);
            bytes.push(px.g);
            bytes.push(px.b);
        }
        Frame::from_rgb_bytes(self.width, self.height, bytes)
    }
}
