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

//! Component C5: top-level container dispatch. Reads the leading format
//! byte and routes the remaining bytes to the matching per-format decoder.

use crate::{
    anim_multi, anim_multi64, anim_single, embedded_image, jpeg_anim, pic_multi, zstd_raw,
    Animation, DecodeError,
};

/// Format discriminant byte, mirroring the original decimal `FileFormat`
/// enum used on the device/firmware side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FormatTag {
    PicMultiple = 0x11,
    AnimSingle = 0x09,
    AnimMultiple = 0x12,
    AnimMultiple64 = 0x1A,
    AnimFormat0x1F = 0x1F,
    AnimFormat0x29 = 0x29,
    AnimContainerZstd = 0x2A,
    AnimEmbeddedImage = 0x2B,
}

impl FormatTag {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x11 => Some(Self::PicMultiple),
            0x09 => Some(Self::AnimSingle),
            0x12 => Some(Self::AnimMultiple),
            0x1A => Some(Self::AnimMultiple64),
            0x1F => Some(Self::AnimFormat0x1F),
            0x29 => Some(Self::AnimFormat0x29),
            0x2A => Some(Self::AnimContainerZstd),
            0x2B => Some(Self::AnimEmbeddedImage),
            _ => None,
        }
    }
}

/// Dispatches on the first byte of `data` and decodes the remainder.
pub fn decode(data: &[u8], trace: bool) -> Result<Animation, DecodeError> {
    let (&format_byte, body) = data.split_first().ok_or(DecodeError::TruncatedHeader)?;
    let format = FormatTag::from_byte(format_byte).ok_or(DecodeError::UnsupportedFormat(format_byte))?;

    #[cfg(feature = "debug-logging")]
    log::info!("dispatching format byte 0x{format_byte:02X} -> {format:?}");

    match format {
        FormatTag::AnimSingle => anim_single::decode(body),
        FormatTag::AnimMultiple => anim_multi::decode(body),
        FormatTag::PicMultiple => pic_multi::decode(body),
        FormatTag::AnimMultiple64 => anim_multi64::decode(body, trace),
        FormatTag::AnimFormat0x1F => jpeg_anim::decode_0x1f(body),
        FormatTag::AnimFormat0x29 => jpeg_anim::decode_0x29(body),
        FormatTag::AnimContainerZstd => zstd_raw::decode(body),
        FormatTag::AnimEmbeddedImage => embedded_image::decode(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_byte_is_unsupported() {
        assert_eq!(FormatTag::from_byte(0x42), None);
    }

    #[test]
    fn known_bytes_round_trip_through_from_byte() {
        for tag in [
            FormatTag::PicMultiple,
            FormatTag::AnimSingle,
            FormatTag::AnimMultiple,
            FormatTag::AnimMultiple64,
            FormatTag::AnimFormat0x1F,
            FormatTag::AnimFormat0x29,
            FormatTag::AnimContainerZstd,
            FormatTag::AnimEmbeddedImage,
        ] {
            assert_eq!(FormatTag::from_byte(tag as u8), Some(tag));
        }
    }
}
