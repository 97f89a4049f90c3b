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

//! Component C1: provided-primitive adapters (AES-CBC, LZO1X, zstd, and the
//! `image`-crate backed JPEG/GIF/WebP codecs).
//!
//! Every function here wraps a third-party crate's fallible API and maps
//! its error type into [`DecodeError::PrimitiveFailure`], so format modules
//! never need to know which underlying library produced a failure.

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use image::{imageops::FilterType, AnimationDecoder, DynamicImage};

use crate::DecodeError;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Fixed key used by every Divoom container variant that employs AES-CBC.
const AES_KEY: &[u8; 16] = b"78hrey23y28ogs89";
/// Fixed IV, likewise constant across the device fleet.
const AES_IV: &[u8; 16] = b"1234567890123456";

/// Decrypts `data` with AES-128-CBC under the fixed device key/IV. No
/// padding is stripped: the ciphertext is expected to already be a multiple
/// of the block size, and the caller interprets trailing bytes itself.
///
/// # Errors
///
/// Returns [`DecodeError::PrimitiveFailure`] if `data.len()` isn't a
/// multiple of 16.
pub fn decrypt_aes_cbc(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut buf = data.to_vec();
    let decryptor = Aes128CbcDec::new(AES_KEY.into(), AES_IV.into());
    let len = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| DecodeError::PrimitiveFailure(format!("AES-CBC decrypt failed: {e}")))?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// Decompresses an LZO1X-compressed block given the exact expected output
/// length (the container always carries it alongside the payload).
///
/// # Errors
///
/// Returns [`DecodeError::PrimitiveFailure`] on a malformed LZO stream.
pub fn lzo_decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, DecodeError> {
    let lzo = minilzo_rs::LZO::init()
        .map_err(|e| DecodeError::PrimitiveFailure(format!("LZO init failed: {e:?}")))?;
    lzo.decompress_safe(data, expected_len)
        .map_err(|e| DecodeError::PrimitiveFailure(format!("LZO1X decompress failed: {e:?}")))
}

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Locates the zstd frame magic within `data` and decompresses everything
/// from that offset onward.
///
/// # Errors
///
/// Returns [`DecodeError::PrimitiveFailure`] if the magic isn't present or
/// the located payload isn't a valid zstd stream.
pub fn zstd_find_and_decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let offset = data
        .windows(ZSTD_MAGIC.len())
        .position(|w| w == ZSTD_MAGIC)
        .ok_or_else(|| DecodeError::PrimitiveFailure("zstd magic not found".to_string()))?;
    zstd::stream::decode_all(&data[offset..])
        .map_err(|e| DecodeError::PrimitiveFailure(format!("zstd decompress failed: {e}")))
}

/// Decodes a single JPEG image to `(width, height, rgb_bytes)`.
///
/// # Errors
///
/// Returns [`DecodeError::PrimitiveFailure`] on a malformed JPEG stream.
pub fn decode_jpeg(data: &[u8]) -> Result<(usize, usize, Vec<u8>), DecodeError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| DecodeError::PrimitiveFailure(format!("JPEG decode failed: {e}")))?;
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    Ok((w, h, rgb.into_raw()))
}

/// Nearest-neighbor resizes a packed RGB buffer from `(w, h)` to
/// `(new_w, new_h)`. A no-op when the dimensions already match.
#[must_use]
pub fn resize_nearest_rgb(rgb: &[u8], w: u32, h: u32, new_w: u32, new_h: u32) -> Vec<u8> {
    if w == new_w && h == new_h {
        return rgb.to_vec();
    }
    let buf = image::RgbImage::from_raw(w, h, rgb.to_vec())
        .expect("buffer sized exactly w*h*3 by construction");
    image::imageops::resize(&buf, new_w, new_h, FilterType::Nearest).into_raw()
}

/// Composites an RGBA animation frame (as decoded by the `image` crate)
/// onto a running opaque backdrop, blending per-pixel by the frame's own
/// alpha channel — mirroring `Image.paste(rgba, (0, 0), rgba)` over a white
/// canvas. The backdrop is mutated in place and also returned as the RGB
/// view consumers want.
fn composite_over(backdrop_rgb: &mut [u8], frame_rgba: &image::RgbaImage) {
    for (i, px) in frame_rgba.pixels().enumerate() {
        let [r, g, b, a] = px.0;
        if a == 0 {
            continue;
        }
        let off = i * 3;
        if a == 255 {
            backdrop_rgb[off] = r;
            backdrop_rgb[off + 1] = g;
            backdrop_rgb[off + 2] = b;
            continue;
        }
        let a = f32::from(a) / 255.0;
        for (c, src) in [r, g, b].into_iter().enumerate() {
            let dst = backdrop_rgb[off + c];
            let blended = f32::from(src) * a + f32::from(dst) * (1.0 - a);
            backdrop_rgb[off + c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Decodes every frame of an animated GIF or WebP stream, compositing each
/// frame over a white backdrop and resizing to `(target_w, target_h)` with
/// nearest-neighbor sampling if the intrinsic size differs.
///
/// # Errors
///
/// Returns [`DecodeError::PrimitiveFailure`] if the container can't be
/// parsed as the requested format.
pub fn decode_animated_frames(
    data: &[u8],
    format: image::ImageFormat,
    target_w: usize,
    target_h: usize,
) -> Result<Vec<Vec<u8>>, DecodeError> {
    let frames = match format {
        image::ImageFormat::Gif => {
            let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(data))
                .map_err(|e| DecodeError::PrimitiveFailure(format!("GIF decode failed: {e}")))?;
            decoder.into_frames().collect_frames()
        }
        image::ImageFormat::WebP => {
            let decoder = image::codecs::webp::WebPDecoder::new(std::io::Cursor::new(data))
                .map_err(|e| DecodeError::PrimitiveFailure(format!("WebP decode failed: {e}")))?;
            decoder.into_frames().collect_frames()
        }
        other => {
            return Err(DecodeError::PrimitiveFailure(format!(
                "unsupported animated format: {other:?}"
            )))
        }
    }
    .map_err(|e| DecodeError::PrimitiveFailure(format!("animation frame decode failed: {e}")))?;

    let Some(first) = frames.first() else {
        return Err(DecodeError::PrimitiveFailure(
            "animation container has no frames".to_string(),
        ));
    };
    let (canvas_w, canvas_h) = (first.buffer().width(), first.buffer().height());

    let mut backdrop = vec![255u8; canvas_w as usize * canvas_h as usize * 3];
    let mut out = Vec::with_capacity(frames.len());
    for frame in &frames {
        composite_over(&mut backdrop, frame.buffer());
        let rgb = if canvas_w as usize == target_w && canvas_h as usize == target_h {
            backdrop.clone()
        } else {
            resize_nearest_rgb(
                &backdrop,
                canvas_w,
                canvas_h,
                target_w as u32,
                target_h as u32,
            )
        };
        out.push(rgb);
    }
    Ok(out)
}

/// Converts a [`DynamicImage`] to packed RGB bytes, for callers that
/// already hold a decoded image (e.g. the last-resort sniff path).
#[must_use]
pub fn dynamic_image_to_rgb(img: &DynamicImage) -> (usize, usize, Vec<u8>) {
    let rgb = img.to_rgb8();
    (rgb.width() as usize, rgb.height() as usize, rgb.into_raw())
}
