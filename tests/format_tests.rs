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

//! End-to-end container tests, covering the eight scenarios (S1-S8) from the
//! testable-properties section: one per container format, plus the
//! malformed-frame recovery contract. Fixtures are hand-assembled rather than
//! pulled from real device captures, using the same primitive crates the
//! decoder itself depends on to produce valid ciphertext/compressed payloads.

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder};

const AES_KEY: &[u8; 16] = b"78hrey23y28ogs89";
const AES_IV: &[u8; 16] = b"1234567890123456";

fn aes_encrypt(plaintext: &[u8]) -> Vec<u8> {
    let enc = cbc::Encryptor::<Aes128>::new(AES_KEY.into(), AES_IV.into());
    enc.encrypt_padded_vec_mut::<NoPadding>(plaintext)
}

fn lzo_compress(plaintext: &[u8]) -> Vec<u8> {
    let mut lzo = minilzo_rs::LZO::init().unwrap();
    lzo.compress(plaintext).unwrap()
}

fn zstd_compress(plaintext: &[u8]) -> Vec<u8> {
    zstd::bulk::compress(plaintext, 3).unwrap()
}

/// Packs `values` (each `bits` wide) LSB-first into bytes, mirroring the
/// inverse of `bitstream::read_values`.
fn pack_lsb(values: &[u32], bits: u32) -> Vec<u8> {
    if bits == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cur = 0u8;
    let mut bit = 0u32;
    for &v in values {
        for i in 0..bits {
            let b = ((v >> i) & 1) as u8;
            cur |= b << bit;
            bit += 1;
            if bit == 8 {
                out.push(cur);
                cur = 0;
                bit = 0;
            }
        }
    }
    if bit != 0 {
        out.push(cur);
    }
    out
}

fn solid_rgb(width: usize, height: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height * 3);
    for _ in 0..width * height {
        out.push(r);
        out.push(g);
        out.push(b);
    }
    out
}

#[test]
fn s1_anim_single_16x16_solid_red() {
    let plaintext = solid_rgb(16, 16, 255, 0, 0);
    let encrypted = aes_encrypt(&plaintext);

    let mut data = vec![0x09u8, 0xAB, 0x00, 0x28];
    data.extend_from_slice(&encrypted);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 1);
    assert_eq!(anim.speed_ms, 40);
    assert_eq!(anim.width, 16);
    assert_eq!(anim.height, 16);
    let frame = anim.get_frame_one_indexed(1).unwrap();
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(frame.get(x, y), pixelbean::Rgb::new(255, 0, 0));
        }
    }
}

#[test]
fn s2_anim_multi_32x32_two_frames() {
    let frame0 = solid_rgb(32, 32, 0, 255, 0);
    let frame1 = solid_rgb(32, 32, 0, 0, 255);
    let c0 = lzo_compress(&frame0);
    let c1 = lzo_compress(&frame1);

    let mut plain = Vec::new();
    plain.extend_from_slice(&(c0.len() as u32).to_be_bytes());
    plain.extend_from_slice(&c0);
    plain.extend_from_slice(&(c1.len() as u32).to_be_bytes());
    plain.extend_from_slice(&c1);
    // AES-CBC needs block-aligned input; pad with zero blocks (decoder reads
    // exactly `total_frames` frames and never looks past the second one).
    while plain.len() % 16 != 0 {
        plain.push(0);
    }
    let encrypted = aes_encrypt(&plain);

    let mut data = vec![0x12u8, 2, 0, 100, 2, 2];
    data.extend_from_slice(&encrypted);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 2);
    assert_eq!(anim.speed_ms, 100);
    assert_eq!(anim.width, 32);
    assert_eq!(anim.height, 32);
    assert_eq!(
        anim.get_frame_one_indexed(1).unwrap().get(0, 0),
        pixelbean::Rgb::new(0, 255, 0)
    );
    assert_eq!(
        anim.get_frame_one_indexed(2).unwrap().get(0, 0),
        pixelbean::Rgb::new(0, 0, 255)
    );
}

#[test]
fn s3_pic_multi_64x64_all_white() {
    let plaintext = solid_rgb(64, 64, 255, 255, 255);
    let compressed = lzo_compress(&plaintext);
    let mut to_encrypt = compressed.clone();
    while to_encrypt.len() % 16 != 0 {
        to_encrypt.push(0);
    }
    let encrypted = aes_encrypt(&to_encrypt);

    let mut data = vec![0x11u8, 4, 4];
    data.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    data.extend_from_slice(&encrypted);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 1);
    assert_eq!(anim.speed_ms, 40);
    assert_eq!(anim.width, 64);
    let frame = anim.get_frame_one_indexed(1).unwrap();
    for y in (0..64).step_by(9) {
        for x in (0..64).step_by(9) {
            assert_eq!(frame.get(x, y), pixelbean::Rgb::new(255, 255, 255));
        }
    }
}

/// Builds one `0xAA`-marked HierPalette frame (`frame_data` only, i.e. the
/// bytes starting at the marker, not including the outer 4-byte skip).
/// `quadrant_indices` gives the constant palette index painted across each
/// of the four 64x64 quadrants (only the first is used for 64x64 frames).
fn build_hier_frame(encrypt_type: u8, palette: &[(u8, u8, u8)], quadrant_indices: &[u32]) -> Vec<u8> {
    let bpp = ceil_log2(palette.len());
    let mut quadrant_bytes = Vec::new();
    for &idx in quadrant_indices {
        quadrant_bytes.push(0u8); // ctrl = 0 (terminal, inherited mapping)
        let values = vec![idx; 64 * 64];
        quadrant_bytes.extend(pack_lsb(&values, bpp));
    }

    let header_len = 8;
    let palette_len = palette.len() * 3;
    let payload_len = header_len + palette_len + quadrant_bytes.len();

    let mut frame_data = vec![0u8; header_len];
    frame_data[0] = 0xAA;
    frame_data[1] = (payload_len & 0xFF) as u8;
    frame_data[2] = ((payload_len >> 8) & 0xFF) as u8;
    frame_data[3] = 0;
    frame_data[4] = 0;
    frame_data[5] = encrypt_type;
    frame_data[6] = (palette.len() & 0xFF) as u8;
    frame_data[7] = ((palette.len() >> 8) & 0xFF) as u8;
    for &(r, g, b) in palette {
        frame_data.push(r);
        frame_data.push(g);
        frame_data.push(b);
    }
    frame_data.extend_from_slice(&quadrant_bytes);
    frame_data
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        return 0;
    }
    let mut bits = 1u32;
    while (1usize << bits) < n {
        bits += 1;
    }
    bits
}

fn wrap_marker_frame(frame_data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8, 0, 0, 0]; // 4-byte outer skip, unused by the decoder
    out.extend_from_slice(frame_data);
    out
}

#[test]
fn s4_hier_palette_128x128_two_frames_quadrant_swap() {
    let palette = [(10, 10, 10), (20, 20, 20), (30, 30, 30), (40, 40, 40)];
    let frame0 = build_hier_frame(0x15, &palette, &[0, 1, 1, 1]);
    let frame1 = build_hier_frame(0x15, &palette, &[1, 0, 0, 0]);

    let mut body = vec![2u8, 0, 100, 8, 8];
    body.extend_from_slice(&wrap_marker_frame(&frame0));
    body.extend_from_slice(&wrap_marker_frame(&frame1));

    let mut data = vec![0x1Au8];
    data.extend_from_slice(&body);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 2);
    assert_eq!(anim.width, 128);
    assert_eq!(anim.height, 128);

    let f0 = anim.get_frame_one_indexed(1).unwrap();
    assert_eq!(f0.get(0, 0), pixelbean::Rgb::new(10, 10, 10)); // top-left quadrant: index 0
    assert_eq!(f0.get(127, 0), pixelbean::Rgb::new(20, 20, 20)); // top-right quadrant: index 1
    assert_eq!(f0.get(0, 127), pixelbean::Rgb::new(20, 20, 20)); // bottom-left quadrant: index 1

    let f1 = anim.get_frame_one_indexed(2).unwrap();
    assert_eq!(f1.get(0, 0), pixelbean::Rgb::new(20, 20, 20));
    assert_eq!(f1.get(127, 0), pixelbean::Rgb::new(10, 10, 10));
}

#[test]
fn s5_hier_palette_delta_append_extends_prior_palette() {
    let base_palette = [(1, 1, 1), (2, 2, 2)];
    let frame0 = build_hier_frame(0x15, &base_palette, &[0]);

    // Delta frame: appends two colors to the carried-over palette, then
    // paints using index 3 (the second of the two newly appended colors).
    let delta_colors = [(3, 3, 3), (4, 4, 4)];
    let bpp_after_delta = ceil_log2(base_palette.len() + delta_colors.len());
    let mut quadrant_bytes = vec![0u8];
    quadrant_bytes.extend(pack_lsb(&vec![3u32; 64 * 64], bpp_after_delta));
    let header_len = 8;
    let palette_len = delta_colors.len() * 3;
    let payload_len = header_len + palette_len + quadrant_bytes.len();
    let mut frame1 = vec![0u8; header_len];
    frame1[0] = 0xAA;
    frame1[1] = (payload_len & 0xFF) as u8;
    frame1[2] = ((payload_len >> 8) & 0xFF) as u8;
    frame1[5] = 0x13;
    frame1[6] = (delta_colors.len() & 0xFF) as u8;
    frame1[7] = 0;
    for &(r, g, b) in &delta_colors {
        frame1.push(r);
        frame1.push(g);
        frame1.push(b);
    }
    frame1.extend_from_slice(&quadrant_bytes);

    let mut body = vec![2u8, 0, 50, 4, 4]; // 64x64
    body.extend_from_slice(&wrap_marker_frame(&frame0));
    body.extend_from_slice(&wrap_marker_frame(&frame1));

    let mut data = vec![0x1Au8];
    data.extend_from_slice(&body);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 2);
    assert_eq!(
        anim.get_frame_one_indexed(1).unwrap().get(0, 0),
        pixelbean::Rgb::new(1, 1, 1)
    );
    assert_eq!(
        anim.get_frame_one_indexed(2).unwrap().get(0, 0),
        pixelbean::Rgb::new(4, 4, 4)
    );
}

#[test]
fn s6_jpeg_anim_0x29_derives_size_from_jpeg() {
    fn encode_jpeg(w: u32, h: u32, r: u8, g: u8, b: u8) -> Vec<u8> {
        let rgb = solid_rgb(w as usize, h as usize, r, g, b);
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 95)
            .write_image(&rgb, w, h, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }
    let jpeg0 = encode_jpeg(256, 256, 200, 10, 10);
    let jpeg1 = encode_jpeg(256, 256, 10, 10, 200);

    let mut payload = jpeg0.clone();
    payload.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00]); // gap marker
    payload.extend_from_slice(&jpeg1);

    let mut data = vec![0x29u8, 2, 0, 50, 0, 0]; // declared row/col = 0
    data.extend_from_slice(&[0u8; 9]); // reserved block
    data.extend_from_slice(&payload);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.width, 256);
    assert_eq!(anim.height, 256);
    assert_eq!(anim.frame_count(), 2);

    let px = anim.get_frame_one_indexed(1).unwrap().get(128, 128);
    assert!(px.r > 150 && px.g < 60 && px.b < 60);
    let px = anim.get_frame_one_indexed(2).unwrap().get(128, 128);
    assert!(px.b > 150 && px.r < 60 && px.g < 60);
}

#[test]
fn s7_zstd_raw_rgb_three_distinct_colors() {
    let colors = [(10u8, 0u8, 0u8), (0, 10, 0), (0, 0, 10)];
    let mut plaintext = Vec::new();
    for &(r, g, b) in &colors {
        plaintext.extend_from_slice(&solid_rgb(256, 256, r, g, b));
    }
    let compressed = zstd_compress(&plaintext);

    let mut data = vec![0x2Au8, 3, 0, 50, 16, 16]; // 16*16=256
    data.extend_from_slice(&compressed);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 3);
    for (i, &(r, g, b)) in colors.iter().enumerate() {
        let frame = anim.get_frame_one_indexed(i + 1).unwrap();
        assert_eq!(frame.get(0, 0), pixelbean::Rgb::new(r, g, b));
        assert_eq!(frame.get(255, 255), pixelbean::Rgb::new(r, g, b));
    }
}

#[test]
fn s8_anim_multi64_recovers_from_corrupted_marker_frame() {
    let palette_a = [(5, 5, 5)];
    let palette_b = [(9, 9, 9)];
    let frame0 = build_hier_frame(0x15, &palette_a, &[0, 0, 0, 0]);
    let frame1 = build_hier_frame(0x15, &palette_b, &[0, 0, 0, 0]);

    let mut body = vec![3u8, 0, 50, 8, 8]; // 128x128, 3 declared frames
    body.extend_from_slice(&wrap_marker_frame(&frame0));
    body.extend_from_slice(&wrap_marker_frame(&frame1));
    // Frame 2: corrupted marker byte (0x00 instead of 0xAA), with enough
    // trailing bytes that the decoder reaches the marker check rather than
    // bailing out on a length check first.
    let mut corrupted = vec![0u8, 0, 0, 0, 0x00];
    corrupted.extend_from_slice(&[0u8; 16]);
    body.extend_from_slice(&corrupted);

    let mut data = vec![0x1Au8];
    data.extend_from_slice(&body);

    let anim = pixelbean::decode_bytes(&data).unwrap();
    assert_eq!(anim.frame_count(), 3);
    assert_eq!(
        anim.get_frame_one_indexed(1).unwrap().get(0, 0),
        pixelbean::Rgb::new(5, 5, 5)
    );
    assert_eq!(
        anim.get_frame_one_indexed(2).unwrap().get(0, 0),
        pixelbean::Rgb::new(9, 9, 9)
    );
    // Frame 2 is a duplicate of frame 1 (recovery policy), not black.
    let f1 = anim.get_frame_one_indexed(2).unwrap();
    let f2 = anim.get_frame_one_indexed(3).unwrap();
    assert_eq!(f1, f2);
}
