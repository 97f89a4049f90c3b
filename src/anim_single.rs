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

//! Format `0x09` (`ANIM_SINGLE`): single 16x16 animation, AES-CBC over a
//! flat run of 768-byte (16*16*3) tile-major frames.

use crate::{primitives, tile, Animation, DecodeError};

/// Decodes a `0x09` container's body (the leading format byte already
/// consumed by the dispatcher).
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedHeader`] if `body` is shorter than the
/// 3-byte speed header it expects, or a primitive failure from AES
/// decryption.
pub fn decode(body: &[u8]) -> Result<Animation, DecodeError> {
    if body.len() < 3 {
        return Err(DecodeError::TruncatedHeader);
    }
    let speed_ms = u16::from_be_bytes([body[1], body[2]]);

    // The reference decoder rebuilds its ciphertext via a 4-byte rotate of
    // `[0x00] + body`: writes for the wrapped-around low indices get
    // clobbered by later writes at the same destination slots, so the net
    // effect collapses to a plain slice from offset 4 of `[0x00] + body`.
    let encrypted = &body[3..];

    let decrypted = primitives::decrypt_aes_cbc(encrypted)?;
    let total_frames = decrypted.len() / 768;

    let frames = (0..total_frames)
        .map(|i| {
            let chunk = &decrypted[i * 768..i * 768 + 768];
            tile::assemble(chunk, 1, 1)
        })
        .collect();

    Ok(Animation {
        speed_ms,
        row_count: 1,
        column_count: 1,
        width: 16,
        height: 16,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_header() {
        let err = decode(&[0u8, 1]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedHeader));
    }
}
