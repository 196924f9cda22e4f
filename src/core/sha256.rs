// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/sha256.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the SHA-256d (double SHA-256) primitive used by
// Bitcoin's proof of work. It provides helpers for hashing arbitrary bytes
// and for hashing an 80-byte block header with the nonce word replaced.

use sha2::{Digest, Sha256};

/// Double SHA-256 over arbitrary bytes: `SHA256(SHA256(data))`.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Double SHA-256 of an 80-byte header with `nonce` packed little-endian
/// at offset 76. The base header's own nonce bytes are ignored.
pub fn sha256d_header_with_nonce(header: &[u8; 80], nonce: u32) -> [u8; 32] {
    let mut buf = *header;
    buf[76..80].copy_from_slice(&nonce.to_le_bytes());
    sha256d(&buf)
}


// Changelog:
// - v1.3.0 (2025-07-28): Simplified to the two helpers the search kernel and
//   header builder actually use.
// - v1.0.0 (2025-06-30): Initial SHA-256d implementation on sha2.
