// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/header.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file builds 80-byte Bitcoin block headers from stratum job fields and
// computes the merkle root from the coinbase parts and merkle branch. All
// byte-order quirks of the stratum wire format live here.
//
// Tree Location:
// - src/core/header.rs (block header construction logic)
// - Depends on: sha256, hex, thiserror

use crate::core::sha256::sha256d;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid hex in field {field}: {source}")]
    InvalidHex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("field {field} has wrong length: expected {expected} bytes, got {got}")]
    WrongLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

fn decode_u32_field(hex_str: &str, field: &'static str) -> Result<u32, HeaderError> {
    let bytes = hex::decode(hex_str).map_err(|source| HeaderError::InvalidHex { field, source })?;
    if bytes.len() != 4 {
        return Err(HeaderError::WrongLength {
            field,
            expected: 4,
            got: bytes.len(),
        });
    }
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Build an 80-byte block header from stratum job parameters.
///
/// `version`, `n_time` and `n_bits` are 8-hex-char words packed little-endian.
/// `prev_hash` arrives from stratum with each of its eight 4-byte groups in
/// reversed order; this function un-reverses the groups into wire order.
/// `nonce` is packed little-endian at offset 76.
pub fn build_block_header(
    version: &str,
    prev_hash: &str,
    merkle_root: &[u8; 32],
    n_time: &str,
    n_bits: &str,
    nonce: u32,
) -> Result<[u8; 80], HeaderError> {
    let ver = decode_u32_field(version, "version")?;
    let time = decode_u32_field(n_time, "n_time")?;
    let bits = decode_u32_field(n_bits, "n_bits")?;

    let prev_bytes =
        hex::decode(prev_hash).map_err(|source| HeaderError::InvalidHex { field: "prev_hash", source })?;
    if prev_bytes.len() != 32 {
        return Err(HeaderError::WrongLength {
            field: "prev_hash",
            expected: 32,
            got: prev_bytes.len(),
        });
    }

    let mut header = [0u8; 80];
    header[0..4].copy_from_slice(&ver.to_le_bytes());
    // Reverse each consecutive 4-byte group of the previous block hash
    for (i, group) in prev_bytes.chunks_exact(4).enumerate() {
        let base = 4 + i * 4;
        header[base] = group[3];
        header[base + 1] = group[2];
        header[base + 2] = group[1];
        header[base + 3] = group[0];
    }
    header[36..68].copy_from_slice(merkle_root);
    header[68..72].copy_from_slice(&time.to_le_bytes());
    header[72..76].copy_from_slice(&bits.to_le_bytes());
    header[76..80].copy_from_slice(&nonce.to_le_bytes());

    Ok(header)
}

/// Compute the merkle root for a mining attempt.
///
/// The coinbase transaction is `coinb1 || extranonce1 || extranonce2 || coinb2`
/// (all hex), double-hashed, then folded left through the merkle branch:
/// `h = SHA256d(h || branch[i])`.
pub fn compute_merkle_root(
    coinb1: &str,
    coinb2: &str,
    extranonce1: &str,
    extranonce2: &str,
    merkle_branch: &[String],
) -> Result<[u8; 32], HeaderError> {
    let mut coinbase = hex::decode(coinb1)
        .map_err(|source| HeaderError::InvalidHex { field: "coinb1", source })?;
    coinbase.extend(
        hex::decode(extranonce1)
            .map_err(|source| HeaderError::InvalidHex { field: "extranonce1", source })?,
    );
    coinbase.extend(
        hex::decode(extranonce2)
            .map_err(|source| HeaderError::InvalidHex { field: "extranonce2", source })?,
    );
    coinbase.extend(
        hex::decode(coinb2).map_err(|source| HeaderError::InvalidHex { field: "coinb2", source })?,
    );

    let mut current = sha256d(&coinbase);

    for branch_hex in merkle_branch {
        let branch = hex::decode(branch_hex)
            .map_err(|source| HeaderError::InvalidHex { field: "merkle_branch", source })?;
        if branch.len() != 32 {
            return Err(HeaderError::WrongLength {
                field: "merkle_branch",
                expected: 32,
                got: branch.len(),
            });
        }
        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(&current);
        concat[32..].copy_from_slice(&branch);
        current = sha256d(&concat);
    }

    Ok(current)
}


// Changelog:
// - v1.3.0 (2025-07-28): Typed HeaderError; merkle fold avoids per-branch
//   Vec allocation.
// - v1.0.0 (2025-06-30): Initial header builder and merkle root computation.
