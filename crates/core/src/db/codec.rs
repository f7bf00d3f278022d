//! Token-stream encoding for stored fingerprints.
//!
//! Tokens are joined with `,` and zlib-compressed. The normalizer splits
//! arguments on `,`, so a token never contains the delimiter; tokens that do,
//! and empty tokens, are rejected so decoding always reproduces the input.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::db::{StoreError, StoreResult};

pub const TOKEN_DELIMITER: char = ',';

/// Join tokens with the delimiter, rejecting tokens that would not round-trip.
pub fn join_tokens(tokens: &[String]) -> StoreResult<String> {
    if let Some(bad) = tokens.iter().find(|t| t.is_empty() || t.contains(TOKEN_DELIMITER)) {
        return Err(StoreError::InvalidToken { token: bad.clone() });
    }
    Ok(tokens.join(","))
}

/// Inverse of `join_tokens`. The empty string is the empty sequence.
pub fn split_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(TOKEN_DELIMITER).map(str::to_string).collect()
}

pub fn compress(text: &str) -> StoreResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).map_err(StoreError::Compress)?;
    encoder.finish().map_err(StoreError::Compress)
}

pub fn decompress(blob: &[u8]) -> std::io::Result<String> {
    let mut text = String::new();
    ZlibDecoder::new(blob).read_to_string(&mut text)?;
    Ok(text)
}

/// Content address of a joined token stream (hex SHA-256).
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Encoded form ready for insertion: compressed blob plus its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTokens {
    pub blob: Vec<u8>,
    pub digest: String,
}

pub fn encode_tokens(tokens: &[String]) -> StoreResult<EncodedTokens> {
    let joined = join_tokens(tokens)?;
    Ok(EncodedTokens { blob: compress(&joined)?, digest: digest(&joined) })
}

pub fn decode_tokens(blob: &[u8]) -> std::io::Result<Vec<String>> {
    decompress(blob).map(|text| split_tokens(&text))
}
