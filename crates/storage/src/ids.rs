//! Version 4 identifiers that every replica can agree on.
//!
//! Chaincode runs on several endorsing peers that must produce identical
//! write sets, so identifiers minted during a transaction cannot come from
//! a local random source. [`derive_id`] builds one from the transaction's
//! logical timestamp and id instead; the result still passes every
//! version 4 check.
//!
//! # Layout
//!
//! ```text
//! bytes 0..8   time value in 100 ns ticks since the Unix epoch, v1 field order
//! bytes 8..10  sequence delta (clock sequence), variant bits forced to 10
//! bytes 10..16 first six bytes of SHA-1(transaction id)
//! ```
//!
//! The version nibble is forced to 4 afterwards.

use sha1::{Digest, Sha1};
use uuid::{Builder, Uuid, Variant, Version};

use crate::{
    error::{StorageError, StorageResult},
    types::TxTimestamp,
};

const TICKS_PER_SECOND: u64 = 10_000_000;
const NANOS_PER_TICK: u32 = 100;

/// Parses `id` and requires it to be a version 4 UUID.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if `id` is not a UUID and
/// [`StorageError::WrongVersion`] if it is a UUID of another version.
pub fn parse_v4(id: &str) -> StorageResult<Uuid> {
    let parsed = Uuid::parse_str(id)
        .map_err(|_| StorageError::invalid_key(format!("unable to parse an ID from {id:?}")))?;
    if parsed.get_version() != Some(Version::Random) {
        return Err(StorageError::wrong_version(id));
    }
    Ok(parsed)
}

/// Derives a version 4 UUID from replica-agreed transaction inputs.
///
/// `sequence_delta` distinguishes identifiers minted within one transaction;
/// callers pass the 1-based position within the batch. Only its low 14 bits
/// survive the variant mask.
///
/// # Errors
///
/// Returns [`StorageError::Context`] if the timestamp is before the Unix
/// epoch or otherwise unusable.
pub fn derive_id(timestamp: TxTimestamp, tx_id: &str, sequence_delta: u32) -> StorageResult<Uuid> {
    let utc = timestamp.to_utc()?;
    let seconds = u64::try_from(utc.timestamp()).map_err(|_| {
        StorageError::context(format!(
            "transaction timestamp {}s precedes the Unix epoch",
            timestamp.seconds
        ))
    })?;
    let ticks = seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(u64::from(utc.timestamp_subsec_nanos() / NANOS_PER_TICK)))
        .ok_or_else(|| {
            StorageError::context(format!(
                "transaction timestamp {}s does not fit a 60-bit time value",
                timestamp.seconds
            ))
        })?;

    let digest = Sha1::digest(tx_id.as_bytes());

    let mut bytes = [0u8; 16];
    bytes[0..4].copy_from_slice(&(ticks as u32).to_be_bytes());
    bytes[4] = (ticks >> 40) as u8;
    bytes[5] = (ticks >> 32) as u8;
    bytes[6] = ((ticks >> 56) as u8) & 0x0F;
    bytes[7] = (ticks >> 48) as u8;
    bytes[8] = (sequence_delta >> 8) as u8;
    bytes[9] = sequence_delta as u8;
    bytes[10..16].copy_from_slice(&digest[..6]);

    Ok(Builder::from_bytes(bytes)
        .with_version(Version::Random)
        .with_variant(Variant::RFC4122)
        .into_uuid())
}

/// Returns the identifier numerically following `id`.
///
/// The 128-bit value is incremented as-is. If the carry reaches the version
/// or variant bits the result is no longer a version 4 UUID and the call
/// fails rather than wrapping or re-stamping.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if `id` is not a UUID and
/// [`StorageError::WrongVersion`] if `id` or its successor is not version 4.
pub fn increment_id(id: &str) -> StorageResult<String> {
    let current = parse_v4(id)?;
    let next = current
        .as_u128()
        .checked_add(1)
        .map(Uuid::from_u128)
        .ok_or_else(|| StorageError::wrong_version(id))?;

    if next.get_version() != Some(Version::Random) || next.get_variant() != Variant::RFC4122 {
        return Err(StorageError::wrong_version(next.to_string()));
    }
    Ok(next.to_string())
}
