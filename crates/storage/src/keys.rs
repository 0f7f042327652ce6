//! Composite key encoding and decoding.
//!
//! Keys use the ledger runtime's native composite format:
//!
//! ```text
//! U+0000 <namespace> U+0000 <fragment 1> U+0000 ... <fragment N> U+0000
//! ```
//!
//! The leading separator keeps composite keys in a region of the key space
//! that plain keys cannot reach, and the trailing separator makes a key with
//! fragments `[a]` sort after, never inside, the range of `[a, b]`.

use crate::error::{StorageError, StorageResult};

/// Separator between key components; also the first character of every composite key.
pub const MIN_UNICODE_RUNE: char = '\u{0}';

/// Upper bound appended to a partial key to close a prefix range scan.
pub const MAX_UNICODE_RUNE: char = '\u{10FFFF}';

fn validate_component(component: &str, what: &str) -> StorageResult<()> {
    if component.contains(MIN_UNICODE_RUNE) || component.contains(MAX_UNICODE_RUNE) {
        return Err(StorageError::invalid_key(format!(
            "{what} {component:?} contains U+0000 or U+10FFFF"
        )));
    }
    Ok(())
}

/// Encodes a namespace and ordered fragments into a composite key.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the namespace is empty or any
/// component contains a reserved separator character.
pub fn encode_composite_key<S: AsRef<str>>(
    namespace: &str,
    fragments: &[S],
) -> StorageResult<String> {
    if namespace.is_empty() {
        return Err(StorageError::invalid_key("namespace must not be empty"));
    }
    validate_component(namespace, "namespace")?;

    let mut key = String::with_capacity(
        namespace.len() + fragments.iter().map(|f| f.as_ref().len() + 1).sum::<usize>() + 2,
    );
    key.push(MIN_UNICODE_RUNE);
    key.push_str(namespace);
    key.push(MIN_UNICODE_RUNE);
    for fragment in fragments {
        let fragment = fragment.as_ref();
        validate_component(fragment, "key fragment")?;
        key.push_str(fragment);
        key.push(MIN_UNICODE_RUNE);
    }
    Ok(key)
}

/// Splits a composite key back into its namespace and fragments.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the key is not in composite
/// form or its namespace is empty.
pub fn decode_composite_key(key: &str) -> StorageResult<(String, Vec<String>)> {
    let body = key
        .strip_prefix(MIN_UNICODE_RUNE)
        .and_then(|rest| rest.strip_suffix(MIN_UNICODE_RUNE))
        .ok_or_else(|| {
            StorageError::invalid_key(format!("{key:?} is not a composite key"))
        })?;

    let mut components = body.split(MIN_UNICODE_RUNE);
    let namespace = match components.next() {
        Some(namespace) if !namespace.is_empty() => namespace.to_owned(),
        _ => return Err(StorageError::invalid_key(format!("{key:?} has an empty namespace"))),
    };

    Ok((namespace, components.map(str::to_owned).collect()))
}

/// Returns the half-open range `[start, end)` covering every key whose
/// leading fragments equal `fragments` within `namespace`.
///
/// An empty fragment list covers the whole namespace.
///
/// # Errors
///
/// Same as [`encode_composite_key`].
pub fn partial_key_range<S: AsRef<str>>(
    namespace: &str,
    fragments: &[S],
) -> StorageResult<(String, String)> {
    let start = encode_composite_key(namespace, fragments)?;
    let mut end = start.clone();
    end.push(MAX_UNICODE_RUNE);
    Ok((start, end))
}
