//! Sentence checksums and field splitting.

use crate::NmeaError;

/// Compute the checksum of a sentence as two uppercase hex digits.
///
/// Every byte up to the first `*` contributes, except `$`.
pub fn checksum(sentence: &str) -> String {
    let sum = sentence
        .bytes()
        .take_while(|&b| b != b'*')
        .filter(|&b| b != b'$')
        .fold(0u8, |acc, b| acc ^ b);
    format!("{:02X}", sum)
}

/// Compare the computed checksum with the two characters after `*`.
pub fn verify(sentence: &str) -> Result<(), NmeaError> {
    let star = sentence.find('*').ok_or(NmeaError::MissingChecksum)?;
    let found = sentence
        .get(star + 1..star + 3)
        .ok_or(NmeaError::MissingChecksum)?;
    let expected = checksum(sentence);
    if expected == found {
        Ok(())
    } else {
        Err(NmeaError::ChecksumMismatch {
            expected,
            found: found.to_string(),
        })
    }
}

/// Whether a sentence carries a matching checksum.
pub fn is_valid(sentence: &str) -> bool {
    verify(sentence).is_ok()
}

/// Split a sentence into its comma separated fields, dropping the checksum.
///
/// Empty fields are kept so decoders can index by position.
pub fn split_fields(sentence: &str) -> Vec<&str> {
    let body = match sentence.find('*') {
        Some(star) => &sentence[..star],
        None => sentence,
    };
    body.split(',').collect()
}
