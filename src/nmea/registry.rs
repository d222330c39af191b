//! Sentence identifier to decoder mapping.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{ConfigError, NmeaError, NmeaSignal};

use super::sentences;

/// A sentence decoder: turns the fields of one sentence into signals
pub type DecodeFn =
    Arc<dyn Fn(&SentenceFields) -> Result<Vec<NmeaSignal>, NmeaError> + Send + Sync>;

/// Comma separated fields of one sentence, checksum removed.
///
/// Indexing past the end yields an empty field.
#[derive(Debug, Clone)]
pub struct SentenceFields<'a> {
    id: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> SentenceFields<'a> {
    /// Wrap already split fields under a 3-character sentence identifier
    pub fn new(id: &'a str, fields: Vec<&'a str>) -> Self {
        Self { id, fields }
    }

    /// The 3-character sentence identifier
    pub fn id(&self) -> &str {
        self.id
    }

    /// Field at `index`, field 0 being the `$xxYYY` address
    pub fn get(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or_default()
    }

    /// Number of fields including the address
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the sentence had no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fail with a decoder fault when the sentence is shorter than its layout
    pub fn expect_len(&self, count: usize) -> Result<(), NmeaError> {
        if self.fields.len() < count {
            Err(NmeaError::DecoderFault(format!(
                "{} sentence has {} fields, expected at least {}",
                self.id,
                self.fields.len(),
                count
            )))
        } else {
            Ok(())
        }
    }

    /// Fail with a malformed field error when any of `indices` is empty
    pub fn require(&self, indices: &[usize]) -> Result<(), NmeaError> {
        match indices.iter().find(|&&i| self.get(i).is_empty()) {
            Some(&field) => Err(NmeaError::MalformedField {
                sentence: self.id.to_string(),
                field,
            }),
            None => Ok(()),
        }
    }
}

/// Registration entry for one sentence type
#[derive(Clone)]
pub struct SentenceDescriptor {
    /// Talker prefix when registered under a full `$xxYYY` address
    pub talker: Option<String>,
    /// 3-character sentence identifier
    pub id: String,
    /// Human readable description
    pub description: String,
    /// Decoder invoked for matching sentences
    pub decode: DecodeFn,
}

impl fmt::Debug for SentenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentenceDescriptor")
            .field("talker", &self.talker)
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl SentenceDescriptor {
    /// Build a descriptor, splitting a 6-character `$xxYYY` address into
    /// talker and identifier.
    pub fn new(
        id: &str,
        description: &str,
        decode: Option<DecodeFn>,
    ) -> Result<Self, ConfigError> {
        if id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if !id.is_ascii() {
            return Err(ConfigError::InvalidId(id.to_string()));
        }
        let decode = decode.ok_or_else(|| ConfigError::MissingDecoder(id.to_string()))?;
        let (talker, id) = if id.len() == 6 {
            (Some(id[1..3].to_string()), id[3..].to_string())
        } else {
            (None, id.to_string())
        };
        Ok(Self {
            talker,
            id,
            description: description.to_string(),
            decode,
        })
    }
}

/// Map a lookup key to its registry key: `$xxYYY` becomes `YYY`.
fn normalize(key: &str) -> &str {
    if key.len() == 6 && key.is_ascii() {
        &key[3..]
    } else {
        key
    }
}

/// Registry of sentence decoders keyed by the 3-character identifier
#[derive(Debug, Clone, Default)]
pub struct SentenceRegistry {
    parsers: HashMap<String, SentenceDescriptor>,
}

impl SentenceRegistry {
    /// Registry with no sentences registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the standard and Garmin sentences registered
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (id, description, decode) in sentences::defaults() {
            let descriptor = SentenceDescriptor {
                talker: None,
                id: id.to_string(),
                description: description.to_string(),
                decode,
            };
            registry.add(descriptor);
        }
        registry
    }

    /// Register a decoder. A later registration for the same identifier
    /// replaces the earlier one.
    pub fn register<F>(&mut self, id: &str, description: &str, decode: F) -> Result<(), ConfigError>
    where
        F: Fn(&SentenceFields) -> Result<Vec<NmeaSignal>, NmeaError> + Send + Sync + 'static,
    {
        let descriptor = SentenceDescriptor::new(id, description, Some(Arc::new(decode)))?;
        self.add(descriptor);
        Ok(())
    }

    /// Insert a prepared descriptor
    pub fn add(&mut self, descriptor: SentenceDescriptor) {
        log::debug!(
            "Registering decoder for {} ({})",
            descriptor.id,
            descriptor.description
        );
        self.parsers.insert(descriptor.id.clone(), descriptor);
    }

    /// Look up by identifier or full `$xxYYY` address
    pub fn get(&self, key: &str) -> Option<&SentenceDescriptor> {
        self.parsers.get(normalize(key))
    }

    /// Whether a decoder is registered for the key
    pub fn contains(&self, key: &str) -> bool {
        !key.is_empty() && self.get(key).is_some()
    }

    /// Remove a decoder, returning it
    pub fn remove(&mut self, key: &str) -> Option<SentenceDescriptor> {
        self.parsers.remove(normalize(key))
    }

    /// Registered identifiers
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    /// Number of registered decoders
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_registered() {
        let registry = SentenceRegistry::new();
        for id in [
            "RMC", "GGA", "GNS", "GLL", "GSA", "GSV", "ZDA", "RMM", "RMZ", "RME", "HDG", "HDT",
        ] {
            assert!(registry.contains(id), "{id} missing");
        }
        assert!(registry.contains("$GNRMC"));
        assert!(registry.contains("$PGRMZ"));
        assert!(!registry.contains("VTG"));
        assert!(!registry.contains(""));
    }

    #[test]
    fn register_strips_talker() {
        let mut registry = SentenceRegistry::empty();
        registry
            .register("$GPVTG", "Track made good", |_| Ok(vec![]))
            .unwrap();
        let descriptor = registry.get("VTG").unwrap();
        assert_eq!(descriptor.talker.as_deref(), Some("GP"));
        assert_eq!(descriptor.id, "VTG");
        assert!(registry.contains("$IIVTG"));
    }

    #[test]
    fn register_rejects_bad_input() {
        let mut registry = SentenceRegistry::empty();
        assert_eq!(
            registry.register("", "nothing", |_| Ok(vec![])),
            Err(ConfigError::EmptyId)
        );
        assert_eq!(
            SentenceDescriptor::new("XYZ", "no decoder", None).unwrap_err(),
            ConfigError::MissingDecoder("XYZ".into())
        );
        assert!(matches!(
            registry.register("$GPRMÇ", "accented", |_| Ok(vec![])),
            Err(ConfigError::InvalidId(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn fields_accessors() {
        let fields = SentenceFields::new("ZDA", vec!["$GPZDA", "201530.00", ""]);
        assert_eq!(fields.get(1), "201530.00");
        assert_eq!(fields.get(7), "");
        assert!(fields.expect_len(3).is_ok());
        assert!(matches!(fields.expect_len(7), Err(NmeaError::DecoderFault(_))));
        assert_eq!(
            fields.require(&[1, 2]),
            Err(NmeaError::MalformedField {
                sentence: "ZDA".into(),
                field: 2
            })
        );
    }
}
