use std::panic::{self, AssertUnwindSafe};

use crate::{NmeaError, NmeaSignal};

use super::{
    checksum::{split_fields, verify},
    registry::{SentenceFields, SentenceRegistry},
    signal::NmeaObserver,
};

/// Validates complete sentences and routes them to their decoder.
///
/// Owns its [`SentenceRegistry`]; register extra sentence types through
/// [`NmeaDispatcher::registry_mut`] before dispatch begins.
#[derive(Debug, Clone, Default)]
pub struct NmeaDispatcher {
    registry: SentenceRegistry,
}

impl NmeaDispatcher {
    /// Dispatcher over the default sentence set
    pub fn new() -> Self {
        Self::with_registry(SentenceRegistry::new())
    }

    /// Dispatcher over a caller supplied registry
    pub fn with_registry(registry: SentenceRegistry) -> Self {
        Self { registry }
    }

    /// The sentence registry
    pub fn registry(&self) -> &SentenceRegistry {
        &self.registry
    }

    /// The sentence registry, for registering additional decoders
    pub fn registry_mut(&mut self) -> &mut SentenceRegistry {
        &mut self.registry
    }

    /// Dispatch one complete sentence, returning whether it was recognized.
    ///
    /// Failures are logged and never propagate.
    pub fn dispatch(&self, sentence: &str, observer: &mut dyn NmeaObserver) -> bool {
        match self.try_dispatch(sentence, observer) {
            Ok(()) => true,
            Err(err @ NmeaError::UnrecognizedSentence(_)) => {
                log::debug!("{err}");
                false
            }
            Err(err) => {
                log::warn!("Dropping {:?}: {err}", sentence.trim_end());
                false
            }
        }
    }

    /// Dispatch one complete sentence, reporting why it was not recognized.
    pub fn try_dispatch(
        &self,
        sentence: &str,
        observer: &mut dyn NmeaObserver,
    ) -> Result<(), NmeaError> {
        let sentence = sentence.trim_end_matches(&['\r', '\n'][..]);
        verify(sentence)?;
        observer.signal(NmeaSignal::RawSentence(sentence.to_string()));

        let fields = split_fields(sentence);
        let id = sentence_id(fields[0])?;
        let descriptor = self
            .registry
            .get(&id)
            .ok_or_else(|| NmeaError::UnrecognizedSentence(id.clone()))?;

        let fields = SentenceFields::new(&id, fields);
        let signals = panic::catch_unwind(AssertUnwindSafe(|| (descriptor.decode)(&fields)))
            .map_err(|cause| {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "decoder panicked".to_string());
                NmeaError::DecoderFault(format!("{id}: {message}"))
            })??;

        for signal in signals {
            observer.signal(signal);
        }
        Ok(())
    }
}

/// The 3-character identifier of a `$xxYYY` address field.
fn sentence_id(address: &str) -> Result<String, NmeaError> {
    let address = if address.starts_with('$') {
        address.to_string()
    } else {
        format!("${address}")
    };
    match address.get(3..) {
        Some(id) if address.len() == 6 => Ok(id.to_string()),
        _ => Err(NmeaError::UnrecognizedSentence(address)),
    }
}
