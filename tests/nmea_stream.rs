use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use garmin_gps::{
    nmea, FixFlag, ListenerConfig, NmeaDecoder, NmeaDispatcher, NmeaListener, NmeaSignal,
    PositionUpdate, Transport, TransportError,
};
use proptest::prelude::*;

const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

const SENTENCES: [&str; 7] = [
    RMC,
    "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
    "$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39",
    "$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48",
    "$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75",
    "$PGRME,15.0,M,45.0,M,25.0,M*1C",
    "$PGRMZ,93,f,3*21",
];

fn stream() -> String {
    SENTENCES.iter().map(|s| format!("{s}\r\n")).collect()
}

fn decode_chunks<'a>(chunks: impl IntoIterator<Item = &'a str>) -> (usize, Vec<NmeaSignal>) {
    let mut decoder = NmeaDecoder::default();
    let mut signals: Vec<NmeaSignal> = Vec::new();
    let recognized = chunks
        .into_iter()
        .map(|chunk| decoder.feed(chunk.as_bytes(), &mut signals))
        .sum();
    (recognized, signals)
}

fn raw(signals: &[NmeaSignal]) -> Vec<&str> {
    signals
        .iter()
        .filter_map(|signal| match signal {
            NmeaSignal::RawSentence(sentence) => Some(sentence.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn whole_stream() {
    let stream = stream();
    let (recognized, signals) = decode_chunks([stream.as_str()]);
    assert_eq!(recognized, 6);
    assert_eq!(raw(&signals), SENTENCES.to_vec());
    let updates: Vec<&PositionUpdate> = signals
        .iter()
        .filter_map(|signal| match signal {
            NmeaSignal::PositionUpdate(update) => Some(update),
            _ => None,
        })
        .collect();
    let sources: Vec<&str> = updates.iter().map(|u| u.source.as_str()).collect();
    assert_eq!(sources, vec!["RMC", "GGA", "GSA", "GSV", "RME", "RMZ"]);
    assert_eq!(updates[0].fix, FixFlag::Obtained);
    assert_eq!(updates[2].h_error(), Some(1.3 * 1.5));
}

#[test]
fn split_mid_field() {
    let line = format!("{}\r\n", SENTENCES[1]);
    let (_, whole) = decode_chunks([line.as_str()]);
    let (_, split) = decode_chunks(["$GPGGA,1", &line[8..]]);
    assert_eq!(raw(&whole), raw(&split));
    assert_eq!(raw(&split), vec![SENTENCES[1]]);
}

#[test]
fn closure_observer() {
    let mut fixes = 0;
    let mut decoder = NmeaDecoder::default();
    let mut observer = |signal: NmeaSignal| {
        if signal == NmeaSignal::FixObtained {
            fixes += 1;
        }
    };
    decoder.feed(format!("{RMC}\r\n{RMC}\r\n").as_bytes(), &mut observer);
    assert_eq!(fixes, 2);
}

/// Serves its chunks once, then reports nothing until the read timeout
struct Scripted {
    chunks: VecDeque<Vec<u8>>,
    drained: Arc<AtomicBool>,
}

impl Transport for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                if self.chunks.is_empty() {
                    self.drained.store(true, Ordering::SeqCst);
                }
                Ok(chunk.len())
            }
            None => {
                thread::sleep(Duration::from_millis(5));
                Ok(0)
            }
        }
    }

    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

#[test]
fn stop_drains_queue_and_drops_fragment() {
    let drained = Arc::new(AtomicBool::new(false));
    let transport = Scripted {
        chunks: vec![
            format!("{}\r\n", SENTENCES[1]).into_bytes(),
            b"$GPGGA,1235".to_vec(),
        ]
        .into(),
        drained: drained.clone(),
    };
    let listener = NmeaListener::start(
        transport,
        NmeaDispatcher::new(),
        Vec::<NmeaSignal>::new(),
        ListenerConfig::default(),
    );
    let deadline = Instant::now() + Duration::from_secs(2);
    while !drained.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(drained.load(Ordering::SeqCst));
    // both chunks were read, so both are queued even if not yet decoded
    let (_, signals) = listener.stop().unwrap();
    assert_eq!(raw(&signals), vec![SENTENCES[1]]);
    let updates = signals
        .iter()
        .filter(|signal| matches!(signal, NmeaSignal::PositionUpdate(_)))
        .count();
    assert_eq!(updates, 1);
}

proptest! {
    #[test]
    fn chunk_boundaries_do_not_matter(mut cuts in prop::collection::vec(0usize..600, 0..12)) {
        let stream = stream();
        cuts.iter_mut().for_each(|cut| *cut %= stream.len() + 1);
        cuts.sort_unstable();
        let mut chunks = Vec::new();
        let mut from = 0;
        for cut in cuts {
            chunks.push(&stream[from..cut]);
            from = cut;
        }
        chunks.push(&stream[from..]);
        let (recognized, signals) = decode_chunks(chunks);
        prop_assert_eq!(recognized, 6);
        prop_assert_eq!(raw(&signals), SENTENCES.to_vec());
    }

    #[test]
    fn single_bit_corruption_detected(index in 1usize..66, bit in 0u8..7) {
        let star = RMC.find('*').unwrap();
        let index = index % (star - 1) + 1;
        let mut bytes = RMC.as_bytes().to_vec();
        bytes[index] ^= 1 << bit;
        prop_assume!(bytes[index] != b'*');
        let corrupted = String::from_utf8(bytes).unwrap();
        prop_assert!(!nmea::is_valid(&corrupted));
    }
}
