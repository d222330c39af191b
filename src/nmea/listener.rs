use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Transport, TransportError};

use super::{dispatcher::NmeaDispatcher, reassembler::SentenceReassembler, signal::NmeaObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Listener tuning
pub struct ListenerConfig {
    /// How long a single transport read may block
    pub read_timeout: Duration,
    /// Size of the read buffer
    pub read_buffer: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            read_buffer: 1024,
        }
    }
}

/// Pause after a read that returned nothing, for transports that do not
/// block until their timeout
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Reassembles raw bytes into sentences and dispatches them.
#[derive(Debug, Clone, Default)]
pub struct NmeaDecoder {
    reassembler: SentenceReassembler,
    dispatcher: NmeaDispatcher,
}

impl NmeaDecoder {
    /// Decoder routing through `dispatcher`
    pub fn new(dispatcher: NmeaDispatcher) -> Self {
        Self {
            reassembler: SentenceReassembler::new(),
            dispatcher,
        }
    }

    /// Feed raw bytes, returning how many sentences were recognized.
    ///
    /// Invalid UTF-8 is replaced; the affected sentence then fails its checksum.
    pub fn feed(&mut self, bytes: &[u8], observer: &mut dyn NmeaObserver) -> usize {
        let text = String::from_utf8_lossy(bytes);
        self.reassembler
            .feed(&text)
            .iter()
            .filter(|sentence| self.dispatcher.dispatch(sentence, observer))
            .count()
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.reassembler.reset()
    }

    /// The dispatcher
    pub fn dispatcher(&self) -> &NmeaDispatcher {
        &self.dispatcher
    }

    /// Give back the dispatcher
    pub fn into_dispatcher(self) -> NmeaDispatcher {
        self.dispatcher
    }
}

enum Message {
    Data(Vec<u8>),
    Failed(TransportError),
}

struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// One listening session over a transport.
///
/// A producer thread owns the transport and only queues what it reads; a
/// consumer thread decodes the queue in arrival order and feeds the
/// observer. Dropping the listener stops both threads; [`NmeaListener::stop`]
/// also waits for them and hands back the dispatcher and observer.
pub struct NmeaListener<O> {
    stop: StopOnDrop,
    producer: JoinHandle<()>,
    consumer: JoinHandle<(NmeaDispatcher, O)>,
}

impl<O: NmeaObserver + Send + 'static> NmeaListener<O> {
    /// Start listening on `transport`
    pub fn start<T: Transport + 'static>(
        transport: T,
        dispatcher: NmeaDispatcher,
        observer: O,
        config: ListenerConfig,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let producer = {
            let stop = stop.clone();
            thread::spawn(move || produce(transport, tx, stop, config))
        };
        let consumer = thread::spawn(move || consume(rx, NmeaDecoder::new(dispatcher), observer));
        log::info!("NMEA listener started");
        Self {
            stop: StopOnDrop(stop),
            producer,
            consumer,
        }
    }

    /// Whether the session is still decoding
    pub fn is_running(&self) -> bool {
        !self.consumer.is_finished()
    }

    /// Stop reading, decode what was already queued, and wait for both
    /// threads. Returns the dispatcher and observer.
    pub fn stop(self) -> thread::Result<(NmeaDispatcher, O)> {
        let Self {
            stop,
            producer,
            consumer,
        } = self;
        drop(stop);
        producer.join()?;
        let parts = consumer.join()?;
        log::info!("NMEA listener stopped");
        Ok(parts)
    }
}

fn produce<T: Transport>(
    mut transport: T,
    tx: mpsc::Sender<Message>,
    stop: Arc<AtomicBool>,
    config: ListenerConfig,
) {
    let mut buf = vec![0u8; config.read_buffer.max(1)];
    while !stop.load(Ordering::Relaxed) {
        match transport.read(&mut buf) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                if tx.send(Message::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) => {
                log::error!("Transport failed: {}", err);
                let _ = tx.send(Message::Failed(err));
                break;
            }
        }
    }
    // transport released here, on every exit path
}

fn consume<O: NmeaObserver>(
    rx: mpsc::Receiver<Message>,
    mut decoder: NmeaDecoder,
    mut observer: O,
) -> (NmeaDispatcher, O) {
    for message in rx {
        match message {
            Message::Data(bytes) => {
                decoder.feed(&bytes, &mut observer);
            }
            Message::Failed(err) => observer.transport_error(&err),
        }
    }
    if !decoder.reassembler.pending().is_empty() {
        log::debug!("Discarding partial sentence at shutdown");
    }
    decoder.reset();
    (decoder.into_dispatcher(), observer)
}

#[cfg(test)]
mod test {
    use std::{collections::VecDeque, time::Instant};

    use super::*;
    use crate::NmeaSignal;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    struct Scripted {
        chunks: VecDeque<Vec<u8>>,
        fail_at_end: bool,
    }

    impl Transport for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None if self.fail_at_end => Err(TransportError::Closed),
                None => {
                    thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
            }
        }

        fn write_all(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        signals: Vec<NmeaSignal>,
        errors: Vec<String>,
    }

    impl NmeaObserver for Recorder {
        fn signal(&mut self, signal: NmeaSignal) {
            self.signals.push(signal)
        }

        fn transport_error(&mut self, error: &TransportError) {
            self.errors.push(error.to_string())
        }
    }

    #[test]
    fn decoder_counts_recognized() {
        let mut decoder = NmeaDecoder::default();
        let mut signals: Vec<NmeaSignal> = Vec::new();
        let stream = format!("{GGA}$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48\r\n{GGA}");
        assert_eq!(decoder.feed(stream.as_bytes(), &mut signals), 2);
        assert_eq!(decoder.feed(&[0xff, 0xfe, b'\r', b'\n'], &mut signals), 0);
    }

    #[test]
    fn fragmented_stream_in_order() {
        let bytes = GGA.as_bytes();
        let transport = Scripted {
            chunks: vec![bytes[..8].to_vec(), bytes[8..30].to_vec(), bytes[30..].to_vec()].into(),
            fail_at_end: false,
        };
        let (tx, rx) = mpsc::channel();
        let listener =
            NmeaListener::start(transport, NmeaDispatcher::new(), tx, ListenerConfig::default());
        let mut raw = None;
        while let Ok(signal) = rx.recv_timeout(Duration::from_secs(2)) {
            if let NmeaSignal::RawSentence(sentence) = signal {
                raw = Some(sentence);
                break;
            }
        }
        assert_eq!(raw.as_deref(), Some(GGA.trim_end()));
        assert!(listener.is_running());
        listener.stop().unwrap();
    }

    struct Silent(Arc<std::sync::atomic::AtomicUsize>);

    impl Transport for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(0)
        }

        fn write_all(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn empty_reads_back_off() {
        let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let started = Instant::now();
        let listener = NmeaListener::start(
            Silent(reads.clone()),
            NmeaDispatcher::new(),
            Vec::<NmeaSignal>::new(),
            ListenerConfig::default(),
        );
        thread::sleep(Duration::from_millis(50));
        listener.stop().unwrap();
        let elapsed = started.elapsed().as_millis() as usize;
        let reads = reads.load(Ordering::Relaxed);
        assert!(reads <= elapsed + 2, "{reads} reads in {elapsed} ms");
    }

    #[test]
    fn transport_error_ends_session() {
        let transport = Scripted {
            chunks: vec![GGA.as_bytes().to_vec()].into(),
            fail_at_end: true,
        };
        let listener = NmeaListener::start(
            transport,
            NmeaDispatcher::new(),
            Recorder::default(),
            ListenerConfig::default(),
        );
        let deadline = Instant::now() + Duration::from_secs(2);
        while listener.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let (_, recorder) = listener.stop().unwrap();
        assert_eq!(recorder.errors, vec![TransportError::Closed.to_string()]);
        assert!(matches!(
            recorder.signals.last(),
            Some(NmeaSignal::PositionUpdate(_))
        ));
    }
}
