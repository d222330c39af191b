#![deny(missing_docs)]
//! # Recorder
//! Logs NMEA positions from a Garmin receiver and downloads its stored tracks.
mod config;
mod detect;
mod store;
use chrono::Utc;
use crossterm::terminal;
use garmin_gps::{
    download_tracks, tracks_from_file, ListenerConfig, NmeaDispatcher, NmeaListener,
    NmeaObserver, NmeaSignal, SerialTransport, TrackBatch, TransferConfig, TransportError,
};
use std::{
    error::Error,
    io::Write,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    time::Duration,
};

pub use config::RecorderCfg;
use config::{Args, Command, DetectCmd, ListenCmd, ReplayCmd};
use store::{HourlyStore, StoreKind};

enum Event {
    Signal(NmeaSignal),
    Failed(String),
}

/// Hands everything the listener produces to the main thread
struct Forward(mpsc::Sender<Event>);

impl NmeaObserver for Forward {
    fn signal(&mut self, signal: NmeaSignal) {
        let _ = self.0.send(Event::Signal(signal));
    }

    fn transport_error(&mut self, error: &TransportError) {
        let _ = self.0.send(Event::Failed(error.to_string()));
    }
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();
    let args: Args = argh::from_env();
    let mut cfg = match RecorderCfg::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::info!("Using default configuration: {}", e);
            RecorderCfg::default()
        }
    };
    cfg.merge(&args);
    if args.save_config {
        if let Err(e) = cfg.store_default() {
            log::warn!("Could not save configuration: {}", e);
        }
    }
    let result = match &args.command {
        Command::Listen(cmd) => listen(&cfg, cmd),
        Command::Tracks(_) => tracks(&cfg),
        Command::Replay(cmd) => replay(&cfg, cmd),
        Command::Detect(cmd) => detect(&cfg, cmd),
    };
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn listen(cfg: &RecorderCfg, cmd: &ListenCmd) -> Result<(), Box<dyn Error>> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            log::info!("Interrupted, stopping");
            running.store(false, Ordering::SeqCst);
        })?;
    }
    let transport = SerialTransport::open(&cfg.serial_port, cfg.baud_rate, cfg.timeout())?;
    let mut positions = HourlyStore::new(cfg.save_dir.join("positions"), StoreKind::Json, true)?;
    let mut raw = if cmd.no_raw {
        None
    } else {
        Some(HourlyStore::new(
            cfg.save_dir.join("nmea"),
            StoreKind::Nmea,
            true,
        )?)
    };
    let (tx, rx) = mpsc::channel();
    let listener = NmeaListener::start(
        transport,
        NmeaDispatcher::new(),
        Forward(tx),
        ListenerConfig {
            read_timeout: cfg.timeout(),
            ..Default::default()
        },
    );
    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let now = Utc::now();
        match event {
            Event::Signal(NmeaSignal::RawSentence(sentence)) => {
                if let Some(raw) = raw.as_mut() {
                    raw.store(now, sentence.as_bytes())?;
                }
            }
            Event::Signal(NmeaSignal::PositionUpdate(update)) => {
                if let Some(pos) = update.position {
                    println!(
                        "[{}] {}: {} ({:?})",
                        now.format("%H:%M:%S"),
                        update.source,
                        pos,
                        update.fix
                    );
                }
                positions.store(
                    update.timestamp.unwrap_or(now),
                    serde_json::to_string(&update)?.as_bytes(),
                )?;
            }
            Event::Signal(NmeaSignal::FixLost) => log::warn!("Fix lost"),
            Event::Signal(_) => {}
            Event::Failed(e) => {
                eprintln!("[{}] Receiver link failed: {}", now.format("%H:%M:%S"), e);
                break;
            }
        }
    }
    if listener.stop().is_err() {
        log::error!("Listener thread panicked");
    }
    Ok(())
}

fn tracks(cfg: &RecorderCfg) -> Result<(), Box<dyn Error>> {
    let mut transport = SerialTransport::open(&cfg.serial_port, cfg.baud_rate, cfg.timeout())?;
    let batch = download_tracks(&mut transport, &TransferConfig::default(), |percent| {
        print!("\rDownloading... {:>5.1}%", percent);
        let _ = std::io::stdout().flush();
    })?;
    println!();
    transport.close();
    summarize(&batch);
    save_tracks(&cfg.save_dir, &batch)
}

fn replay(cfg: &RecorderCfg, cmd: &ReplayCmd) -> Result<(), Box<dyn Error>> {
    let batch = tracks_from_file(&cmd.file)?;
    summarize(&batch);
    if cmd.save {
        save_tracks(&cfg.save_dir, &batch)?;
    }
    Ok(())
}

fn detect(cfg: &RecorderCfg, cmd: &DetectCmd) -> Result<(), Box<dyn Error>> {
    let found = detect::scan(Duration::from_millis(cmd.wait_ms), cfg.timeout(), cmd.first)?;
    if found.is_empty() {
        println!("No receiver found");
    }
    for (port, baud) in found {
        println!("{} @ {} baud", port, baud);
    }
    Ok(())
}

fn summarize(batch: &TrackBatch) {
    let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
    println!(
        "{:-<width$}",
        format!(
            "{} tracks, {} points ",
            batch.tracks.len(),
            batch.point_count()
        ),
        width = width
    );
    for track in &batch.tracks {
        let name = if track.name.is_empty() {
            "<unnamed>"
        } else {
            track.name.as_str()
        };
        let first = track.points().next().and_then(|p| p.timestamp());
        let last = track.points().last().and_then(|p| p.timestamp());
        print!(
            "\t{}: {} points in {} segments",
            name,
            track.point_count(),
            track.segments.len()
        );
        if let (Some(first), Some(last)) = (first, last) {
            print!(
                " | {} to {}",
                first.format("%Y-%m-%d %H:%M:%S"),
                last.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!();
    }
    if let Some(mismatch) = batch.count_mismatch() {
        eprintln!("{}", mismatch);
    }
    println!("{:=<width$}", "", width = width);
}

fn save_tracks(save_dir: &Path, batch: &TrackBatch) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(save_dir)?;
    let path = save_dir.join(format!("tracks-{}.json", Utc::now().format("%Y%m%d%H%M%S")));
    std::fs::write(&path, serde_json::to_string_pretty(batch)?)?;
    log::info!("Saved tracks to {:?}", path);
    Ok(())
}
