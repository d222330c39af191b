use std::{
    ffi::OsStr,
    fmt::{self, Display, Formatter},
    fs::{remove_dir_all, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

use chrono::{DateTime, Utc};
use flate2::{write::GzEncoder, Compression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Raw sentences, one per line
    Nmea,
    /// JSON documents, one per line
    Json,
}

impl StoreKind {
    fn delimiter(&self) -> &'static [u8] {
        match self {
            StoreKind::Nmea => b"\r\n",
            StoreKind::Json => b"\n",
        }
    }
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StoreKind::Nmea => write!(f, "nmea"),
            StoreKind::Json => write!(f, "json"),
        }
    }
}

/// Appends records to one file per hour under one directory per day.
/// Finished days are archived to `.tar.gz` on a background thread.
#[derive(Debug)]
pub struct HourlyStore {
    root_dir: PathBuf,
    kind: StoreKind,
    current_dir: Option<PathBuf>,
    last_date: Option<String>,
    last_hour: Option<String>,
    writer: Option<File>,
    compress_tx: Option<mpsc::Sender<PathBuf>>,
    compress_hdl: Option<thread::JoinHandle<()>>,
}

impl Drop for HourlyStore {
    fn drop(&mut self) {
        // closing the channel lets the compression thread finish its queue
        self.compress_tx.take();
        if let Some(hdl) = self.compress_hdl.take() {
            let _ = hdl.join();
        }
    }
}

impl HourlyStore {
    pub fn new(root_dir: PathBuf, kind: StoreKind, compress: bool) -> Result<Self, io::Error> {
        std::fs::create_dir_all(&root_dir)?;
        let (compress_tx, compress_hdl) = if compress {
            let (tx, rx) = mpsc::channel::<PathBuf>();
            let hdl = thread::spawn(move || {
                log::info!("Compression thread started");
                for day_dir in rx {
                    archive(&day_dir);
                }
                log::info!("Compression thread exiting");
            });
            (Some(tx), Some(hdl))
        } else {
            (None, None)
        };
        Ok(Self {
            root_dir,
            kind,
            current_dir: None,
            last_date: None,
            last_hour: None,
            writer: None,
            compress_tx,
            compress_hdl,
        })
    }

    pub fn store(&mut self, tstamp: DateTime<Utc>, data: &[u8]) -> Result<(), io::Error> {
        let date = tstamp.format("%Y%m%d").to_string();
        let hour = tstamp.format("%H").to_string();
        if self.last_date.as_deref() != Some(&date) {
            let day_dir = self.root_dir.join(&date);
            std::fs::create_dir_all(&day_dir)?;
            if let Some(previous) = self.current_dir.replace(day_dir) {
                self.writer = None;
                if let Some(tx) = &self.compress_tx {
                    let _ = tx.send(previous);
                }
            }
            self.last_date = Some(date.clone());
            self.last_hour = None;
        }
        if self.last_hour.as_deref() != Some(&hour) {
            let dir = self.current_dir.as_deref().unwrap_or(&self.root_dir);
            let filename = dir.join(format!("{}{}0000.{}", &date, &hour, self.kind));
            self.writer = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(filename)?,
            );
            self.last_hour = Some(hour);
        }
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data)?;
                writer.write_all(self.kind.delimiter())?;
                writer.flush()
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "No file writer")),
        }
    }
}

/// Pack `day_dir` into `<day_dir>.tar.gz` and delete it
fn archive(day_dir: &Path) {
    let mut outfile = day_dir.to_path_buf();
    outfile.set_extension("tar.gz");
    log::info!("Compressing {day_dir:?} to {outfile:?}...");
    let result = File::create(&outfile).and_then(|file| {
        let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let root = day_dir.file_name().unwrap_or(OsStr::new("."));
        tar.append_dir_all(root, day_dir)?;
        tar.into_inner()?.finish()?;
        Ok(())
    });
    match result {
        Ok(()) => match remove_dir_all(day_dir) {
            Ok(()) => log::info!("Compression successful! Deleted {day_dir:?}"),
            Err(e) => log::warn!("Error deleting directory {day_dir:?}: {e:?}"),
        },
        Err(e) => log::warn!("Compression error {e:?}: {day_dir:?}"),
    }
}
