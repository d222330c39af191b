use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use argh::FromArgs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Stored recorder configuration
pub struct RecorderCfg {
    /// Serial device
    pub serial_port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Directory data is saved under
    pub save_dir: PathBuf,
}

impl Default for RecorderCfg {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".into(),
            baud_rate: 4800,
            timeout_ms: 100,
            save_dir: PathBuf::from("."),
        }
    }
}

impl RecorderCfg {
    /// Read timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Override stored values with whatever was given on the command line
    pub fn merge(&mut self, args: &Args) {
        if let Some(port) = &args.port {
            self.serial_port = port.clone();
        }
        if let Some(baud) = args.baud {
            self.baud_rate = baud;
        }
        if let Some(timeout) = args.timeout {
            self.timeout_ms = timeout;
        }
        if let Some(dir) = &args.save_dir {
            self.save_dir = dir.clone();
        }
    }

    /// Store the configuration at `path`
    pub fn store(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }

    /// Load the configuration from `path`
    pub fn load(path: &Path) -> Result<Self, io::Error> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Store the configuration in the default location
    pub fn store_default(&self) -> Result<(), io::Error> {
        self.store(&default_path())
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self, io::Error> {
        Self::load(&default_path())
    }
}

fn default_path() -> PathBuf {
    let dir = match ProjectDirs::from("", "", "garmin_gps_recorder") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from("."),
    };
    dir.join("config.json")
}

#[derive(FromArgs, Debug)]
/// Record positions and download tracks from a Garmin GPS receiver
pub struct Args {
    /// serial device
    #[argh(option, short = 'p')]
    pub port: Option<String>,
    /// baud rate
    #[argh(option, short = 'b')]
    pub baud: Option<u32>,
    /// read timeout in milliseconds
    #[argh(option)]
    pub timeout: Option<u64>,
    /// save data to this directory
    #[argh(option)]
    pub save_dir: Option<PathBuf>,
    /// store the merged configuration as the new default
    #[argh(switch)]
    pub save_config: bool,
    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Command {
    Listen(ListenCmd),
    Tracks(TracksCmd),
    Replay(ReplayCmd),
    Detect(DetectCmd),
}

#[derive(FromArgs, Debug)]
/// Decode NMEA sentences until interrupted, saving every position update
#[argh(subcommand, name = "listen")]
pub struct ListenCmd {
    /// do not save raw sentences
    #[argh(switch)]
    pub no_raw: bool,
}

#[derive(FromArgs, Debug)]
/// Download the tracks stored on the receiver
#[argh(subcommand, name = "tracks")]
pub struct TracksCmd {}

#[derive(FromArgs, Debug)]
/// Decode a captured track transfer
#[argh(subcommand, name = "replay")]
pub struct ReplayCmd {
    /// capture file
    #[argh(positional)]
    pub file: PathBuf,
    /// save the decoded tracks as JSON
    #[argh(switch)]
    pub save: bool,
}

#[derive(FromArgs, Debug)]
/// Scan serial ports for a receiver sending NMEA
#[argh(subcommand, name = "detect")]
pub struct DetectCmd {
    /// how long to listen on each port and baud rate, in milliseconds
    #[argh(option, default = "1700")]
    pub wait_ms: u64,
    /// stop at the first receiver found
    #[argh(switch)]
    pub first: bool,
}
