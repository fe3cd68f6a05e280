use clap::{Args, Subcommand};
use std::path::PathBuf;

use rtspmux_session::DEFAULT_MAX_MESSAGE_SIZE;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod dump;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Demultiplex a captured interleaved stream and print every unit.
    Dump(DumpArgs),
    /// Write one interleaved frame to stdout.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Dump(args) => dump::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Capture file to read, or `-` for stdin.
    pub input: PathBuf,
    /// Assume the conventional layout for N tracks (track n on channels 2n, 2n+1).
    #[arg(long, conflicts_with = "assign")]
    pub tracks: Option<usize>,
    /// Explicit channel pairs, e.g. `0:0-1,1:6-7` (TRACK:RTP-RTCP).
    #[arg(long, value_delimiter = ',')]
    pub assign: Option<Vec<String>>,
    /// Exit after printing N units.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest RTSP message accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Channel to frame the payload on.
    #[arg(long, short = 'c')]
    pub channel: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
