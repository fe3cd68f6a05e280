use std::fs::File;
use std::io::{self, Read};

use rtspmux_frame::{ChannelAssignment, FrameReader};
use rtspmux_session::{RtspMessageParser, StreamDemultiplexer};
use tracing::{debug, info};

use crate::cmd::DumpArgs;
use crate::exit::{assignment_error, io_error, session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{OutputFormat, UnitPrinter, UnitRecord};

pub fn run(args: DumpArgs, format: OutputFormat) -> CliResult<i32> {
    let assignment = resolve_assignment(&args)?;
    let input = open_input(&args)?;

    let parser = RtspMessageParser::with_max_message_size(args.max_message_size);
    let mut demux = StreamDemultiplexer::new(FrameReader::new(input), parser);
    let mut printer = UnitPrinter::new(format);
    let mut printed = 0usize;

    let outcome = loop {
        if args.count.is_some_and(|count| printed >= count) {
            break Ok(());
        }
        match demux.next_unit() {
            Ok(unit) => {
                printer.print(&UnitRecord::from_unit(printed, &unit, &assignment));
                printed = printed.saturating_add(1);
            }
            Err(err) if err.is_closed() => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    // Units decoded before a failure are still shown.
    printer.finish();
    info!(units = printed, "dump finished");
    outcome.map_err(|err| session_error("dump failed", err))?;
    Ok(SUCCESS)
}

fn open_input(args: &DumpArgs) -> CliResult<Box<dyn Read>> {
    if args.input.as_os_str() == "-" {
        debug!("reading capture from stdin");
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(&args.input)
        .map_err(|err| io_error(&format!("failed opening {}", args.input.display()), err))?;
    Ok(Box::new(file))
}

fn resolve_assignment(args: &DumpArgs) -> CliResult<ChannelAssignment> {
    if let Some(tracks) = args.tracks {
        if tracks > 128 {
            return Err(CliError::new(USAGE, "--tracks must be at most 128"));
        }
        return Ok(ChannelAssignment::conventional(tracks));
    }

    let mut assignment = ChannelAssignment::new();
    for spec in args.assign.iter().flatten() {
        let (track, rtp, rtcp) = parse_pair(spec)?;
        assignment
            .assign(track, rtp, rtcp)
            .map_err(assignment_error)?;
    }
    Ok(assignment)
}

/// Parse `TRACK:RTP-RTCP`.
fn parse_pair(spec: &str) -> CliResult<(usize, u8, u8)> {
    let invalid = || CliError::new(USAGE, format!("invalid --assign entry {spec:?}, expected TRACK:RTP-RTCP"));

    let (track, channels) = spec.trim().split_once(':').ok_or_else(invalid)?;
    let (rtp, rtcp) = channels.split_once('-').ok_or_else(invalid)?;

    let track = track.trim().parse().map_err(|_| invalid())?;
    let rtp = rtp.trim().parse().map_err(|_| invalid())?;
    let rtcp = rtcp.trim().parse().map_err(|_| invalid())?;
    Ok((track, rtp, rtcp))
}
