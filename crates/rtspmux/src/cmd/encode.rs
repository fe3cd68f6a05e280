use std::fs;

use rtspmux_frame::InterleavedFrame;
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let frame =
        InterleavedFrame::new(args.channel, payload).map_err(|err| frame_error("encode failed", err))?;

    debug!(channel = frame.channel(), len = frame.payload_len(), "encoded frame");
    print_raw(&frame.marshal()).map_err(|err| io_error("write failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
