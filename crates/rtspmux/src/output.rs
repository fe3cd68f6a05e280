use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtspmux_frame::{ChannelLookup, InterleavedFrame};
use rtspmux_session::{RtspMessage, Unit};
use serde::Serialize;

const PREVIEW_BYTES: usize = 16;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One demultiplexed unit, as printed by `dump`.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct UnitRecord {
    pub index: usize,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cseq: Option<u32>,
    pub size: usize,
    pub summary: String,
}

impl UnitRecord {
    pub fn from_unit(index: usize, unit: &Unit<RtspMessage>, lookup: &impl ChannelLookup) -> Self {
        match unit {
            Unit::Message(message) => Self::from_message(index, message),
            Unit::Frame(frame) => Self::from_frame(index, frame, lookup),
        }
    }

    fn from_message(index: usize, message: &RtspMessage) -> Self {
        Self {
            index,
            kind: "message",
            channel: None,
            track: None,
            stream: None,
            cseq: message.cseq(),
            size: message.body.len(),
            summary: message.start_line.clone(),
        }
    }

    fn from_frame(index: usize, frame: &InterleavedFrame, lookup: &impl ChannelLookup) -> Self {
        let route = lookup.lookup(frame.channel());
        Self {
            index,
            kind: "frame",
            channel: Some(frame.channel()),
            track: route.map(|route| route.track),
            stream: Some(route.map_or("unassigned", |route| route.kind.as_str())),
            cseq: None,
            size: frame.payload_len(),
            summary: payload_preview(frame.payload()),
        }
    }
}

/// Prints records as they arrive; the table format is emitted once at the end.
pub struct UnitPrinter {
    format: OutputFormat,
    table: Option<Table>,
    rows: usize,
}

impl UnitPrinter {
    pub fn new(format: OutputFormat) -> Self {
        let table = match format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["#", "KIND", "CHANNEL", "TRACK", "STREAM", "SIZE", "SUMMARY"]);
                Some(table)
            }
            OutputFormat::Json | OutputFormat::Pretty => None,
        };
        Self {
            format,
            table,
            rows: 0,
        }
    }

    pub fn print(&mut self, record: &UnitRecord) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Pretty => println!("{}", pretty_line(record)),
            OutputFormat::Table => {
                if let Some(table) = &mut self.table {
                    table.add_row(vec![
                        record.index.to_string(),
                        record.kind.to_string(),
                        optional(record.channel),
                        optional(record.track),
                        record.stream.unwrap_or("-").to_string(),
                        record.size.to_string(),
                        record.summary.clone(),
                    ]);
                    self.rows += 1;
                }
            }
        }
    }

    pub fn finish(self) {
        if let Some(table) = self.table {
            if self.rows > 0 {
                println!("{table}");
            }
        }
    }
}

fn pretty_line(record: &UnitRecord) -> String {
    match record.channel {
        Some(channel) => format!(
            "#{} frame channel={} track={} stream={} size={} payload={}",
            record.index,
            channel,
            optional(record.track),
            record.stream.unwrap_or("-"),
            record.size,
            record.summary
        ),
        None => format!(
            "#{} message cseq={} body={} {}",
            record.index,
            optional(record.cseq),
            record.size,
            record.summary
        ),
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

pub fn print_raw(data: &[u8]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(data)?;
    out.flush()
}

/// Hex dump of the first bytes of a payload.
fn payload_preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PREVIEW_BYTES)];
    let mut preview = shown
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if payload.len() > PREVIEW_BYTES {
        preview.push_str(" ...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use rtspmux_frame::ChannelAssignment;

    use super::*;

    #[test]
    fn frame_record_carries_route() {
        let frame = InterleavedFrame::new(3, vec![0x80, 0xC8]).unwrap();
        let record = UnitRecord::from_unit(7, &Unit::Frame(frame), &ChannelAssignment::conventional(2));

        assert_eq!(record.kind, "frame");
        assert_eq!(record.channel, Some(3));
        assert_eq!(record.track, Some(1));
        assert_eq!(record.stream, Some("rtcp"));
        assert_eq!(record.summary, "80 c8");
    }

    #[test]
    fn unassigned_frame_is_labelled() {
        let frame = InterleavedFrame::new(9, vec![0u8; 20]).unwrap();
        let record = UnitRecord::from_unit(0, &Unit::Frame(frame), &ChannelAssignment::new());

        assert_eq!(record.track, None);
        assert_eq!(record.stream, Some("unassigned"));
        assert!(record.summary.ends_with(" ..."));
    }

    #[test]
    fn message_record_json_skips_frame_fields() {
        let message = RtspMessage::new("RTSP/1.0 200 OK").with_header("CSeq", "4");
        let record = UnitRecord::from_unit(0, &Unit::Message(message), &ChannelAssignment::new());

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"index":0,"kind":"message","cseq":4,"size":0,"summary":"RTSP/1.0 200 OK"}"#
        );
    }
}
