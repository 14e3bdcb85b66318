//! Timedtext XML parsing.
//!
//! Two shapes are served by YouTube:
//! `<transcript><text start=".." dur="..">` with seconds, and
//! `<timedtext format="3"><body><p t=".." d="..">` with milliseconds.

use crate::error::FetchError;
use crate::transcript::RawSegment;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Clone, Copy, PartialEq)]
enum Unit {
    Seconds,
    Millis,
}

/// Parse a timedtext document into raw cues.
///
/// XML escaping is removed; HTML entities inside the cue text are left for
/// normalization.
pub fn parse_timedtext(xml: &str) -> Result<Vec<RawSegment>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<(RawSegment, Unit)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if let Some(unit) = cue_unit(e) {
                    current = Some((read_timing(e, unit), unit));
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(unit) = cue_unit(e) {
                    segments.push(read_timing(e, unit));
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some((seg, _)) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                    seg.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some((seg, _)) = current.as_mut() {
                    seg.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let closes_cue = match current {
                    Some((_, Unit::Seconds)) => name.as_ref() == b"text",
                    Some((_, Unit::Millis)) => name.as_ref() == b"p",
                    None => false,
                };
                if closes_cue {
                    if let Some((seg, _)) = current.take() {
                        segments.push(seg);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::transport(format!(
                    "Error parsing caption XML: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(segments)
}

fn cue_unit(e: &BytesStart) -> Option<Unit> {
    match e.name().as_ref() {
        b"text" => Some(Unit::Seconds),
        b"p" => Some(Unit::Millis),
        _ => None,
    }
}

fn read_timing(e: &BytesStart, unit: Unit) -> RawSegment {
    let (start_key, dur_key): (&[u8], &[u8]) = match unit {
        Unit::Seconds => (b"start", b"dur"),
        Unit::Millis => (b"t", b"d"),
    };
    let divisor = match unit {
        Unit::Seconds => 1.0,
        Unit::Millis => 1000.0,
    };

    let mut seg = RawSegment::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
        if attr.key.as_ref() == start_key {
            seg.start = value.map(|v| v / divisor);
        } else if attr.key.as_ref() == dur_key {
            seg.duration = value.map(|v| v / divisor);
        }
    }
    seg
}
