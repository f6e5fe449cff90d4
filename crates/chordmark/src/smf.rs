//! Standard MIDI File adapter.
//!
//! Decodes one track of a parsed `midly::Smf` into the interleaver's event
//! list, and encodes the result back into a writable file. The trailing
//! end-of-track event is held aside while markers are merged, so a marker
//! after the last note never lands behind it.

use crate::annotations::ScoreAnnotations;
use crate::interleave::{apply_plan, plan_markers, Annotatable, InterleaveOptions};
use crate::timeline::{to_absolute, TimedEvent};
use crate::{Error, Result};
use midly::num::u28;
use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest delta a track event can carry (28-bit variable-length quantity).
pub const MAX_DELTA: u32 = (1 << 28) - 1;

/// A track message: either an event from the source file or a new marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<'a> {
    Event(TrackEventKind<'a>),
    Marker(String),
}

impl Annotatable for Message<'_> {
    fn marker(text: String) -> Self {
        Message::Marker(text)
    }

    fn is_note_on(&self) -> bool {
        matches!(
            self,
            Message::Event(TrackEventKind::Midi {
                message: MidiMessage::NoteOn { vel, .. },
                ..
            }) if vel.as_int() > 0
        )
    }
}

/// A track split into its events and the absolute tick of its end-of-track.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTrack<'a> {
    pub events: Vec<TimedEvent<Message<'a>>>,
    pub end_of_track: Option<u64>,
}

pub fn decode_track<'a>(track: &[TrackEvent<'a>]) -> DecodedTrack<'a> {
    let mut events: Vec<TimedEvent<Message<'a>>> = track
        .iter()
        .map(|event| TimedEvent::new(Message::Event(event.kind), event.delta.as_int()))
        .collect();

    let ends_with_eot = matches!(
        events.last(),
        Some(TimedEvent {
            message: Message::Event(TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ..
        })
    );

    let end_of_track = if ends_with_eot {
        let end = to_absolute(&events).last().map(|e| e.tick);
        events.pop();
        end
    } else {
        None
    };

    DecodedTrack {
        events,
        end_of_track,
    }
}

/// Encode events back into a `midly` track, re-appending end-of-track.
///
/// End-of-track goes at its original tick, or right after the last event
/// when markers now extend past it.
pub fn encode_track<'b>(
    events: &'b [TimedEvent<Message<'_>>],
    end_of_track: Option<u64>,
) -> Result<Track<'b>> {
    let mut track: Track<'b> = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;

    for event in events {
        let kind = match &event.message {
            Message::Event(kind) => *kind,
            Message::Marker(text) => TrackEventKind::Meta(MetaMessage::Marker(text.as_bytes())),
        };
        track.push(TrackEvent {
            delta: to_u28(u64::from(event.delta))?,
            kind,
        });
        last_tick += u64::from(event.delta);
    }

    if let Some(end) = end_of_track {
        track.push(TrackEvent {
            delta: to_u28(end.saturating_sub(last_tick))?,
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
    }

    Ok(track)
}

fn to_u28(delta: u64) -> Result<u28> {
    match u32::try_from(delta) {
        Ok(d) if d <= MAX_DELTA => Ok(u28::new(d)),
        _ => Err(Error::DeltaOverflow { delta }),
    }
}

/// Time resolution of a metrical file. SMPTE timecode files are rejected.
pub fn ticks_per_beat(smf: &Smf) -> Result<u16> {
    match smf.header.timing {
        Timing::Metrical(ticks) => Ok(ticks.as_int()),
        Timing::Timecode(fps, subframe) => Err(Error::UnsupportedTiming(format!(
            "SMPTE {} fps, {} ticks/frame",
            fps.as_f32(),
            subframe
        ))),
    }
}

/// Pick the track to annotate.
///
/// An explicit index must exist. Otherwise the first track with a sounding
/// note-on wins, falling back to track 0.
pub fn select_track(smf: &Smf, requested: Option<usize>) -> Result<usize> {
    let count = smf.tracks.len();
    if let Some(index) = requested {
        return if index < count {
            Ok(index)
        } else {
            Err(Error::TrackOutOfRange { index, count })
        };
    }
    if count == 0 {
        return Err(Error::TrackOutOfRange { index: 0, count });
    }

    let with_notes = smf.tracks.iter().position(|track| {
        track
            .iter()
            .any(|event| Message::Event(event.kind).is_note_on())
    });
    Ok(with_notes.unwrap_or(0))
}

/// Options for annotating a whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateOptions {
    #[serde(flatten)]
    pub interleave: InterleaveOptions,
    /// Track to annotate; `None` picks the first track with notes.
    #[serde(default)]
    pub track: Option<usize>,
}

/// What happened to one file's annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationReport {
    pub track: usize,
    pub ticks_per_beat: u16,
    pub placed: usize,
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnnotatedSmf {
    pub bytes: Vec<u8>,
    pub report: AnnotationReport,
}

/// Parse MIDI bytes, add markers to one track, and re-encode.
pub fn annotate_smf(
    bytes: &[u8],
    annotations: &ScoreAnnotations,
    options: &AnnotateOptions,
) -> Result<AnnotatedSmf> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;
    let ticks_per_beat = ticks_per_beat(&smf)?;
    let index = select_track(&smf, options.track)?;

    let decoded = decode_track(&smf.tracks[index]);
    let plan = plan_markers(
        &annotations.chords,
        annotations.key.as_deref(),
        ticks_per_beat,
        &options.interleave.format,
    )?;
    for figure in &plan.dropped {
        debug!(figure = %figure, "chord figure does not normalize, skipping");
    }

    let merged = if decoded.events.is_empty() {
        debug!(track = index, "track has no events, leaving it unannotated");
        decoded.events.clone()
    } else {
        apply_plan(&decoded.events, &plan, options.interleave.tie_break)?
    };
    let placed = merged.len() - decoded.events.len();

    let mut tracks: Vec<Track<'_>> = smf.tracks.clone();
    tracks[index] = encode_track(&merged, decoded.end_of_track)?;

    let mut out = Smf::new(smf.header);
    out.tracks = tracks;

    let mut buf = Vec::new();
    out.write_std(&mut buf)
        .map_err(|e| Error::MidiWrite(e.to_string()))?;

    Ok(AnnotatedSmf {
        bytes: buf,
        report: AnnotationReport {
            track: index,
            ticks_per_beat,
            placed,
            dropped: plan.dropped,
        },
    })
}

/// One line per event: track, absolute tick, delta and a readable message.
pub fn dump(bytes: &[u8]) -> Result<Vec<String>> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;
    let mut lines = Vec::new();

    for (index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            lines.push(format!(
                "track={} tick={} delta={} {}",
                index,
                tick,
                event.delta.as_int(),
                describe(&event.kind)
            ));
        }
    }

    Ok(lines)
}

fn describe(kind: &TrackEventKind<'_>) -> String {
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    match *kind {
        TrackEventKind::Meta(MetaMessage::Marker(bytes)) => format!("marker {:?}", text(bytes)),
        TrackEventKind::Meta(MetaMessage::Text(bytes)) => format!("text {:?}", text(bytes)),
        TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
            format!("track_name {:?}", text(bytes))
        }
        TrackEventKind::Meta(MetaMessage::EndOfTrack) => "end_of_track".to_string(),
        TrackEventKind::Midi { channel, message } => match message {
            MidiMessage::NoteOn { key, vel } => format!(
                "note_on channel={} note={} velocity={}",
                channel.as_int(),
                key.as_int(),
                vel.as_int()
            ),
            MidiMessage::NoteOff { key, vel } => format!(
                "note_off channel={} note={} velocity={}",
                channel.as_int(),
                key.as_int(),
                vel.as_int()
            ),
            other => format!("channel={} {:?}", channel.as_int(), other),
        },
        other => format!("{other:?}"),
    }
}
