//! Marker interleaving.
//!
//! Chord and key annotations become marker events merged into an existing
//! delta-encoded track by absolute tick. Original events keep their order
//! and spacing; only the markers are placed.

use crate::annotations::ChordAnnotation;
use crate::chord::{normalize, Chord, SEPARATOR};
use crate::pitch::normalize_flats;
use crate::timeline::{beats_to_ticks, to_absolute, to_delta, AbsoluteEvent, TimedEvent};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A message type markers can be merged into.
pub trait Annotatable: Clone {
    /// Build a marker carrying `text`.
    fn marker(text: String) -> Self;

    /// Whether this message starts a sounding note.
    fn is_note_on(&self) -> bool;
}

/// Where a marker goes relative to original events on the same tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// After every original event on the same tick.
    Stable,
    /// Before the first same-tick note-on, after any other same-tick event.
    #[default]
    BeforeNoteOn,
}

/// How marker text is spelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerFormat {
    /// Prepended to chord markers, e.g. `Chord` gives `Chord_C_major`.
    #[serde(default)]
    pub chord_prefix: Option<String>,
    /// Prepended to the key marker.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl MarkerFormat {
    pub fn chord_text(&self, chord: &Chord) -> String {
        with_prefix(self.chord_prefix.as_deref(), &chord.to_string())
    }

    /// Key text keeps its case (major uppercase, minor lowercase); only flats are respelled.
    pub fn key_text(&self, key: &str) -> String {
        with_prefix(self.key_prefix.as_deref(), &normalize_flats(key.trim()))
    }
}

fn with_prefix(prefix: Option<&str>, text: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{SEPARATOR}{text}"),
        _ => text.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterleaveOptions {
    #[serde(default)]
    pub format: MarkerFormat,
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Markers ready to merge, in append order, plus the figures that did not normalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerPlan {
    pub markers: Vec<AbsoluteEvent<String>>,
    pub dropped: Vec<String>,
}

/// Turn annotations into marker texts at absolute ticks.
///
/// The key marker (if any) comes first at tick 0, then chords in input
/// order. Offsets are validated before normalization, so a negative offset
/// is an error even on a figure that would have been dropped.
pub fn plan_markers(
    chords: &[ChordAnnotation],
    key: Option<&str>,
    ticks_per_beat: u16,
    format: &MarkerFormat,
) -> Result<MarkerPlan> {
    if ticks_per_beat == 0 {
        return Err(Error::InvalidResolution(ticks_per_beat));
    }

    let mut plan = MarkerPlan::default();

    if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
        plan.markers.push(AbsoluteEvent::new(format.key_text(key), 0));
    }

    for annotation in chords {
        let tick = beats_to_ticks(annotation.offset, ticks_per_beat)?;
        match normalize(&annotation.figure) {
            Some(chord) => plan
                .markers
                .push(AbsoluteEvent::new(format.chord_text(&chord), tick)),
            None => plan.dropped.push(annotation.figure.clone()),
        }
    }

    Ok(plan)
}

/// Merge markers into an absolute-time track.
///
/// `events` must be ordered by tick (as produced by [`to_absolute`]).
/// Markers are stably ordered by tick first, then each one is emitted
/// just before the first original event it must precede under `tie_break`.
pub fn merge_markers<M: Annotatable>(
    events: &[AbsoluteEvent<M>],
    markers: &[AbsoluteEvent<String>],
    tie_break: TieBreak,
) -> Vec<AbsoluteEvent<M>> {
    let mut pending: Vec<&AbsoluteEvent<String>> = markers.iter().collect();
    pending.sort_by_key(|m| m.tick);

    let precedes = |marker_tick: u64, event: &AbsoluteEvent<M>| match tie_break {
        TieBreak::Stable => marker_tick < event.tick,
        TieBreak::BeforeNoteOn => {
            marker_tick < event.tick || (marker_tick == event.tick && event.message.is_note_on())
        }
    };

    let mut merged = Vec::with_capacity(events.len() + pending.len());
    let mut next_marker = pending.into_iter().peekable();

    for event in events {
        while let Some(marker) = next_marker.next_if(|m| precedes(m.tick, event)) {
            merged.push(AbsoluteEvent::new(M::marker(marker.message.clone()), marker.tick));
        }
        merged.push(event.clone());
    }
    merged.extend(
        next_marker.map(|marker| AbsoluteEvent::new(M::marker(marker.message.clone()), marker.tick)),
    );

    merged
}

/// Interleave chord and key markers into a delta-encoded track.
///
/// An empty track is returned unchanged: there is no timeline to anchor to.
/// Figures that do not normalize are skipped. A zero resolution or a
/// negative or non-finite offset is an error.
pub fn interleave<M: Annotatable>(
    events: &[TimedEvent<M>],
    chords: &[ChordAnnotation],
    key: Option<&str>,
    ticks_per_beat: u16,
    options: &InterleaveOptions,
) -> Result<Vec<TimedEvent<M>>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let plan = plan_markers(chords, key, ticks_per_beat, &options.format)?;
    apply_plan(events, &plan, options.tie_break)
}

/// Merge an already-built plan into a delta-encoded track.
pub fn apply_plan<M: Annotatable>(
    events: &[TimedEvent<M>],
    plan: &MarkerPlan,
    tie_break: TieBreak,
) -> Result<Vec<TimedEvent<M>>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let absolute = to_absolute(events);
    let merged = merge_markers(&absolute, &plan.markers, tie_break);
    to_delta(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Msg {
        NoteOn(u8),
        NoteOff(u8),
        Control,
        Marker(String),
    }

    impl Annotatable for Msg {
        fn marker(text: String) -> Self {
            Msg::Marker(text)
        }

        fn is_note_on(&self) -> bool {
            matches!(self, Msg::NoteOn(_))
        }
    }

    fn marker(text: &str) -> Msg {
        Msg::Marker(text.to_string())
    }

    fn ev(message: Msg, delta: u32) -> TimedEvent<Msg> {
        TimedEvent::new(message, delta)
    }

    fn chord(figure: &str, offset: f64) -> ChordAnnotation {
        ChordAnnotation::new(figure, offset)
    }

    fn stable() -> InterleaveOptions {
        InterleaveOptions {
            tie_break: TieBreak::Stable,
            ..Default::default()
        }
    }

    #[test]
    fn marker_precedes_same_tick_note_on() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 480)];
        let out = interleave(
            &events,
            &[chord("Cmaj7", 0.0)],
            None,
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ev(marker("C_major-seventh"), 0),
                ev(Msg::NoteOn(60), 0),
                ev(Msg::NoteOff(60), 480),
            ]
        );
    }

    #[test]
    fn stable_policy_appends_after_same_tick_events() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 480)];
        let out = interleave(&events, &[chord("Cmaj7", 0.0)], None, 480, &stable()).unwrap();

        assert_eq!(
            out,
            vec![
                ev(Msg::NoteOn(60), 0),
                ev(marker("C_major-seventh"), 0),
                ev(Msg::NoteOff(60), 480),
            ]
        );
    }

    #[test]
    fn before_note_on_goes_after_other_same_tick_events() {
        // tick 480: note-off, control, note-on
        let events = vec![
            ev(Msg::NoteOn(60), 0),
            ev(Msg::NoteOff(60), 480),
            ev(Msg::Control, 0),
            ev(Msg::NoteOn(62), 0),
            ev(Msg::NoteOff(62), 480),
        ];
        let out = interleave(
            &events,
            &[chord("Dm", 1.0)],
            None,
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ev(Msg::NoteOn(60), 0),
                ev(Msg::NoteOff(60), 480),
                ev(Msg::Control, 0),
                ev(marker("D_minor"), 0),
                ev(Msg::NoteOn(62), 0),
                ev(Msg::NoteOff(62), 480),
            ]
        );
    }

    #[test]
    fn hyphen_flat_figure_lands_on_its_beat() {
        let events = vec![ev(Msg::NoteOn(61), 0), ev(Msg::NoteOff(61), 192)];
        let out = interleave(
            &events,
            &[chord("Db-7", 1.0)],
            None,
            96,
            &InterleaveOptions::default(),
        )
        .unwrap();

        let absolute = to_absolute(&out);
        let placed: Vec<(u64, Msg)> = absolute
            .into_iter()
            .map(|e| (e.tick, e.message))
            .filter(|(_, m)| matches!(m, Msg::Marker(_)))
            .collect();
        assert_eq!(placed, vec![(96, marker("Db_dominant-seventh"))]);
    }

    #[test]
    fn non_chords_are_dropped() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 960)];
        let out = interleave(
            &events,
            &[chord("N.C.", 2.0)],
            None,
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();
        assert_eq!(out, events);
    }

    #[test]
    fn key_marker_comes_first_at_zero() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 480)];
        let out = interleave(
            &events,
            &[chord("C", 0.0)],
            Some("E-"),
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ev(marker("Eb"), 0),
                ev(marker("C_major"), 0),
                ev(Msg::NoteOn(60), 0),
                ev(Msg::NoteOff(60), 480),
            ]
        );
    }

    #[test]
    fn prefixes_are_joined_with_separator() {
        let options = InterleaveOptions {
            format: MarkerFormat {
                chord_prefix: Some("Chord".into()),
                key_prefix: Some("Key".into()),
            },
            ..Default::default()
        };
        let events = vec![ev(Msg::Control, 0)];
        let out = interleave(&events, &[chord("Am7", 0.0)], Some("a"), 480, &options).unwrap();

        let texts: Vec<Msg> = out.into_iter().map(|e| e.message).collect();
        assert_eq!(
            texts,
            vec![Msg::Control, marker("Key_a"), marker("Chord_A_minor-seventh")]
        );
    }

    #[test]
    fn markers_past_the_end_are_appended() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 480)];
        let out = interleave(
            &events,
            &[chord("G7", 4.0)],
            None,
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();
        assert_eq!(out.last(), Some(&ev(marker("G_dominant-seventh"), 1440)));
    }

    #[test]
    fn same_tick_markers_keep_input_order() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 960)];
        let chords = [chord("F", 1.0), chord("C", 0.5), chord("G", 1.0)];

        let first = interleave(&events, &chords, None, 480, &InterleaveOptions::default()).unwrap();
        let second = interleave(&events, &chords, None, 480, &InterleaveOptions::default()).unwrap();
        assert_eq!(first, second);

        let markers: Vec<Msg> = first
            .into_iter()
            .map(|e| e.message)
            .filter(|m| matches!(m, Msg::Marker(_)))
            .collect();
        assert_eq!(
            markers,
            vec![marker("C_major"), marker("F_major"), marker("G_major")]
        );
    }

    #[test]
    fn output_ticks_never_decrease() {
        let events = vec![
            ev(Msg::NoteOn(60), 10),
            ev(Msg::NoteOff(60), 100),
            ev(Msg::NoteOn(64), 0),
            ev(Msg::NoteOff(64), 333),
        ];
        let chords = [
            chord("Em", 3.0),
            chord("C", 0.0),
            chord("Bogus", 1.0),
            chord("A7", 0.9),
        ];
        for options in [stable(), InterleaveOptions::default()] {
            let out = interleave(&events, &chords, Some("C"), 120, &options).unwrap();
            let ticks: Vec<u64> = to_absolute(&out).iter().map(|e| e.tick).collect();
            assert!(ticks.windows(2).all(|w| w[0] <= w[1]), "{ticks:?}");

            let originals: Vec<TimedEvent<Msg>> = to_absolute(&out)
                .into_iter()
                .filter(|e| !matches!(e.message, Msg::Marker(_)))
                .map(|e| TimedEvent::new(e.message, e.tick as u32))
                .collect();
            let expected: Vec<TimedEvent<Msg>> = to_absolute(&events)
                .into_iter()
                .map(|e| TimedEvent::new(e.message, e.tick as u32))
                .collect();
            assert_eq!(originals, expected);
        }
    }

    #[test]
    fn empty_track_is_a_no_op() {
        let out = interleave::<Msg>(
            &[],
            &[chord("C", 0.0)],
            Some("C"),
            480,
            &InterleaveOptions::default(),
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn contract_violations_are_errors() {
        let events = vec![ev(Msg::NoteOn(60), 0)];
        let options = InterleaveOptions::default();

        assert!(matches!(
            interleave(&events, &[chord("C", 0.0)], None, 0, &options),
            Err(Error::InvalidResolution(0))
        ));
        assert!(matches!(
            interleave(&events, &[chord("N.C.", -1.0)], None, 480, &options),
            Err(Error::InvalidOffset(_))
        ));
    }

    #[test]
    fn caller_sequence_is_untouched() {
        let events = vec![ev(Msg::NoteOn(60), 0), ev(Msg::NoteOff(60), 480)];
        let snapshot = events.clone();
        let _ = interleave(&events, &[chord("C", 0.5)], None, 480, &stable()).unwrap();
        assert_eq!(events, snapshot);
    }

    #[test]
    fn plan_reports_dropped_figures() {
        let plan = plan_markers(
            &[chord("C", 0.0), chord("N.C.", 1.0), chord("Qwerty", 2.0)],
            Some("g"),
            480,
            &MarkerFormat::default(),
        )
        .unwrap();

        assert_eq!(
            plan.markers,
            vec![
                AbsoluteEvent::new("g".to_string(), 0),
                AbsoluteEvent::new("C_major".to_string(), 0),
            ]
        );
        assert_eq!(plan.dropped, vec!["N.C.".to_string(), "Qwerty".to_string()]);
    }
}
