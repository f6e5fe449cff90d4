//! Delta/absolute timestamp conversion.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// An event stamped with ticks since the previous event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent<M> {
    pub message: M,
    pub delta: u32,
}

/// An event stamped with ticks since the start of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteEvent<M> {
    pub message: M,
    pub tick: u64,
}

impl<M> TimedEvent<M> {
    pub fn new(message: M, delta: u32) -> Self {
        Self { message, delta }
    }
}

impl<M> AbsoluteEvent<M> {
    pub fn new(message: M, tick: u64) -> Self {
        Self { message, tick }
    }
}

/// Prefix-sum the deltas.
pub fn to_absolute<M: Clone>(events: &[TimedEvent<M>]) -> Vec<AbsoluteEvent<M>> {
    let mut tick = 0u64;
    events
        .iter()
        .map(|event| {
            tick += u64::from(event.delta);
            AbsoluteEvent::new(event.message.clone(), tick)
        })
        .collect()
}

/// Pairwise-difference the ticks. The first delta is the first tick.
///
/// This is the inverse of [`to_absolute`], not a sort: ticks must already
/// be non-decreasing.
pub fn to_delta<M: Clone>(events: &[AbsoluteEvent<M>]) -> Result<Vec<TimedEvent<M>>> {
    let mut previous = 0u64;
    events
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let delta = event
                .tick
                .checked_sub(previous)
                .ok_or(Error::UnorderedTimeline {
                    index,
                    tick: event.tick,
                    previous,
                })?;
            let delta = u32::try_from(delta).map_err(|_| Error::DeltaOverflow { delta })?;
            previous = event.tick;
            Ok(TimedEvent::new(event.message.clone(), delta))
        })
        .collect()
}

/// Convert a beat offset to ticks, rounding to the nearest tick.
pub fn beats_to_ticks(beats: f64, ticks_per_beat: u16) -> Result<u64> {
    if ticks_per_beat == 0 {
        return Err(Error::InvalidResolution(ticks_per_beat));
    }
    if !beats.is_finite() || beats < 0.0 {
        return Err(Error::InvalidOffset(beats));
    }
    Ok((beats * f64::from(ticks_per_beat)).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seq(deltas: &[u32]) -> Vec<TimedEvent<usize>> {
        deltas
            .iter()
            .enumerate()
            .map(|(i, &d)| TimedEvent::new(i, d))
            .collect()
    }

    #[test]
    fn absolute_is_prefix_sum() {
        let abs = to_absolute(&seq(&[10, 0, 5, 480]));
        let ticks: Vec<u64> = abs.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![10, 10, 15, 495]);
    }

    #[test]
    fn round_trip_is_identity() {
        for deltas in [
            vec![0],
            vec![7],
            vec![0, 0, 0],
            vec![480, 0, 240, 240, 0, 960],
            vec![u32::MAX, 0, 1],
        ] {
            let original = seq(&deltas);
            let back = to_delta(&to_absolute(&original)).unwrap();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn empty_sequences_convert_to_empty() {
        assert!(to_absolute::<usize>(&[]).is_empty());
        assert!(to_delta::<usize>(&[]).unwrap().is_empty());
    }

    #[test]
    fn unordered_ticks_are_rejected() {
        let abs = vec![AbsoluteEvent::new('a', 10), AbsoluteEvent::new('b', 5)];
        assert!(matches!(
            to_delta(&abs),
            Err(Error::UnorderedTimeline { index: 1, tick: 5, previous: 10 })
        ));
    }

    #[test]
    fn oversized_gap_overflows() {
        let abs = vec![AbsoluteEvent::new('a', u64::from(u32::MAX) + 1)];
        assert!(matches!(to_delta(&abs), Err(Error::DeltaOverflow { .. })));
    }

    #[test]
    fn beats_round_to_nearest_tick() {
        assert_eq!(beats_to_ticks(1.0, 96).unwrap(), 96);
        assert_eq!(beats_to_ticks(0.0, 480).unwrap(), 0);
        assert_eq!(beats_to_ticks(1.0 / 3.0, 480).unwrap(), 160);
        assert_eq!(beats_to_ticks(0.999, 96).unwrap(), 96);
        assert_eq!(beats_to_ticks(2.5, 1).unwrap(), 3);
    }

    #[test]
    fn invalid_beats_and_resolution() {
        assert!(matches!(beats_to_ticks(1.0, 0), Err(Error::InvalidResolution(0))));
        assert!(matches!(beats_to_ticks(-0.5, 480), Err(Error::InvalidOffset(_))));
        assert!(matches!(beats_to_ticks(f64::NAN, 480), Err(Error::InvalidOffset(_))));
    }
}
