//! Standard MIDI File (format 1) model and writer.
//!
//! Tracks collect events with absolute ticks and a [`Priority`]. On write,
//! each track is merged with the file's global events, ordered by tick and
//! then by priority, and closed with a single end-of-track.

pub mod event;
pub mod track;

pub use event::{write_varlen, EmitState, EventKind, MidiEvent, Priority};
pub use track::MidiTrack;

use byteorder::{WriteBytesExt, BE};
use std::io::{self, Write};

pub const DEFAULT_PPQN: u16 = 48;

#[derive(Clone, Debug)]
pub struct MidiFile {
    pub ppqn: u16,
    pub tracks: Vec<MidiTrack>,
    /// Events merged into every track when it is written.
    pub global: Vec<MidiEvent>,
}

impl Default for MidiFile {
    fn default() -> Self {
        Self::new(DEFAULT_PPQN)
    }
}

impl MidiFile {
    pub fn new(ppqn: u16) -> Self {
        Self {
            ppqn,
            tracks: Vec::new(),
            global: Vec::new(),
        }
    }

    pub fn insert_global_transpose(&mut self, time: u32, semitones: i8) {
        self.global
            .push(MidiEvent::new(time, 0, EventKind::GlobalTranspose(semitones)));
    }

    /// Events of `track` merged with the global ones, in output order,
    /// followed by the end-of-track.
    pub fn ordered_events(&self, track: &MidiTrack) -> Vec<MidiEvent> {
        let mut events: Vec<&MidiEvent> = track
            .events()
            .iter()
            .filter(|e| e.kind != EventKind::EndOfTrack)
            .chain(self.global.iter())
            .collect();
        events.sort_by_key(|e| e.priority);
        events.sort_by_key(|e| e.time);

        let end = events
            .iter()
            .map(|e| e.time)
            .max()
            .unwrap_or(0)
            .max(track.delta());
        let mut out: Vec<MidiEvent> = events.into_iter().cloned().collect();
        out.push(MidiEvent::new(end, 0, EventKind::EndOfTrack));
        out
    }

    fn track_bytes(&self, track: &MidiTrack) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut state = EmitState::default();
        let mut last = 0;
        for event in self.ordered_events(track) {
            last = event.write(&mut buf, last, &mut state);
        }
        buf
    }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(b"MThd")?;
        w.write_u32::<BE>(6)?;
        w.write_u16::<BE>(1)?;
        w.write_u16::<BE>(self.tracks.len() as u16)?;
        w.write_u16::<BE>(self.ppqn)?;

        for track in &self.tracks {
            let body = self.track_bytes(track);
            w.write_all(b"MTrk")?;
            w.write_u32::<BE>(body.len() as u32)?;
            w.write_all(&body)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf).expect("writing to a Vec cannot fail");
        buf
    }
}
