use crate::event::*;

pub const CC_MODULATION: u8 = 1;
pub const CC_PORTAMENTO_TIME: u8 = 5;
pub const CC_DATA_ENTRY: u8 = 6;
pub const CC_VOLUME: u8 = 7;
pub const CC_PAN: u8 = 10;
pub const CC_EXPRESSION: u8 = 11;
pub const CC_DATA_ENTRY_LSB: u8 = 38;
pub const CC_PORTAMENTO: u8 = 65;
pub const CC_PORTAMENTO_CONTROL: u8 = 84;
pub const CC_RPN_LSB: u8 = 100;
pub const CC_RPN_MSB: u8 = 101;

/// Events of one track in insertion order, plus the write cursor the
/// `add_*` methods place new events at.
#[derive(Clone, Debug, Default)]
pub struct MidiTrack {
    events: Vec<MidiEvent>,
    delta: u32,
    /// Indices of note-offs scheduled by duration notes that are still open.
    pending_offs: Vec<usize>,
}

impl MidiTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn delta(&self) -> u32 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: u32) {
        self.delta = delta;
    }

    pub fn add_delta(&mut self, ticks: u32) {
        self.delta = self.delta.saturating_add(ticks);
    }

    /// Tick of the end-of-track event written for this track.
    pub fn end_time(&self) -> u32 {
        self.events
            .iter()
            .map(|e| e.time)
            .max()
            .unwrap_or(0)
            .max(self.delta)
    }

    pub fn push(&mut self, event: MidiEvent) {
        self.events.push(event);
    }

    fn add(&mut self, channel: u8, kind: EventKind) {
        let event = MidiEvent::new(self.delta, channel, kind);
        self.events.push(event);
    }

    /// Forgets every open note-off.
    pub fn purge_note_offs(&mut self) {
        self.pending_offs.clear();
    }

    /// Forgets the open note-offs at or before `time`.
    pub fn purge_note_offs_until(&mut self, time: u32) {
        let events = &self.events;
        self.pending_offs.retain(|i| events[*i].time > time);
    }

    /// Adds a note-on at the cursor and its note-off `duration` ticks later.
    ///
    /// An open note-off of the same key that would land inside the new note
    /// is moved to the new note's start.
    pub fn add_note_by_dur(&mut self, channel: u8, key: u8, velocity: u8, duration: u32) {
        let now = self.delta;
        self.purge_note_offs_until(now);

        let channel = channel & 0x0f;
        let events = &mut self.events;
        self.pending_offs.retain(|i| {
            let off = &mut events[*i];
            let stale = off.channel == channel && off.kind == EventKind::NoteOff { key };
            if stale {
                off.time = now;
            }
            !stale
        });

        self.add(channel, EventKind::NoteOn { key, velocity });
        self.pending_offs.push(self.events.len());
        self.events.push(MidiEvent::new(
            now.saturating_add(duration),
            channel,
            EventKind::NoteOff { key },
        ));
    }

    /// Like [`MidiTrack::add_note_by_dur`], but a note whose key is still
    /// sounding is extended instead of struck again.
    pub fn add_note_continuing(&mut self, channel: u8, key: u8, velocity: u8, duration: u32) {
        let now = self.delta;
        let channel = channel & 0x0f;
        let sounding = self.events.iter_mut().find(|e| {
            e.time > now && e.channel == channel && e.kind == EventKind::NoteOff { key }
        });

        match sounding {
            Some(off) => off.time = now.saturating_add(duration),
            None => self.add_note_by_dur(channel, key, velocity, duration),
        }
    }

    pub fn add_controller(&mut self, channel: u8, controller: u8, value: u8) {
        self.add(channel, EventKind::Controller { controller, value });
    }

    pub fn add_program_change(&mut self, channel: u8, program: u8) {
        self.add(channel, EventKind::ProgramChange(program));
    }

    pub fn add_volume(&mut self, channel: u8, volume: u8) {
        self.add_controller(channel, CC_VOLUME, volume);
    }

    pub fn add_pan(&mut self, channel: u8, pan: u8) {
        self.add_controller(channel, CC_PAN, pan);
    }

    pub fn add_expression(&mut self, channel: u8, expression: u8) {
        self.add_controller(channel, CC_EXPRESSION, expression);
    }

    pub fn add_modulation(&mut self, channel: u8, depth: u8) {
        self.add_controller(channel, CC_MODULATION, depth);
    }

    pub fn add_portamento(&mut self, channel: u8, on: bool) {
        self.add_controller(channel, CC_PORTAMENTO, if on { 0x7f } else { 0 });
    }

    pub fn add_portamento_time(&mut self, channel: u8, time: u8) {
        self.add_controller(channel, CC_PORTAMENTO_TIME, time);
    }

    /// Sets the key the next note glides from.
    pub fn add_portamento_control(&mut self, channel: u8, key: u8) {
        self.add_controller(channel, CC_PORTAMENTO_CONTROL, key);
    }

    /// Universal real-time master volume. Applies to the whole device.
    pub fn add_master_volume(&mut self, volume: u8) {
        self.add(
            0,
            EventKind::Sysex(vec![0x7f, 0x7f, 0x04, 0x01, 0x00, volume & 0x7f]),
        );
    }

    pub fn add_pitch_bend(&mut self, channel: u8, bend: i16) {
        self.add(channel, EventKind::PitchBend(bend));
    }

    /// Pitch bend sensitivity RPN.
    pub fn add_pitch_bend_range(&mut self, channel: u8, semitones: u8, cents: u8) {
        let rpn = [
            (CC_RPN_MSB, 0),
            (CC_RPN_LSB, 0),
            (CC_DATA_ENTRY, semitones),
            (CC_DATA_ENTRY_LSB, cents),
        ];
        for (controller, value) in rpn.iter() {
            let event = MidiEvent::new(
                self.delta,
                channel,
                EventKind::Controller {
                    controller: *controller,
                    value: *value,
                },
            );
            self.events.push(event.with_priority(Priority::Highest));
        }
    }

    pub fn add_tempo(&mut self, micros_per_quarter: u32) {
        self.add(0, EventKind::Tempo(micros_per_quarter));
    }

    pub fn add_tempo_bpm(&mut self, bpm: f64) {
        if !(bpm > 0.0) {
            log::warn!("ignoring tempo of {} BPM", bpm);
            return;
        }
        self.add_tempo((60_000_000.0 / bpm).round() as u32);
    }
}
