/// Ordering rank of events sharing a tick. Earlier variants are written first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Tempo, global transpose and pitch bend range.
    Highest,
    /// Master volume.
    Higher,
    /// Program change.
    High,
    /// Controllers and pitch bend.
    Middle,
    Low,
    /// Notes.
    Lower,
    /// End of track.
    Lowest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange(u8),
    /// Signed bend around the center, -8192..=8191.
    PitchBend(i16),
    /// Microseconds per quarter note.
    Tempo(u32),
    /// Sysex payload without the leading `F0`; the trailing `F7` is added on write.
    Sysex(Vec<u8>),
    /// Shifts the keys of every following note on the track being written.
    /// Produces no bytes.
    GlobalTranspose(i8),
    EndOfTrack,
}

impl EventKind {
    pub fn default_priority(&self) -> Priority {
        match self {
            EventKind::Tempo(_) | EventKind::GlobalTranspose(_) => Priority::Highest,
            EventKind::Sysex(_) => Priority::Higher,
            EventKind::ProgramChange(_) => Priority::High,
            EventKind::Controller { .. } | EventKind::PitchBend(_) => Priority::Middle,
            EventKind::NoteOn { .. } | EventKind::NoteOff { .. } => Priority::Lower,
            EventKind::EndOfTrack => Priority::Lowest,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Absolute tick.
    pub time: u32,
    pub channel: u8,
    pub priority: Priority,
    pub kind: EventKind,
}

impl MidiEvent {
    pub fn new(time: u32, channel: u8, kind: EventKind) -> Self {
        Self {
            time,
            channel: channel & 0x0f,
            priority: kind.default_priority(),
            kind,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Appends the event to `buf` with a delta from `last`, returning the new
    /// cursor. Transpose events only update `state`.
    pub fn write(&self, buf: &mut Vec<u8>, last: u32, state: &mut EmitState) -> u32 {
        let status = |base: u8| base | self.channel;

        match &self.kind {
            EventKind::GlobalTranspose(semitones) => {
                state.transpose = *semitones;
                return last;
            }
            EventKind::NoteOn { key, velocity } => {
                write_varlen(buf, self.time.saturating_sub(last));
                buf.extend_from_slice(&[
                    status(0x90),
                    state.key(self.channel, *key),
                    velocity & 0x7f,
                ]);
            }
            EventKind::NoteOff { key } => {
                write_varlen(buf, self.time.saturating_sub(last));
                buf.extend_from_slice(&[status(0x80), state.key(self.channel, *key), 0x40]);
            }
            EventKind::Controller { controller, value } => {
                write_varlen(buf, self.time.saturating_sub(last));
                buf.extend_from_slice(&[status(0xb0), controller & 0x7f, value & 0x7f]);
            }
            EventKind::ProgramChange(program) => {
                write_varlen(buf, self.time.saturating_sub(last));
                buf.extend_from_slice(&[status(0xc0), program & 0x7f]);
            }
            EventKind::PitchBend(bend) => {
                let value = (*bend as i32 + 0x2000).max(0).min(0x3fff) as u16;
                write_varlen(buf, self.time.saturating_sub(last));
                buf.extend_from_slice(&[status(0xe0), (value & 0x7f) as u8, (value >> 7) as u8]);
            }
            EventKind::Tempo(micros) => {
                let micros = (*micros).min(0x00ff_ffff);
                self.write_meta(buf, last, 0x51, &micros.to_be_bytes()[1..]);
            }
            EventKind::Sysex(data) => {
                write_varlen(buf, self.time.saturating_sub(last));
                buf.push(0xf0);
                write_varlen(buf, data.len() as u32 + 1);
                buf.extend_from_slice(data);
                buf.push(0xf7);
            }
            EventKind::EndOfTrack => self.write_meta(buf, last, 0x2f, &[]),
        }

        self.time.max(last)
    }

    fn write_meta(&self, buf: &mut Vec<u8>, last: u32, meta: u8, data: &[u8]) {
        write_varlen(buf, self.time.saturating_sub(last));
        buf.push(0xff);
        buf.push(meta);
        write_varlen(buf, data.len() as u32);
        buf.extend_from_slice(data);
    }
}

/// State carried from event to event while one track is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitState {
    pub transpose: i8,
}

impl EmitState {
    /// Percussion on channel 10 is never transposed.
    fn key(&self, channel: u8, key: u8) -> u8 {
        if channel == 9 {
            key & 0x7f
        } else {
            (key as i16 + self.transpose as i16).max(0).min(0x7f) as u8
        }
    }
}

/// Writes `value` as a MIDI variable-length quantity.
pub fn write_varlen(buf: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut rest = value;
    loop {
        groups[n] = (rest & 0x7f) as u8;
        n += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        buf.push(groups[i] | more);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varlen(value: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varlen(&mut buf, value);
        buf
    }

    #[test]
    fn varlen_encoding() {
        assert_eq!(varlen(0), vec![0x00]);
        assert_eq!(varlen(0x40), vec![0x40]);
        assert_eq!(varlen(0x7f), vec![0x7f]);
        assert_eq!(varlen(0x80), vec![0x81, 0x00]);
        assert_eq!(varlen(0x2000), vec![0xc0, 0x00]);
        assert_eq!(varlen(0x0fff_ffff), vec![0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn transpose_skips_percussion() {
        let mut state = EmitState { transpose: 2 };
        let mut buf = Vec::new();
        let t = MidiEvent::new(0, 0, EventKind::GlobalTranspose(5)).write(&mut buf, 0, &mut state);
        assert_eq!((t, buf.len(), state.transpose), (0, 0, 5));

        MidiEvent::new(0, 0, EventKind::NoteOn { key: 60, velocity: 100 }).write(&mut buf, 0, &mut state);
        MidiEvent::new(0, 9, EventKind::NoteOn { key: 60, velocity: 100 }).write(&mut buf, 0, &mut state);
        assert_eq!(buf, vec![0x00, 0x90, 65, 100, 0x00, 0x99, 60, 100]);
    }

    #[test]
    fn pitch_bend_centers_on_0x2000() {
        let mut buf = Vec::new();
        let mut state = EmitState::default();
        MidiEvent::new(3, 1, EventKind::PitchBend(0)).write(&mut buf, 0, &mut state);
        MidiEvent::new(3, 1, EventKind::PitchBend(-8192)).write(&mut buf, 3, &mut state);
        assert_eq!(buf, vec![0x03, 0xe1, 0x00, 0x40, 0x00, 0xe1, 0x00, 0x00]);
    }

    #[test]
    fn sysex_carries_its_length() {
        let mut buf = Vec::new();
        MidiEvent::new(0, 0, EventKind::Sysex(vec![0x7f, 0x7f, 0x04, 0x01, 0x00, 0x64]))
            .write(&mut buf, 0, &mut EmitState::default());
        assert_eq!(buf, vec![0x00, 0xf0, 0x07, 0x7f, 0x7f, 0x04, 0x01, 0x00, 0x64, 0xf7]);
    }

    #[test]
    fn tempo_is_a_three_byte_meta() {
        let mut buf = Vec::new();
        MidiEvent::new(0, 0, EventKind::Tempo(500_000)).write(&mut buf, 0, &mut EmitState::default());
        assert_eq!(buf, vec![0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20]);
    }
}
