//! Sequence bytecode to MIDI.
//!
//! Tracks are discovered breadth-first from the entry point: every
//! `OpenTrack` queues a new MIDI track that starts at the opener's current
//! tick. Each track is run to completion before the next one is dequeued.

use crate::error::*;
use crate::mml::*;
use rsnd::SoundSequence;
use smf::{MidiFile, MidiTrack, DEFAULT_PPQN};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Nesting limit shared by subroutine calls and loops.
pub const MAX_CALL_DEPTH: usize = 64;
/// Instructions a single track may execute before it is abandoned.
pub const MAX_STEPS: usize = 1 << 20;

/// What a note does when the same key is still sounding on its track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteMode {
    /// Cut the sounding note and strike again.
    Retrigger,
    /// Extend the sounding note instead.
    Continue,
}

impl Default for NoteMode {
    fn default() -> Self {
        NoteMode::Retrigger
    }
}

/// A track that stopped on an error. Its events up to the error are kept.
#[derive(Error, Debug)]
#[error("track {track} (player track {player_track}): {error}")]
pub struct TrackError {
    /// Index of the MIDI track.
    pub track: usize,
    pub player_track: u8,
    #[source]
    pub error: RseqError,
}

#[derive(Debug)]
pub struct Conversion {
    pub midi: MidiFile,
    pub errors: Vec<TrackError>,
}

impl Conversion {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Converter<'a> {
    code: &'a [u8],
    entry: u32,
    note_mode: NoteMode,
    ppqn: u16,
}

struct Pending {
    player_track: u8,
    delta: u32,
    offset: u32,
}

struct LoopFrame {
    start: usize,
    remaining: u8,
}

impl<'a> Converter<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            entry: 0,
            note_mode: NoteMode::default(),
            ppqn: DEFAULT_PPQN,
        }
    }

    /// Converter for a sequence file, starting at `label` if given.
    pub fn for_sequence(seq: &SoundSequence<'a>, label: Option<&str>) -> Result<Self> {
        let converter = Self::new(seq.code());
        match label {
            Some(name) => {
                let offset = seq
                    .label(name)
                    .ok_or_else(|| RseqError::UnknownLabel(name.to_string()))?;
                Ok(converter.entry(offset))
            }
            None => Ok(converter),
        }
    }

    pub fn entry(mut self, offset: u32) -> Self {
        self.entry = offset;
        self
    }

    pub fn note_mode(mut self, mode: NoteMode) -> Self {
        self.note_mode = mode;
        self
    }

    /// Initial ticks per quarter note; a `Timebase` instruction overrides it.
    pub fn ppqn(mut self, ppqn: u16) -> Self {
        self.ppqn = ppqn;
        self
    }

    pub fn convert(&self) -> Conversion {
        let mut midi = MidiFile::new(self.ppqn);
        let mut errors = Vec::new();

        let mut queue = VecDeque::new();
        queue.push_back(Pending {
            player_track: 0,
            delta: 0,
            offset: self.entry,
        });

        while let Some(pending) = queue.pop_front() {
            let index = midi.tracks.len();
            log::debug!(
                "track {} (player track {}) at 0x{:06x}, tick {}",
                index,
                pending.player_track,
                pending.offset,
                pending.delta
            );

            let mut track = MidiTrack::new();
            track.set_delta(pending.delta);
            let mut run = TrackRun {
                code: self.code,
                note_mode: self.note_mode,
                channel: pending.player_track & 0x0f,
                track: &mut track,
                ppqn: &mut midi.ppqn,
                queue: &mut queue,
            };
            if let Err(error) = run.run(pending.offset as usize) {
                log::warn!("track {} stopped: {}", index, error);
                errors.push(TrackError {
                    track: index,
                    player_track: pending.player_track,
                    error,
                });
            }
            midi.tracks.push(track);
        }

        Conversion { midi, errors }
    }
}

/// Interpreter state of one track.
struct TrackRun<'c, 'r> {
    code: &'c [u8],
    note_mode: NoteMode,
    channel: u8,
    track: &'r mut MidiTrack,
    ppqn: &'r mut u16,
    queue: &'r mut VecDeque<Pending>,
}

impl TrackRun<'_, '_> {
    fn run(&mut self, entry: usize) -> Result<()> {
        let mut args = ArgRegister::default();
        let mut calls: Vec<usize> = Vec::new();
        let mut loops: Vec<LoopFrame> = Vec::new();
        let mut jumps = HashSet::new();
        let mut transpose: i8 = 0;
        let mut note_wait = false;

        let mut offset = entry;
        for _ in 0..MAX_STEPS {
            let at = offset;
            let (cmd, next) = MmlCmd::read(self.code, at, &mut args)?;
            offset = next;

            match cmd {
                MmlCmd::Note {
                    key,
                    velocity,
                    duration,
                } => {
                    let key = transposed(key, transpose);
                    match self.note_mode {
                        NoteMode::Retrigger => {
                            self.track
                                .add_note_by_dur(self.channel, key, velocity, duration)
                        }
                        NoteMode::Continue => {
                            self.track
                                .add_note_continuing(self.channel, key, velocity, duration)
                        }
                    }
                    if note_wait {
                        self.track.add_delta(duration);
                    }
                }
                MmlCmd::Wait(ticks) => {
                    self.track.purge_note_offs();
                    self.track.add_delta(ticks);
                }
                MmlCmd::Program(program) => {
                    if program > 0x7f {
                        log::warn!("program {} at 0x{:06x} truncated", program, at);
                    }
                    self.track
                        .add_program_change(self.channel, (program & 0x7f) as u8);
                }

                MmlCmd::OpenTrack { track, offset } => self.queue.push_back(Pending {
                    player_track: track,
                    delta: self.track.delta(),
                    offset,
                }),
                MmlCmd::Jump(target) => {
                    if !jumps.insert(target) {
                        log::debug!("jump to 0x{:06x} taken twice, ending track", target);
                        return Ok(());
                    }
                    offset = target as usize;
                }
                MmlCmd::Call(target) => {
                    if calls.len() >= MAX_CALL_DEPTH {
                        return Err(RseqError::CallDepth { offset: at });
                    }
                    calls.push(offset);
                    offset = target as usize;
                }
                MmlCmd::Ret => match calls.pop() {
                    Some(ret) => offset = ret,
                    None => return Ok(()),
                },
                MmlCmd::Fin => return Ok(()),

                MmlCmd::LoopStart(count) => {
                    if loops.len() >= MAX_CALL_DEPTH {
                        return Err(RseqError::CallDepth { offset: at });
                    }
                    loops.push(LoopFrame {
                        start: offset,
                        remaining: count.max(1),
                    });
                }
                MmlCmd::LoopEnd => match loops.last_mut() {
                    Some(frame) if frame.remaining > 1 => {
                        frame.remaining -= 1;
                        offset = frame.start;
                    }
                    Some(_) => {
                        loops.pop();
                    }
                    None => log::warn!("loop end without a loop at 0x{:06x}", at),
                },

                MmlCmd::Timebase(0) => log::warn!("ignoring zero timebase at 0x{:06x}", at),
                MmlCmd::Timebase(timebase) => *self.ppqn = timebase as u16,
                MmlCmd::Pan(pan) => self.track.add_pan(self.channel, pan),
                MmlCmd::Volume(volume) => self.track.add_volume(self.channel, volume),
                MmlCmd::MainVolume(volume) => self.track.add_master_volume(volume),
                MmlCmd::Volume2(expression) => self.track.add_expression(self.channel, expression),
                MmlCmd::Transpose(semitones) => transpose = semitones,
                MmlCmd::PitchBend(bend) => self.track.add_pitch_bend(self.channel, bend as i16 * 64),
                MmlCmd::BendRange(semitones) => {
                    self.track.add_pitch_bend_range(self.channel, semitones, 0)
                }
                MmlCmd::NoteWait(on) => note_wait = on,
                MmlCmd::Porta(key) => {
                    let key = transposed(key, transpose);
                    self.track.add_portamento_control(self.channel, key)
                }
                MmlCmd::PortaSwitch(on) => self.track.add_portamento(self.channel, on),
                MmlCmd::PortaTime(time) => self.track.add_portamento_time(self.channel, time),
                MmlCmd::ModDepth(depth) => self.track.add_modulation(self.channel, depth),
                MmlCmd::Tempo(bpm) => self.track.add_tempo_bpm(bpm as f64),

                // no MIDI counterpart
                MmlCmd::Random
                | MmlCmd::Variable
                | MmlCmd::If
                | MmlCmd::EnvHold(_)
                | MmlCmd::Monophonic(_)
                | MmlCmd::VelocityRange(_)
                | MmlCmd::BiquadType(_)
                | MmlCmd::BiquadValue(_)
                | MmlCmd::Priority(_)
                | MmlCmd::Tie(_)
                | MmlCmd::ModSpeed(_)
                | MmlCmd::ModType(_)
                | MmlCmd::ModRange(_)
                | MmlCmd::Attack(_)
                | MmlCmd::Decay(_)
                | MmlCmd::Sustain(_)
                | MmlCmd::Release(_)
                | MmlCmd::PrintVar(_)
                | MmlCmd::SurroundPan(_)
                | MmlCmd::LpfCutoff(_)
                | MmlCmd::FxSendA(_)
                | MmlCmd::FxSendB(_)
                | MmlCmd::FxSendC(_)
                | MmlCmd::MainSend(_)
                | MmlCmd::InitPan(_)
                | MmlCmd::Mute(_)
                | MmlCmd::Damper(_)
                | MmlCmd::ModDelay(_)
                | MmlCmd::SweepPitch(_)
                | MmlCmd::Extended { .. }
                | MmlCmd::EnvReset
                | MmlCmd::AllocTrack(_) => {}
            }
        }

        Err(RseqError::StepLimit(MAX_STEPS))
    }

}

fn transposed(key: u8, transpose: i8) -> u8 {
    (key as i16 + transpose as i16).max(0).min(0x7f) as u8
}
