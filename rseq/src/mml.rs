//! Decoding of the sequence bytecode.

use crate::error::*;
use byteorder::{ByteOrder, BE};

/// How the argument of the next instruction is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Variable-length quantity, up to five bytes.
    Variable,
    U8,
    /// Big-endian `i16`.
    S16,
    /// Two big-endian `i16` bounds, resolved to their midpoint.
    Random,
}

/// The one-shot argument prefix register.
///
/// A prefix instruction arms it for the instruction that starts right after
/// it. Any other instruction start disarms it with a warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArgRegister {
    pending: Option<(ArgKind, usize)>,
}

impl ArgRegister {
    pub fn arm(&mut self, kind: ArgKind, offset: usize) {
        self.pending = Some((kind, offset));
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<ArgKind> {
        self.pending.map(|(kind, _)| kind)
    }

    /// Drops a prefix that was not consumed by the instruction following it.
    pub fn check(&mut self, offset: usize) {
        if let Some((kind, expected)) = self.pending {
            if expected != offset {
                log::warn!(
                    "{:?} argument prefix for 0x{:06x} was not consumed (now at 0x{:06x})",
                    kind,
                    expected,
                    offset
                );
                self.pending = None;
            }
        }
    }

    fn take(&mut self, default: ArgKind) -> ArgKind {
        self.pending.take().map_or(default, |(kind, _)| kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MmlCmd {
    /// Play a note; the track only waits for it in note-wait mode.
    Note { key: u8, velocity: u8, duration: u32 },

    /// Rest for X ticks
    Wait(u32),
    /// Program change
    Program(u32),

    /// Start track N at an offset, in parallel with this one
    OpenTrack { track: u8, offset: u32 },
    /// Jump to an offset
    Jump(u32),
    /// Call a subroutine
    Call(u32),

    /// The next instruction's argument is a random range
    Random,
    /// The next instruction's argument is a variable
    Variable,
    /// Execute the next instruction only if the last comparison held
    If,

    /// Set ticks per quarter note
    Timebase(u8),
    EnvHold(u8),
    Monophonic(bool),
    VelocityRange(u8),
    BiquadType(u8),
    BiquadValue(u8),
    Pan(u8),
    Volume(u8),
    /// Volume of the whole player
    MainVolume(u8),
    /// Transpose subsequent notes, in semitones
    Transpose(i8),
    /// Pitch bend, scaled by the bend range
    PitchBend(i8),
    /// Pitch bend range in semitones
    BendRange(u8),
    Priority(u8),
    /// Whether notes advance the track time by their duration
    NoteWait(bool),
    Tie(bool),
    /// Glide the next note from this key
    Porta(u8),
    ModDepth(u8),
    ModSpeed(u8),
    ModType(u8),
    ModRange(u8),
    PortaSwitch(bool),
    PortaTime(u8),
    Attack(u8),
    Decay(u8),
    Sustain(u8),
    Release(u8),
    /// Repeat until the matching loop end, X times (0 = forever)
    LoopStart(u8),
    /// Expression
    Volume2(u8),
    PrintVar(u8),
    SurroundPan(u8),
    LpfCutoff(u8),
    FxSendA(u8),
    FxSendB(u8),
    MainSend(u8),
    InitPan(u8),
    Mute(u8),
    FxSendC(u8),
    Damper(bool),

    ModDelay(i16),
    /// Tempo in BPM
    Tempo(i16),
    SweepPitch(i16),

    /// Variable arithmetic, comparisons and user procedures
    Extended { sub: u8, operand: u32 },

    EnvReset,
    LoopEnd,
    /// Return from a subroutine; ends the track outside of one
    Ret,
    /// Reserve player tracks (bitmask)
    AllocTrack(u16),
    /// End of track
    Fin,
}

impl MmlCmd {
    pub fn is_end(&self) -> bool {
        matches!(self, MmlCmd::Fin)
    }

    /// Decodes the instruction at `offset`, returning it and the offset of
    /// the next one.
    pub fn read(code: &[u8], offset: usize, args: &mut ArgRegister) -> Result<(Self, usize)> {
        use MmlCmd::*;

        args.check(offset);
        let mut r = Reader { code, pos: offset };
        let opcode = r.u8()?;

        let cmd = match opcode {
            0x00..=0x7f => {
                let velocity = r.u8()?;
                let duration = r.arg(args, ArgKind::Variable)? as u32;
                Note {
                    key: opcode,
                    velocity,
                    duration,
                }
            }

            0x80 => Wait(r.arg(args, ArgKind::Variable)?.max(0) as u32),
            0x81 => Program(r.arg(args, ArgKind::Variable)?.max(0) as u32),

            0x88 => OpenTrack {
                track: r.u8()?,
                offset: r.u24()?,
            },
            0x89 => Jump(r.u24()?),
            0x8a => Call(r.u24()?),

            0xa0 => {
                args.arm(ArgKind::Random, r.pos);
                Random
            }
            0xa1 => {
                args.arm(ArgKind::Variable, r.pos);
                Variable
            }
            0xa2 => If,

            0xb0..=0xdf => {
                let value = r.arg(args, ArgKind::U8)? as u8;
                match opcode {
                    0xb0 => Timebase(value),
                    0xb1 => EnvHold(value),
                    0xb2 => Monophonic(value != 0),
                    0xb3 => VelocityRange(value),
                    0xb4 => BiquadType(value),
                    0xb5 => BiquadValue(value),
                    0xc0 => Pan(value),
                    0xc1 => Volume(value),
                    0xc2 => MainVolume(value),
                    0xc3 => Transpose(value as i8),
                    0xc4 => PitchBend(value as i8),
                    0xc5 => BendRange(value),
                    0xc6 => Priority(value),
                    0xc7 => NoteWait(value != 0),
                    0xc8 => Tie(value != 0),
                    0xc9 => Porta(value),
                    0xca => ModDepth(value),
                    0xcb => ModSpeed(value),
                    0xcc => ModType(value),
                    0xcd => ModRange(value),
                    0xce => PortaSwitch(value != 0),
                    0xcf => PortaTime(value),
                    0xd0 => Attack(value),
                    0xd1 => Decay(value),
                    0xd2 => Sustain(value),
                    0xd3 => Release(value),
                    0xd4 => LoopStart(value),
                    0xd5 => Volume2(value),
                    0xd6 => PrintVar(value),
                    0xd7 => SurroundPan(value),
                    0xd8 => LpfCutoff(value),
                    0xd9 => FxSendA(value),
                    0xda => FxSendB(value),
                    0xdb => MainSend(value),
                    0xdc => InitPan(value),
                    0xdd => Mute(value),
                    0xde => FxSendC(value),
                    0xdf => Damper(value != 0),
                    _ => return Err(RseqError::UnknownInstruction { opcode, offset }),
                }
            }

            0xe0 => ModDelay(r.arg(args, ArgKind::S16)? as i16),
            0xe1 => Tempo(r.arg(args, ArgKind::S16)? as i16),
            0xe3 => SweepPitch(r.arg(args, ArgKind::S16)? as i16),

            0xf0 => {
                // extended instructions never take a prefixed argument
                args.clear();
                let sub = r.u8()?;
                let operand = match sub & 0xf0 {
                    0xe0 => r.u16()? as u32,
                    0x80 | 0x90 => r.u24()?,
                    _ => return Err(RseqError::UnknownExtended { sub, offset }),
                };
                Extended { sub, operand }
            }

            0xfb => EnvReset,
            0xfc => LoopEnd,
            0xfd => Ret,
            0xfe => AllocTrack(r.u16()?),
            0xff => Fin,

            _ => return Err(RseqError::UnknownInstruction { opcode, offset }),
        };

        Ok((cmd, r.pos))
    }
}

struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.pos;
        let bytes = self
            .code
            .get(start..start + len)
            .ok_or(RseqError::Truncated { offset: start })?;
        self.pos += len;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(BE::read_u16(self.bytes(2)?))
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(BE::read_i16(self.bytes(2)?))
    }

    fn u24(&mut self) -> Result<u32> {
        Ok(BE::read_u24(self.bytes(3)?))
    }

    /// Variable-length quantity; at most five bytes are read.
    fn var(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..5 {
            let b = self.u8()?;
            value = (value << 7) | (b & 0x7f) as u32;
            if b & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    /// Reads an argument whose encoding a prefix may have overridden.
    fn arg(&mut self, args: &mut ArgRegister, default: ArgKind) -> Result<i32> {
        match args.take(default) {
            ArgKind::Variable => Ok(self.var()? as i32),
            ArgKind::U8 => Ok(self.u8()? as i32),
            ArgKind::S16 => Ok(self.i16()? as i32),
            ArgKind::Random => {
                let min = self.i16()? as i32;
                let max = self.i16()? as i32;
                Ok((min + max) / 2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(code: &[u8]) -> Vec<MmlCmd> {
        let mut args = ArgRegister::default();
        let mut offset = 0;
        let mut out = Vec::new();
        while offset < code.len() {
            let (cmd, next) = MmlCmd::read(code, offset, &mut args).unwrap();
            out.push(cmd);
            offset = next;
        }
        out
    }

    #[test]
    fn note_with_variable_duration() {
        assert_eq!(
            read_all(&[0x3c, 0x64, 0x81, 0x00]),
            vec![MmlCmd::Note {
                key: 0x3c,
                velocity: 0x64,
                duration: 0x80
            }]
        );
    }

    #[test]
    fn control_flow_operands_are_24_bit() {
        assert_eq!(
            read_all(&[0x88, 0x01, 0x00, 0x01, 0x00, 0x89, 0x12, 0x34, 0x56, 0xfd]),
            vec![
                MmlCmd::OpenTrack {
                    track: 1,
                    offset: 0x100
                },
                MmlCmd::Jump(0x123456),
                MmlCmd::Ret,
            ]
        );
    }

    #[test]
    fn random_prefix_resolves_to_midpoint() {
        // wait with a random range of 10..=20
        assert_eq!(
            read_all(&[0xa0, 0x80, 0x00, 0x0a, 0x00, 0x14]),
            vec![MmlCmd::Random, MmlCmd::Wait(15)]
        );
        // transpose with a random range of -4..=0
        assert_eq!(
            read_all(&[0xa0, 0xc3, 0xff, 0xfc, 0x00, 0x00]),
            vec![MmlCmd::Random, MmlCmd::Transpose(-2)]
        );
    }

    #[test]
    fn variable_prefix_reads_a_varlen() {
        assert_eq!(
            read_all(&[0xa1, 0xc1, 0x81, 0x7f]),
            vec![MmlCmd::Variable, MmlCmd::Volume(0xff)]
        );
    }

    #[test]
    fn unconsumed_prefix_is_dropped() {
        let mut args = ArgRegister::default();
        args.arm(ArgKind::Random, 4);
        args.check(6);
        assert_eq!(args.pending(), None);

        args.arm(ArgKind::S16, 4);
        args.check(4);
        assert_eq!(args.pending(), Some(ArgKind::S16));
    }

    #[test]
    fn extended_operand_size_depends_on_sub() {
        assert_eq!(
            read_all(&[0xf0, 0xe0, 0x00, 0x01, 0xf0, 0x80, 0x01, 0x00, 0x05]),
            vec![
                MmlCmd::Extended {
                    sub: 0xe0,
                    operand: 1
                },
                MmlCmd::Extended {
                    sub: 0x80,
                    operand: 0x010005
                },
            ]
        );
        let mut args = ArgRegister::default();
        assert!(matches!(
            MmlCmd::read(&[0xf0, 0x10], 0, &mut args),
            Err(RseqError::UnknownExtended { sub: 0x10, offset: 0 })
        ));
    }

    #[test]
    fn unknown_and_truncated() {
        let mut args = ArgRegister::default();
        assert!(matches!(
            MmlCmd::read(&[0xa3], 0, &mut args),
            Err(RseqError::UnknownInstruction { opcode: 0xa3, .. })
        ));
        assert!(matches!(
            MmlCmd::read(&[0x00, 0x40, 0x81], 0, &mut args),
            Err(RseqError::Truncated { offset: 3 })
        ));
        assert!(matches!(
            MmlCmd::read(&[0x89, 0x00], 0, &mut args),
            Err(RseqError::Truncated { offset: 1 })
        ));
    }
}
