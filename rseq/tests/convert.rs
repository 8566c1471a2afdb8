use byteorder::{ByteOrder, WriteBytesExt, BE};
use rseq::*;
use rsnd::SoundSequence;
use smf::EventKind;

/// A big-endian `RSEQ` file holding `code` and `labels`.
fn rseq_file(code: &[u8], labels: &[(&str, u32)]) -> Vec<u8> {
    let mut f = Vec::new();
    f.extend_from_slice(b"RSEQ");
    f.extend_from_slice(&[0xfe, 0xff]);
    f.write_u16::<BE>(0x0100).unwrap();
    f.write_u32::<BE>(0).unwrap();
    f.write_u16::<BE>(0x20).unwrap();
    f.write_u16::<BE>(2).unwrap();
    f.resize(0x20, 0);

    let data = f.len();
    f.extend_from_slice(b"DATA");
    f.write_u32::<BE>(0).unwrap();
    f.write_u32::<BE>(0x0c).unwrap();
    f.extend_from_slice(code);
    while f.len() % 4 != 0 {
        f.push(0);
    }
    let len = (f.len() - data) as u32;
    BE::write_u32(&mut f[data + 4..], len);
    BE::write_u32(&mut f[0x10..], data as u32);
    BE::write_u32(&mut f[0x14..], len);

    let labl = f.len();
    f.extend_from_slice(b"LABL");
    f.write_u32::<BE>(0).unwrap();
    let base = f.len();
    f.write_u32::<BE>(labels.len() as u32).unwrap();
    let table = f.len();
    f.resize(table + labels.len() * 4, 0);
    for (i, (name, offset)) in labels.iter().enumerate() {
        let at = (f.len() - base) as u32;
        BE::write_u32(&mut f[table + i * 4..], at);
        f.write_u32::<BE>(*offset).unwrap();
        f.write_u32::<BE>(name.len() as u32).unwrap();
        f.extend_from_slice(name.as_bytes());
        while f.len() % 4 != 0 {
            f.push(0);
        }
    }
    let len = (f.len() - labl) as u32;
    BE::write_u32(&mut f[labl + 4..], len);
    BE::write_u32(&mut f[0x18..], labl as u32);
    BE::write_u32(&mut f[0x1c..], len);

    let size = f.len() as u32;
    BE::write_u32(&mut f[8..], size);
    f
}

fn note_ons(conversion: &Conversion, track: usize) -> Vec<(u32, u8)> {
    conversion.midi.tracks[track]
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::NoteOn { key, .. } => Some((e.time, key)),
            _ => None,
        })
        .collect()
}

#[test]
fn open_track_spawns_a_second_track() {
    let code = [
        0x88, 0x01, 0x00, 0x00, 0x06, // open track 1 at 0x06
        0xff, // fin
        0x80, 0x0a, // wait 10
        0xff,
    ];
    let conversion = Converter::new(&code).convert();
    assert!(conversion.is_clean());
    assert_eq!(conversion.midi.tracks.len(), 2);

    let second = conversion.midi.ordered_events(&conversion.midi.tracks[1]);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].kind, EventKind::EndOfTrack);
    assert_eq!(second[0].time, 10);

    let bytes = conversion.midi.to_bytes();
    assert_eq!(&bytes[10..12], &[0x00, 0x02]);
    assert!(bytes.ends_with(&[0x0a, 0xff, 0x2f, 0x00]));
}

#[test]
fn transpose_applies_on_the_percussion_channel() {
    let code = [
        0x88, 0x09, 0x00, 0x00, 0x06, // open track 9 at 0x06
        0xff,
        0xc3, 0x02, // transpose +2
        0x3c, 0x64, 0x10,
        0xff,
    ];
    let conversion = Converter::new(&code).convert();
    assert!(conversion.is_clean());
    assert_eq!(note_ons(&conversion, 1), vec![(0, 0x3e)]);
}

#[test]
fn self_jump_ends_the_track() {
    let code = [0x89, 0x00, 0x00, 0x00];
    let conversion = Converter::new(&code).convert();
    assert!(conversion.is_clean());
    let events = conversion.midi.ordered_events(&conversion.midi.tracks[0]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::EndOfTrack);
}

#[test]
fn random_wait_takes_the_midpoint() {
    let code = [0xa0, 0x80, 0x00, 0x0a, 0x00, 0x14, 0xff];
    let conversion = Converter::new(&code).convert();
    assert!(conversion.is_clean());
    assert_eq!(conversion.midi.tracks[0].delta(), 15);
}

#[test]
fn unknown_opcode_only_stops_its_track() {
    let code = [
        0x88, 0x01, 0x00, 0x00, 0x09, // open track 1 at 0x09
        0x3c, 0x64, 0x10, // note
        0xff, // fin
        0xa3, // unsupported prefix
    ];
    let conversion = Converter::new(&code).convert();
    assert_eq!(conversion.midi.tracks.len(), 2);
    assert_eq!(note_ons(&conversion, 0), vec![(0, 0x3c)]);

    assert_eq!(conversion.errors.len(), 1);
    let err = &conversion.errors[0];
    assert_eq!(err.track, 1);
    assert_eq!(err.player_track, 1);
    assert!(matches!(
        err.error,
        RseqError::UnknownInstruction {
            opcode: 0xa3,
            offset: 9
        }
    ));
}

#[test]
fn call_returns_after_the_call() {
    let code = [
        0x8a, 0x00, 0x00, 0x05, // call 0x05
        0xff, // fin
        0x80, 0x07, // wait 7
        0xfd, // ret
    ];
    let conversion = Converter::new(&code).convert();
    assert!(conversion.is_clean());
    assert_eq!(conversion.midi.tracks[0].delta(), 7);
}

#[test]
fn continue_mode_extends_sounding_notes() {
    let code = [
        0x3c, 0x64, 0x20, // note, 32 ticks
        0x80, 0x08, // wait 8
        0x3c, 0x64, 0x20, // same key again
        0xff,
    ];

    let retrigger = Converter::new(&code).convert();
    assert_eq!(note_ons(&retrigger, 0), vec![(0, 0x3c), (8, 0x3c)]);

    let continuing = Converter::new(&code)
        .note_mode(NoteMode::Continue)
        .convert();
    assert_eq!(note_ons(&continuing, 0), vec![(0, 0x3c)]);
    let offs: Vec<u32> = continuing.midi.tracks[0]
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::NoteOff { .. }))
        .map(|e| e.time)
        .collect();
    assert_eq!(offs, vec![40]);
}

#[test]
fn nested_loops_hit_the_step_limit() {
    let code = [
        0xd4, 0xff, 0xd4, 0xff, 0xd4, 0xff, // three nested 255x loops
        0x80, 0x01, // wait 1
        0xfc, 0xfc, 0xfc, 0xff,
    ];
    let conversion = Converter::new(&code).convert();
    assert!(matches!(
        conversion.errors[0].error,
        RseqError::StepLimit(MAX_STEPS)
    ));
    assert!(conversion.midi.tracks[0].delta() > 0);
}

#[test]
fn labels_select_the_entry_point() {
    let code = [0xff, 0x80, 0x03, 0xff];
    let file = rseq_file(&code, &[("MAIN", 0), ("SUB", 1)]);
    let seq = SoundSequence::read(&file).unwrap();

    let conversion = Converter::for_sequence(&seq, Some("SUB"))
        .unwrap()
        .convert();
    assert_eq!(conversion.midi.tracks[0].delta(), 3);

    let conversion = Converter::for_sequence(&seq, None).unwrap().convert();
    assert_eq!(conversion.midi.tracks[0].delta(), 0);

    assert!(matches!(
        Converter::for_sequence(&seq, Some("NOPE")),
        Err(RseqError::UnknownLabel(_))
    ));
}
