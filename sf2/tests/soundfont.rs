use byteorder::{ByteOrder, BE, LE};
use sf2::riff::{read_chunk, ID};
use sf2::soundfont::*;
use sf2::{SoundFont, Sf2Error};
use rsnd::{DecodedWave, InstrumentParams, InstrumentRegion, SoundBank};
use std::collections::HashMap;

/// A big-endian bank whose single program is a `Direct` region.
fn direct_bank() -> Vec<u8> {
    let mut f = vec![0u8; 0x20];
    f[0..4].copy_from_slice(b"RBNK");
    f[4..6].copy_from_slice(&[0xfe, 0xff]);
    BE::write_u16(&mut f[6..], 0x0101);
    BE::write_u16(&mut f[0x0c..], 0x18);
    BE::write_u16(&mut f[0x0e..], 1);

    f.extend_from_slice(b"DATA");
    f.extend_from_slice(&[0; 4]);
    // one program, an offset reference to the instrument right after it
    f.extend_from_slice(&[0, 0, 0, 1]);
    f.extend_from_slice(&[1, 1, 0, 0, 0, 0, 0, 0x0c]);
    // instrument: wave 0, fastest envelope, key 60, full volume, centered
    f.extend_from_slice(&[0, 0, 0, 0]);
    f.extend_from_slice(&[127, 127, 127, 127, 0, 0, 0, 0, 60, 127, 64, 0]);
    f.extend_from_slice(&1.0f32.to_be_bytes());
    f.resize(0x34 + 0x30, 0);

    let len = (f.len() - 0x20) as u32;
    BE::write_u32(&mut f[0x24..], len);
    BE::write_u32(&mut f[0x10..], 0x20);
    BE::write_u32(&mut f[0x14..], len);
    let size = f.len() as u32;
    BE::write_u32(&mut f[8..], size);
    f
}

fn wave(frames: usize, looped: bool) -> DecodedWave {
    DecodedWave {
        sample_rate: 32000,
        channels: 1,
        looped,
        loop_start: 2,
        loop_end: frames as u32,
        samples: (0..frames as i16).collect(),
    }
}

fn params(wave_index: i32, original_key: u8) -> InstrumentParams {
    InstrumentParams {
        wave_index,
        attack: 127,
        decay: 127,
        sustain: 127,
        release: 127,
        hold: 0,
        wave_location: 0,
        note_off_type: 0,
        alternate_assign: 0,
        original_key,
        volume: 127,
        pan: 64,
        surround_pan: 0,
        pitch: 1.0,
    }
}

/// Every leaf chunk of the file by id.
fn leaves(bytes: &[u8]) -> HashMap<ID, Vec<u8>> {
    fn walk(mut data: &[u8], out: &mut HashMap<ID, Vec<u8>>) {
        while let Some((id, body)) = read_chunk(&mut data) {
            if id == ID(*b"LIST") || id == ID(*b"RIFF") {
                walk(&body[4..], out);
            } else {
                out.insert(id, body.to_vec());
            }
        }
    }
    let mut out = HashMap::new();
    walk(bytes, &mut out);
    out
}

fn gens(igen: &[u8]) -> Vec<(u16, u16)> {
    igen.chunks(GEN_SIZE)
        .map(|g| (LE::read_u16(&g[0..]), LE::read_u16(&g[2..])))
        .collect()
}

#[test]
fn direct_program_chunk_sizes() {
    let file = direct_bank();
    let bank = SoundBank::read(&file).unwrap();
    assert_eq!(bank.program_count(), 1);

    let sf = SoundFont::from_bank(&bank, &[wave(10, true)], "bank").unwrap();
    let bytes = sf.to_bytes();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"sfbk");
    assert_eq!(LE::read_u32(&bytes[4..]) as usize + 8, bytes.len());

    let chunks = leaves(&bytes);
    let size = |id: &[u8; 4]| chunks[&ID(*id)].len();
    assert_eq!(size(b"phdr"), 2 * PHDR_SIZE);
    assert_eq!(size(b"pbag"), 2 * BAG_SIZE);
    assert_eq!(size(b"inst"), 2 * INST_SIZE);
    assert_eq!(size(b"ibag"), 2 * BAG_SIZE);
    assert_eq!(size(b"shdr"), 2 * SHDR_SIZE);
    assert_eq!(size(b"pmod"), MOD_SIZE);
    assert_eq!(size(b"imod"), MOD_SIZE);
    assert_eq!(size(b"pgen"), 3 * GEN_SIZE);
    assert_eq!(size(b"igen"), 13 * GEN_SIZE);
    assert_eq!(size(b"smpl"), (10 + SAMPLE_PADDING) * 2);
    assert_eq!(chunks[&ID(*b"ifil")], vec![2, 0, 1, 0]);
    assert_eq!(chunks[&ID(*b"INAM")], b"bank\0\0".to_vec());
}

#[test]
fn zone_generators_in_order() {
    let file = direct_bank();
    let bank = SoundBank::read(&file).unwrap();
    let sf = SoundFont::from_bank(&bank, &[wave(10, true)], "bank").unwrap();
    let igen = gens(&leaves(&sf.to_bytes())[&ID(*b"igen")]);

    let opers: Vec<u16> = igen.iter().map(|g| g.0).collect();
    assert_eq!(
        opers,
        vec![
            gen::KEY_RANGE,
            gen::VEL_RANGE,
            gen::INITIAL_ATTENUATION,
            gen::PAN,
            gen::SAMPLE_MODES,
            gen::OVERRIDING_ROOT_KEY,
            gen::ATTACK_VOL_ENV,
            gen::HOLD_VOL_ENV,
            gen::DECAY_VOL_ENV,
            gen::SUSTAIN_VOL_ENV,
            gen::RELEASE_VOL_ENV,
            gen::SAMPLE_ID,
            0,
        ]
    );
    // key range 0..=127 stored lo, hi
    assert_eq!(igen[0].1, 0x7f00);
    assert_eq!(igen[2].1, 0);
    assert_eq!(igen[3].1, 0);
    assert_eq!(igen[4].1, 1);
    assert_eq!(igen[5].1, 60);
    assert_eq!(igen[9].1, 0);
    assert_eq!(igen[11].1, 0);
}

#[test]
fn unset_velocity_range_is_left_out() {
    let low = params(0, 48);
    let high = params(1, 72);
    let programs = vec![vec![
        InstrumentRegion {
            key_lo: 0,
            key_hi: 59,
            vel_lo: 0,
            vel_hi: 0,
            params: &low,
        },
        InstrumentRegion {
            key_lo: 60,
            key_hi: 127,
            vel_lo: 0,
            vel_hi: 127,
            params: &high,
        },
    ]];
    let sf = SoundFont::from_programs(&programs, &[wave(4, false), wave(6, true)], "b").unwrap();
    let chunks = leaves(&sf.to_bytes());

    let bags: Vec<u16> = chunks[&ID(*b"ibag")]
        .chunks(BAG_SIZE)
        .map(|b| LE::read_u16(b))
        .collect();
    assert_eq!(bags, vec![0, 11, 23]);
    assert_eq!(chunks[&ID(*b"igen")].len(), 24 * GEN_SIZE);

    // second sample starts after the first and its padding, keyed from its zone
    let shdr = &chunks[&ID(*b"shdr")];
    let second = &shdr[SHDR_SIZE..2 * SHDR_SIZE];
    assert_eq!(&second[..4], b"wav1");
    assert_eq!(LE::read_u32(&second[20..]), 4 + SAMPLE_PADDING as u32);
    assert_eq!(LE::read_u32(&second[24..]), 10 + SAMPLE_PADDING as u32);
    assert_eq!(LE::read_u32(&second[28..]), 6 + SAMPLE_PADDING as u32);
    assert_eq!(LE::read_u32(&second[36..]), 32000);
    assert_eq!(second[40], 72);
    assert_eq!(&shdr[2 * SHDR_SIZE..2 * SHDR_SIZE + 3], b"EOS");
}

#[test]
fn unreferenced_samples_default_their_root_key() {
    let programs: Vec<Vec<InstrumentRegion<'_>>> = vec![Vec::new()];
    let sf = SoundFont::from_programs(&programs, &[wave(4, false)], "b").unwrap();
    let shdr = &leaves(&sf.to_bytes())[&ID(*b"shdr")];
    assert_eq!(shdr[40], DEFAULT_ROOT_KEY);
}

#[test]
fn missing_waves_are_reported() {
    let file = direct_bank();
    let bank = SoundBank::read(&file).unwrap();
    assert!(matches!(
        SoundFont::from_bank(&bank, &[], "bank"),
        Err(Sf2Error::MissingWave { program: 0, wave: 0 })
    ));
}
