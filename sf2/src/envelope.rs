//! Volume envelope conversion from the device's 7-bit codes.
//!
//! The tables are measurements of the hardware, so the results are
//! approximations of what it plays.

use rsnd::InstrumentParams;

/// Quietest level the envelope reaches, in tenths of a dB.
pub const VOLUME_MIN: f64 = -904.0;
/// Timecent value standing for an instant stage.
pub const INSTANT: i16 = i16::MIN;
/// Full attenuation in centibels.
pub const SILENCE: i16 = 1440;

/// Per-millisecond multipliers applied to the level during attack.
#[rustfmt::skip]
const ATTACK_TABLE: [f32; 128] = [
    0.9992175, 0.9984326, 0.9976452, 0.9968553,
    0.9960629, 0.9952679, 0.9944704, 0.9936704,
    0.9928677, 0.9920625, 0.9912546, 0.9904441,
    0.9896309, 0.9888151, 0.9879965, 0.9871752,
    0.9863512, 0.9855244, 0.9846949, 0.9838625,
    0.9830273, 0.9821893, 0.9813483, 0.9805045,
    0.9796578, 0.9788081, 0.9779555, 0.9770999,
    0.9762413, 0.9753797, 0.9745150, 0.9736472,
    0.9727763, 0.9719023, 0.9710251, 0.9701448,
    0.9692612, 0.9683744, 0.9674844, 0.9665910,
    0.9656944, 0.9647944, 0.9638910, 0.9629842,
    0.9620740, 0.9611604, 0.9602433, 0.9593226,
    0.9583984, 0.9574706, 0.9565392, 0.9556042,
    0.9546655, 0.9537231, 0.9527769, 0.9518270,
    0.9508732, 0.9499157, 0.9489542, 0.9479888,
    0.9470195, 0.9460462, 0.9450689, 0.9440875,
    0.9431020, 0.9421124, 0.9411186, 0.9401206,
    0.9391184, 0.9381118, 0.9371009, 0.9360856,
    0.9350659, 0.9340417, 0.9330131, 0.9319798,
    0.9309420, 0.9298995, 0.9288523, 0.9278004,
    0.9267436, 0.9256821, 0.9246156, 0.9235442,
    0.9224678, 0.9213864, 0.9202998, 0.9192081,
    0.9181112, 0.9170091, 0.9159016, 0.9147887,
    0.9136703, 0.9125465, 0.9114171, 0.9102821,
    0.9091414, 0.9079949, 0.9068427, 0.9056845,
    0.9045204, 0.9033502, 0.9021740, 0.9009916,
    0.8998029, 0.8986080, 0.8974066, 0.8961988,
    0.8949844, 0.8900599, 0.8824622, 0.8759247,
    0.8691861, 0.8636406, 0.8535788, 0.8430189,
    0.8286135, 0.8149099, 0.8002172, 0.7780663,
    0.7554750, 0.7242125, 0.6828239, 0.6329169,
    0.5592135, 0.4551411, 0.3298770, 0.0000000,
];

/// Sustain levels in tenths of a dB.
#[rustfmt::skip]
const SUSTAIN_TABLE: [i16; 128] = [
    -723, -722, -721, -651, -601, -562, -530, -503,
    -480, -460, -442, -425, -410, -396, -383, -371,
    -360, -349, -339, -330, -321, -313, -305, -297,
    -289, -282, -276, -269, -263, -257, -251, -245,
    -239, -234, -229, -224, -219, -214, -210, -205,
    -201, -196, -192, -188, -184, -180, -176, -173,
    -169, -165, -162, -158, -155, -152, -149, -145,
    -142, -139, -136, -133, -130, -127, -125, -122,
    -119, -116, -114, -111, -109, -106, -103, -101,
    -99,  -96,  -94,  -91,  -89,  -87,  -85,  -82,
    -80,  -78,  -76,  -74,  -72,  -70,  -68,  -66,
    -64,  -62,  -60,  -58,  -56,  -54,  -52,  -50,
    -49,  -47,  -45,  -43,  -42,  -40,  -38,  -36,
    -35,  -33,  -31,  -30,  -28,  -27,  -25,  -23,
    -22,  -20,  -19,  -17,  -16,  -14,  -13,  -11,
    -10,  -8,   -7,   -6,   -4,   -3,   -1,    0,
];

/// Level drop per millisecond, in tenths of a dB, for a decay or release code.
pub fn falling_rate(code: u8) -> f64 {
    let code = code & 0x7f;
    match code {
        0x7f => 65535.0,
        0x7e => 120.0 / 5.0,
        0..=0x31 => ((code as f64 * 2.0) + 1.0) / 128.0 / 5.0,
        _ => (60.0 / (126 - code) as f64) / 5.0,
    }
}

/// Milliseconds the attack takes to climb from silence to full level.
fn attack_ms(code: u8) -> u32 {
    let rate = ATTACK_TABLE[(code & 0x7f) as usize];
    let mut level = VOLUME_MIN as f32;
    let mut ms = 0;
    while level <= -1.0 / 32.0 {
        level *= rate;
        ms += 1;
    }
    ms
}

/// Envelope stage lengths in seconds and the sustain level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    /// Sustain level in tenths of a dB below full.
    pub sustain_db: f64,
    pub release: f64,
}

impl Envelope {
    pub fn from_params(params: &InstrumentParams) -> Self {
        let sustain = SUSTAIN_TABLE[(params.sustain & 0x7f) as usize] as f64;
        let hold = params.hold as f64 + 1.0;

        Self {
            attack: attack_ms(params.attack) as f64 / 1000.0,
            hold: hold * hold / 4000.0,
            decay: -sustain / falling_rate(params.decay) / 1000.0,
            sustain_db: sustain,
            release: (sustain - VOLUME_MIN) / falling_rate(params.release) / 1000.0,
        }
    }

    /// Sustain level as a fraction of full volume.
    pub fn sustain_level(&self) -> f64 {
        let level = 1.0 - self.sustain_db / VOLUME_MIN;
        if level > 1.0 {
            log::debug!("sustain level {:.3} clamped to full volume", level);
            1.0
        } else {
            level.max(0.0)
        }
    }

    /// Sustain attenuation in centibels.
    pub fn sustain_attenuation(&self) -> i16 {
        let attenuation = (1.0 - self.sustain_level()) * -VOLUME_MIN;
        (attenuation.round() as i16).min(SILENCE)
    }
}

/// Seconds to timecents; an instant stage maps to [`INSTANT`].
pub fn timecents(seconds: f64) -> i16 {
    if seconds <= 0.0 {
        return INSTANT;
    }
    let tc = (1200.0 * seconds.log2()).round();
    tc.max(i16::MIN as f64 + 1.0).min(i16::MAX as f64) as i16
}

/// Volume (0..=127) to initial attenuation in centibels.
pub fn attenuation(volume: u8) -> i16 {
    if volume == 0 {
        return SILENCE;
    }
    let cb = -200.0 * (volume.min(127) as f64 / 127.0).log10();
    (cb.round() as i16).min(SILENCE)
}

/// Pan (0..=127, centered at 64) to the generator's -1000..=1000 range.
pub fn pan(pan: u8) -> i16 {
    (1000.0 * (pan.min(127) as f64 - 64.0) / 64.0).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(attack: u8, hold: u8, decay: u8, sustain: u8, release: u8) -> InstrumentParams {
        InstrumentParams {
            wave_index: 0,
            attack,
            decay,
            sustain,
            release,
            hold,
            wave_location: 0,
            note_off_type: 0,
            alternate_assign: 0,
            original_key: 60,
            volume: 127,
            pan: 64,
            surround_pan: 0,
            pitch: 1.0,
        }
    }

    #[test]
    fn fastest_codes_are_near_instant() {
        let env = Envelope::from_params(&params(127, 0, 127, 127, 127));
        assert_relative_eq!(env.attack, 0.001);
        assert_relative_eq!(env.hold, 1.0 / 4000.0);
        assert_relative_eq!(env.decay, 0.0);
        assert_relative_eq!(env.sustain_level(), 1.0);
        assert_eq!(env.sustain_attenuation(), 0);
        assert_relative_eq!(env.release, 904.0 / 65535.0 / 1000.0);
    }

    #[test]
    fn slow_release_from_low_sustain() {
        let env = Envelope::from_params(&params(127, 0, 0, 0, 0));
        // 0.2 / 128 per ms over 72.3 dB
        assert_relative_eq!(env.decay, 723.0 / (1.0 / 640.0) / 1000.0, epsilon = 1e-9);
        assert_relative_eq!(env.release, 181.0 * 640.0 / 1000.0, epsilon = 1e-9);
        assert_relative_eq!(env.sustain_level(), 1.0 - 723.0 / 904.0);
        assert_eq!(env.sustain_attenuation(), 723);
    }

    #[test]
    fn slower_attack_codes_take_longer() {
        let slow = attack_ms(0);
        let fast = attack_ms(100);
        assert!(slow > fast);
        assert!(fast > 1);
        // 904 * r^n <= 1/32
        let expected = ((1.0f64 / 32.0 / 904.0).ln() / (0.9992175f32 as f64).ln()).ceil() as i64;
        assert!((slow as i64 - expected).abs() <= 2);
    }

    #[test]
    fn falling_rates() {
        assert_relative_eq!(falling_rate(0x7e), 24.0);
        assert_relative_eq!(falling_rate(0x40), 60.0 / 62.0 / 5.0);
        assert_relative_eq!(falling_rate(0x10), 33.0 / 640.0);
    }

    #[test]
    fn timecent_conversion() {
        assert_eq!(timecents(0.0), INSTANT);
        assert_eq!(timecents(1.0), 0);
        assert_eq!(timecents(2.0), 1200);
        assert_eq!(timecents(0.5), -1200);
        assert_eq!(timecents(1e-30), i16::MIN + 1);
    }

    #[test]
    fn volume_and_pan() {
        assert_eq!(attenuation(127), 0);
        assert_eq!(attenuation(0), SILENCE);
        assert_eq!(attenuation(64), 60);
        assert_eq!(pan(64), 0);
        assert_eq!(pan(0), -1000);
        assert_eq!(pan(127), 984);
    }
}
