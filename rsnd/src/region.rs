//! Key/velocity region trees of banks.
//!
//! Each bank program is a tree of regions. The first tier is keyed by note,
//! the second by velocity, and the leaves hold the [`InstrumentParams`].

use crate::error::*;
use crate::types::*;

/// Bank and wave-sound-data instruments share this record layout.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentParams {
    pub wave_index: i32,
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
    pub hold: u8,
    pub wave_location: u8,
    pub note_off_type: u8,
    pub alternate_assign: u8,
    pub original_key: u8,
    pub volume: u8,
    pub pan: u8,
    pub surround_pan: u8,
    pub pitch: f32,
}

impl InstrumentParams {
    pub const SIZE: usize = 0x30;

    pub fn read(view: &View<'_>, at: usize) -> Result<Self> {
        let b = view.bytes(at + 4, 12)?;
        Ok(Self {
            wave_index: view.i32(at)?,
            attack: b[0],
            decay: b[1],
            sustain: b[2],
            release: b[3],
            hold: b[4],
            wave_location: b[5],
            note_off_type: b[6],
            alternate_assign: b[7],
            original_key: b[8],
            volume: b[9],
            pan: b[10],
            surround_pan: b[11],
            pitch: view.f32(at + 0x10)?,
        })
    }
}

/// Region node tags stored in a reference's payload type.
pub const REGION_DIRECT: u8 = 1;
pub const REGION_RANGE: u8 = 2;
pub const REGION_INDEX: u8 = 3;
pub const REGION_NONE: u8 = 4;

/// Nesting deeper than this is treated as a reference cycle.
const MAX_DEPTH: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    Direct(InstrumentParams),
    /// `(upper bound, child)` pairs with strictly increasing bounds.
    Range(Vec<(u8, Region)>),
    /// Children for keys `min..max`.
    Index {
        min: u8,
        max: u8,
        children: Vec<Region>,
    },
    None,
}

impl Region {
    /// Decodes the region tree behind `region`. References resolve against `base`.
    pub fn read(view: &View<'_>, region: DataRef, base: usize) -> Result<Self> {
        Self::read_at_depth(view, region, base, 0)
    }

    fn read_at_depth(view: &View<'_>, region: DataRef, base: usize, depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(RsndError::malformed(base, "region tree nests too deeply"));
        }
        let at = match region.resolve(base) {
            Some(at) => at,
            None => return Ok(Region::None),
        };

        match region.data_type {
            REGION_DIRECT => Ok(Region::Direct(InstrumentParams::read(view, at)?)),
            REGION_RANGE => {
                let count = view.u8(at)? as usize;
                let keys = view.bytes(at + 1, count)?;
                if keys.windows(2).any(|w| w[0] >= w[1]) {
                    log::warn!("range region at 0x{:x} has unordered bounds {:?}", at, keys);
                }
                // child references follow the key list, aligned to 4 bytes
                let refs = at + ((1 + count + 3) & !3);
                let mut children = Vec::with_capacity(count);
                for (i, key) in keys.iter().enumerate() {
                    let child = view.data_ref(refs + i * DataRef::SIZE)?;
                    children.push((*key, Self::read_at_depth(view, child, base, depth + 1)?));
                }
                Ok(Region::Range(children))
            }
            REGION_INDEX => {
                let min = view.u8(at)?;
                let max = view.u8(at + 1)?;
                let mut children = Vec::with_capacity(max.saturating_sub(min) as usize);
                for i in 0..max.saturating_sub(min) as usize {
                    let child = view.data_ref(at + 4 + i * DataRef::SIZE)?;
                    children.push(Self::read_at_depth(view, child, base, depth + 1)?);
                }
                Ok(Region::Index { min, max, children })
            }
            REGION_NONE => Ok(Region::None),
            other => {
                log::warn!("skipping unsupported region type {} at 0x{:x}", other, at);
                Ok(Region::None)
            }
        }
    }

    /// The child of this tier that covers `key`.
    ///
    /// A `Direct` region covers every key with itself. Keys outside an
    /// index region are an error rather than being clamped.
    pub fn child(&self, key: u8) -> Result<Option<&Region>> {
        match self {
            Region::Direct(_) => Ok(Some(self)),
            Region::Range(children) => Ok(children
                .iter()
                .find(|(bound, _)| key <= *bound)
                .map(|(_, child)| child)),
            Region::Index { min, max, children } => {
                if key < *min || key >= *max {
                    return Err(RsndError::KeyOutOfDomain {
                        key,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(children.get((key - min) as usize))
            }
            Region::None => Ok(None),
        }
    }

    /// Walks one tier per entry of `keys` until reaching instrument parameters.
    pub fn resolve(&self, keys: &[u8]) -> Result<Option<&InstrumentParams>> {
        match self {
            Region::Direct(params) => Ok(Some(params)),
            Region::None => Ok(None),
            _ => match keys.split_first() {
                Some((key, rest)) => match self.child(*key)? {
                    Some(child) => child.resolve(rest),
                    None => Ok(None),
                },
                None => Ok(None),
            },
        }
    }

    /// `(lo, hi, child)` for every child of this tier.
    ///
    /// Range bounds only store the upper key, so each lower key is one past
    /// the previous sibling's upper key.
    pub fn subregions(&self) -> Vec<(u8, u8, &Region)> {
        match self {
            Region::Direct(_) => vec![(0, 0x7f, self)],
            Region::Range(children) => {
                let mut lo = 0u8;
                let mut out = Vec::with_capacity(children.len());
                for (hi, child) in children {
                    out.push((lo, *hi, child));
                    lo = hi.saturating_add(1);
                }
                out
            }
            Region::Index { min, children, .. } => children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let key = min.saturating_add(i as u8);
                    (key, key, child)
                })
                .collect(),
            Region::None => Vec::new(),
        }
    }

    /// Every leaf of a key tier followed by a velocity tier.
    pub fn flatten(&self) -> Vec<InstrumentRegion<'_>> {
        let mut out = Vec::new();
        self.collect(&mut Vec::with_capacity(TIERS), &mut out);
        out
    }

    fn collect<'a>(&'a self, ranges: &mut Vec<(u8, u8)>, out: &mut Vec<InstrumentRegion<'a>>) {
        if ranges.len() == TIERS {
            match self {
                Region::Direct(params) => out.push(InstrumentRegion {
                    key_lo: ranges[0].0,
                    key_hi: ranges[0].1,
                    vel_lo: ranges[1].0,
                    vel_hi: ranges[1].1,
                    params,
                }),
                Region::None => {}
                _ => log::debug!("ignoring region nested below the velocity tier"),
            }
            return;
        }

        for (lo, hi, child) in self.subregions() {
            ranges.push((lo, hi));
            child.collect(ranges, out);
            ranges.pop();
        }
    }
}

/// Key tier, then velocity tier.
const TIERS: usize = 2;

/// A leaf of a region tree with the key and velocity span it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentRegion<'a> {
    pub key_lo: u8,
    pub key_hi: u8,
    pub vel_lo: u8,
    pub vel_hi: u8,
    pub params: &'a InstrumentParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(wave_index: i32) -> InstrumentParams {
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
            original_key: 60,
            volume: 127,
            pan: 64,
            surround_pan: 0,
            pitch: 1.0,
        }
    }

    fn wave_of(found: Option<&InstrumentParams>) -> Option<i32> {
        found.map(|p| p.wave_index)
    }

    #[test]
    fn range_selects_first_bound_at_or_above_key() {
        let tree = Region::Range(vec![
            (10, Region::Direct(params(1))),
            (20, Region::Direct(params(2))),
            (127, Region::Direct(params(3))),
        ]);
        assert_eq!(wave_of(tree.resolve(&[15, 64]).unwrap()), Some(2));
        assert_eq!(wave_of(tree.resolve(&[5, 64]).unwrap()), Some(1));
        assert_eq!(wave_of(tree.resolve(&[127, 64]).unwrap()), Some(3));
        assert_eq!(wave_of(tree.resolve(&[10, 64]).unwrap()), Some(1));
    }

    #[test]
    fn range_past_last_bound_has_no_instrument() {
        let tree = Region::Range(vec![(60, Region::Direct(params(1)))]);
        assert_eq!(tree.resolve(&[61, 0]).unwrap(), None);
    }

    #[test]
    fn index_out_of_domain_is_reported() {
        let tree = Region::Index {
            min: 5,
            max: 10,
            children: (5..10).map(|i| Region::Direct(params(i))).collect(),
        };
        assert!(matches!(
            tree.resolve(&[0, 0]),
            Err(RsndError::KeyOutOfDomain { key: 0, min: 5, max: 10 })
        ));
        assert!(tree.child(10).is_err());
        assert_eq!(wave_of(tree.resolve(&[7, 0]).unwrap()), Some(7));
    }

    #[test]
    fn none_means_no_instrument() {
        let tree = Region::Range(vec![(127, Region::None)]);
        assert_eq!(tree.resolve(&[3, 3]).unwrap(), None);
        assert_eq!(Region::None.resolve(&[3, 3]).unwrap(), None);
    }

    #[test]
    fn velocity_tier_is_walked_after_key() {
        let tree = Region::Range(vec![(
            127,
            Region::Range(vec![
                (63, Region::Direct(params(10))),
                (127, Region::Direct(params(11))),
            ]),
        )]);
        assert_eq!(wave_of(tree.resolve(&[40, 20]).unwrap()), Some(10));
        assert_eq!(wave_of(tree.resolve(&[40, 100]).unwrap()), Some(11));
    }

    #[test]
    fn flatten_derives_lower_bounds() {
        let tree = Region::Range(vec![
            (
                47,
                Region::Range(vec![
                    (63, Region::Direct(params(0))),
                    (127, Region::Direct(params(1))),
                ]),
            ),
            (127, Region::Direct(params(2))),
        ]);
        let spans: Vec<_> = tree
            .flatten()
            .iter()
            .map(|r| (r.key_lo, r.key_hi, r.vel_lo, r.vel_hi, r.params.wave_index))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 47, 0, 63, 0), (0, 47, 64, 127, 1), (48, 127, 0, 127, 2)]
        );
    }

    #[test]
    fn flatten_direct_covers_everything() {
        let tree = Region::Direct(params(4));
        let regions = tree.flatten();
        assert_eq!(regions.len(), 1);
        assert_eq!(
            (regions[0].key_lo, regions[0].key_hi, regions[0].vel_lo, regions[0].vel_hi),
            (0, 127, 0, 127)
        );
    }
}
