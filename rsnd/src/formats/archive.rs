use crate::error::*;
use crate::types::*;
use bitflags::bitflags;

bitflags! {
    pub struct NodeFlags: u16 {
        const LEAF = 0x0001;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringTreeNode {
    pub flags: NodeFlags,
    /// Bit of the key tested at this node, counted from the first byte's MSB.
    pub bit: u16,
    pub left: u32,
    pub right: u32,
    pub string_index: i32,
    pub id: i32,
}

impl StringTreeNode {
    pub const SIZE: usize = 0x14;

    fn read(view: &View<'_>, at: usize) -> Result<Self> {
        Ok(Self {
            flags: NodeFlags::from_bits_truncate(view.u16(at)?),
            bit: view.u16(at + 2)?,
            left: view.u32(at + 4)?,
            right: view.u32(at + 8)?,
            string_index: view.i32(at + 0x0c)?,
            id: view.i32(at + 0x10)?,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.contains(NodeFlags::LEAF)
    }
}

/// Patricia trie that maps names to ids by testing one key bit per node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringTree {
    pub root: u32,
    pub nodes: Vec<StringTreeNode>,
}

impl StringTree {
    fn read(view: &View<'_>, at: usize) -> Result<Self> {
        Ok(Self {
            root: view.u32(at)?,
            nodes: view.table(at + 4, StringTreeNode::SIZE, |node| {
                StringTreeNode::read(view, node)
            })?,
        })
    }

    /// Id of `name`. `string` resolves a node's string index.
    pub fn lookup<'s>(&self, name: &str, string: impl Fn(i32) -> Option<&'s str>) -> Option<i32> {
        let key = name.as_bytes();
        let mut node = self.nodes.get(self.root as usize)?;

        // every step follows a child, so a well formed tree ends within nodes.len() steps
        for _ in 0..=self.nodes.len() {
            if node.is_leaf() {
                return match string(node.string_index) {
                    Some(found) if found == name => Some(node.id),
                    _ => None,
                };
            }
            let byte = key.get(node.bit as usize / 8).copied().unwrap_or(0);
            let set = byte & (0x80 >> (node.bit % 8)) != 0;
            let next = if set { node.right } else { node.left };
            node = self.nodes.get(next as usize)?;
        }

        log::warn!("string tree lookup of {:?} does not reach a leaf", name);
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundKind {
    Sequence {
        offset: u32,
        bank: u32,
        alloc_track: u32,
        channel_priority: u8,
    },
    Stream {
        start_position: u32,
        alloc_channel_count: u16,
        alloc_track_flag: u16,
    },
    Wave {
        index: u32,
        alloc_track: u32,
        channel_priority: u8,
    },
    Unknown(u8),
}

impl SoundKind {
    pub const SEQ: u8 = 1;
    pub const STRM: u8 = 2;
    pub const WAVE: u8 = 3;

    pub fn name(&self) -> &'static str {
        match self {
            SoundKind::Sequence { .. } => "SEQ",
            SoundKind::Stream { .. } => "STRM",
            SoundKind::Wave { .. } => "WAVE",
            SoundKind::Unknown(_) => "UNK",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundInfo {
    pub name_index: u32,
    pub file_index: u32,
    pub player_id: u32,
    pub volume: u8,
    pub player_priority: u8,
    pub remote_filter: u8,
    pub pan_mode: u8,
    pub pan_curve: u8,
    pub actor_player_id: u8,
    pub kind: SoundKind,
}

impl SoundInfo {
    fn read(view: &View<'_>, at: usize, base: usize) -> Result<Self> {
        let sound_type = view.u8(at + 0x16)?;
        let ext = view.data_ref(at + 0x18)?.resolve(base);
        let kind = match (sound_type, ext) {
            (SoundKind::SEQ, Some(ext)) => SoundKind::Sequence {
                offset: view.u32(ext)?,
                bank: view.u32(ext + 4)?,
                alloc_track: view.u32(ext + 8)?,
                channel_priority: view.u8(ext + 0x0c)?,
            },
            (SoundKind::STRM, Some(ext)) => SoundKind::Stream {
                start_position: view.u32(ext)?,
                alloc_channel_count: view.u16(ext + 4)?,
                alloc_track_flag: view.u16(ext + 6)?,
            },
            (SoundKind::WAVE, Some(ext)) => SoundKind::Wave {
                index: view.u32(ext)?,
                alloc_track: view.u32(ext + 4)?,
                channel_priority: view.u8(ext + 8)?,
            },
            (other, _) => SoundKind::Unknown(other),
        };

        Ok(Self {
            name_index: view.u32(at)?,
            file_index: view.u32(at + 4)?,
            player_id: view.u32(at + 8)?,
            volume: view.u8(at + 0x14)?,
            player_priority: view.u8(at + 0x15)?,
            remote_filter: view.u8(at + 0x17)?,
            pan_mode: view.u8(at + 0x28)?,
            pan_curve: view.u8(at + 0x29)?,
            actor_player_id: view.u8(at + 0x2a)?,
            kind,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankInfo {
    pub name_index: u32,
    pub file_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name_index: u32,
    pub sound_count: u8,
    pub heap_size: u32,
}

/// A group slot a file is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilePlacement {
    pub group: u32,
    pub item: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub file_size: u32,
    pub wave_data_size: u32,
    pub external_name: Option<String>,
    pub placements: Vec<FilePlacement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupItem {
    pub file_index: u32,
    pub file_offset: u32,
    pub file_size: u32,
    pub wave_data_offset: u32,
    pub wave_data_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    /// Negative for anonymous groups.
    pub name_index: i32,
    pub entry_num: u32,
    pub external_name: Option<String>,
    pub file_offset: u32,
    pub file_size: u32,
    pub wave_data_offset: u32,
    pub wave_data_size: u32,
    pub items: Vec<GroupItem>,
}

impl GroupInfo {
    pub fn is_external(&self) -> bool {
        self.external_name.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoundCounts {
    pub seq_sounds: u16,
    pub seq_tracks: u16,
    pub strm_sounds: u16,
    pub strm_tracks: u16,
    pub strm_channels: u16,
    pub wave_sounds: u16,
    pub wave_tracks: u16,
}

/// Name tables of the symbol block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Symbols {
    pub strings: Vec<String>,
    pub sounds: StringTree,
    pub players: StringTree,
    pub groups: StringTree,
    pub banks: StringTree,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameTree {
    Sound,
    Player,
    Group,
    Bank,
}

/// A sound archive (`RSAR`) bundling every sound resource of a game.
#[derive(Debug)]
pub struct SoundArchive<'a> {
    pub header: FileHeader,
    pub symbols: Symbols,
    pub sounds: Vec<SoundInfo>,
    pub banks: Vec<BankInfo>,
    pub players: Vec<PlayerInfo>,
    pub files: Vec<FileInfo>,
    pub groups: Vec<GroupInfo>,
    pub counts: SoundCounts,
    view: View<'a>,
}

impl<'a> SoundArchive<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RSAR";

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;

        let symbols = match view.offset(0x10)? {
            0 => Symbols::default(),
            _ => read_symbols(&view, Block::locate(&view, 0x10, b"SYMB")?.base())?,
        };

        let info = Block::locate(&view, 0x18, b"INFO")?;
        let base = info.base();
        let table = |index: usize| -> Result<Vec<usize>> {
            match view.data_ref(base + index * DataRef::SIZE)?.resolve(base) {
                Some(at) => Ok(view.ref_table(at, base)?.into_iter().flatten().collect()),
                None => Ok(Vec::new()),
            }
        };

        let sounds = table(0)?
            .into_iter()
            .map(|at| SoundInfo::read(&view, at, base))
            .collect::<Result<Vec<_>>>()?;
        let banks = table(1)?
            .into_iter()
            .map(|at| {
                Ok(BankInfo {
                    name_index: view.u32(at)?,
                    file_index: view.u32(at + 4)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let players = table(2)?
            .into_iter()
            .map(|at| {
                Ok(PlayerInfo {
                    name_index: view.u32(at)?,
                    sound_count: view.u8(at + 4)?,
                    heap_size: view.u32(at + 8)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let files = table(3)?
            .into_iter()
            .map(|at| read_file_info(&view, at, base))
            .collect::<Result<Vec<_>>>()?;
        let groups = table(4)?
            .into_iter()
            .map(|at| read_group_info(&view, at, base))
            .collect::<Result<Vec<_>>>()?;

        let counts = match view.data_ref(base + 5 * DataRef::SIZE)?.resolve(base) {
            Some(at) => SoundCounts {
                seq_sounds: view.u16(at)?,
                seq_tracks: view.u16(at + 2)?,
                strm_sounds: view.u16(at + 4)?,
                strm_tracks: view.u16(at + 6)?,
                strm_channels: view.u16(at + 8)?,
                wave_sounds: view.u16(at + 0x0a)?,
                wave_tracks: view.u16(at + 0x0c)?,
            },
            None => SoundCounts::default(),
        };

        Ok(Self {
            header,
            symbols,
            sounds,
            banks,
            players,
            files,
            groups,
            counts,
            view,
        })
    }

    /// Entry `index` of the string table; negative indices are anonymous.
    pub fn string(&self, index: i32) -> Option<&str> {
        if index < 0 {
            return None;
        }
        self.symbols.strings.get(index as usize).map(String::as_str)
    }

    /// Same as [`SoundArchive::string`] for the unsigned name fields.
    pub fn name(&self, index: u32) -> Option<&str> {
        if index > i32::MAX as u32 {
            return None;
        }
        self.string(index as i32)
    }

    /// Resolves `name` to an id through one of the symbol trees.
    pub fn lookup(&self, tree: NameTree, name: &str) -> Option<i32> {
        let tree = match tree {
            NameTree::Sound => &self.symbols.sounds,
            NameTree::Player => &self.symbols.players,
            NameTree::Group => &self.symbols.groups,
            NameTree::Bank => &self.symbols.banks,
        };
        tree.lookup(name, |index| self.string(index))
    }

    pub fn sound(&self, index: usize) -> Result<&SoundInfo> {
        self.sounds
            .get(index)
            .ok_or_else(|| RsndError::NotFound(format!("sound {}", index)))
    }

    pub fn group(&self, index: usize) -> Result<&GroupInfo> {
        self.groups
            .get(index)
            .ok_or_else(|| RsndError::NotFound(format!("group {}", index)))
    }

    pub fn file(&self, index: usize) -> Result<&FileInfo> {
        self.files
            .get(index)
            .ok_or_else(|| RsndError::NotFound(format!("file {}", index)))
    }

    fn group_item(&self, group: usize, item: usize) -> Result<(&GroupInfo, &GroupItem)> {
        let info = self.group(group)?;
        let entry = info
            .items
            .get(item)
            .ok_or_else(|| RsndError::NotFound(format!("item {} of group {}", item, group)))?;
        Ok((info, entry))
    }

    /// File bytes stored in slot `item` of `group`.
    pub fn group_file(&self, group: usize, item: usize) -> Result<&'a [u8]> {
        let (info, entry) = self.group_item(group, item)?;
        if info.is_external() {
            return Err(RsndError::NotFound(format!("internal data of external group {}", group)));
        }
        let start = info.file_offset as usize + entry.file_offset as usize;
        self.view.bytes(start, entry.file_size as usize)
    }

    /// Wave data accompanying slot `item` of `group`.
    pub fn group_wave_data(&self, group: usize, item: usize) -> Result<&'a [u8]> {
        let (info, entry) = self.group_item(group, item)?;
        if info.is_external() {
            return Err(RsndError::NotFound(format!("internal data of external group {}", group)));
        }
        let start = info.wave_data_offset as usize + entry.wave_data_offset as usize;
        self.view.bytes(start, entry.wave_data_size as usize)
    }

    fn first_placement(&self, file: usize) -> Result<FilePlacement> {
        let info = self.file(file)?;
        if let Some(name) = &info.external_name {
            return Err(RsndError::NotFound(format!("file {} is external ({})", file, name)));
        }
        info.placements
            .first()
            .copied()
            .ok_or_else(|| RsndError::NotFound(format!("group holding file {}", file)))
    }

    /// Bytes of `file`, taken from the first group that stores it.
    pub fn file_data(&self, file: usize) -> Result<&'a [u8]> {
        let place = self.first_placement(file)?;
        self.group_file(place.group as usize, place.item as usize)
    }

    pub fn file_wave_data(&self, file: usize) -> Result<&'a [u8]> {
        let place = self.first_placement(file)?;
        self.group_wave_data(place.group as usize, place.item as usize)
    }
}

fn read_symbols(view: &View<'_>, base: usize) -> Result<Symbols> {
    let strings = view.table(base + view.offset(base)?, 4, |at| {
        view.cstr(base + view.offset(at)?)
    })?;
    let tree = |entry: usize| -> Result<StringTree> {
        StringTree::read(view, base + view.offset(base + entry)?)
    };
    Ok(Symbols {
        strings,
        sounds: tree(4)?,
        players: tree(8)?,
        groups: tree(0x0c)?,
        banks: tree(0x10)?,
    })
}

fn external_name(view: &View<'_>, at: usize, base: usize) -> Result<Option<String>> {
    match view.data_ref(at)?.resolve(base) {
        Some(name) => Ok(Some(view.cstr(name)?)),
        None => Ok(None),
    }
}

fn read_file_info(view: &View<'_>, at: usize, base: usize) -> Result<FileInfo> {
    let placements = match view.data_ref(at + 0x14)?.resolve(base) {
        Some(table) => view
            .ref_table(table, base)?
            .into_iter()
            .flatten()
            .map(|place| {
                Ok(FilePlacement {
                    group: view.u32(place)?,
                    item: view.u32(place + 4)?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(FileInfo {
        file_size: view.u32(at)?,
        wave_data_size: view.u32(at + 4)?,
        external_name: external_name(view, at + 0x0c, base)?,
        placements,
    })
}

fn read_group_info(view: &View<'_>, at: usize, base: usize) -> Result<GroupInfo> {
    let items = match view.data_ref(at + 0x20)?.resolve(base) {
        Some(table) => view
            .ref_table(table, base)?
            .into_iter()
            .flatten()
            .map(|item| {
                Ok(GroupItem {
                    file_index: view.u32(item)?,
                    file_offset: view.u32(item + 4)?,
                    file_size: view.u32(item + 8)?,
                    wave_data_offset: view.u32(item + 0x0c)?,
                    wave_data_size: view.u32(item + 0x10)?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(GroupInfo {
        name_index: view.i32(at)?,
        entry_num: view.u32(at + 4)?,
        external_name: external_name(view, at + 8, base)?,
        file_offset: view.u32(at + 0x10)?,
        file_size: view.u32(at + 0x14)?,
        wave_data_offset: view.u32(at + 0x18)?,
        wave_data_size: view.u32(at + 0x1c)?,
        items,
    })
}
