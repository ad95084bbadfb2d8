//! Nukkit (Bedrock-style ids) to Anvil block id remapping.
//!
//! Ids are packed as `(block << 4) | meta`. The remap is a single pass per block and is
//! not idempotent: several rules map onto ids that other rules rename again
//! (e.g. double wooden slab 157 → 125, while 125 → 158).

use anyhow::{Context, Result};
use log::trace;

use crate::interfaces::ChunkTransform;

use super::chunk::{ChunkFile, ChunkNbt, Section};

/// Source-side block ids whose meaning differs from Anvil.
mod nukkit {
    pub const STONE_BUTTON: u16 = 77;
    pub const FENCE: u16 = 85;
    pub const INVISIBLE_BEDROCK: u16 = 95;
    pub const GLASS_PANE: u16 = 102;
    pub const DROPPER: u16 = 125;
    pub const ACTIVATOR_RAIL: u16 = 126;
    pub const WOODEN_BUTTON: u16 = 143;
    pub const DOUBLE_WOODEN_SLAB: u16 = 157;
    pub const WOODEN_SLAB: u16 = 158;
    pub const REPEATING_COMMAND_BLOCK: u16 = 188;
    pub const CHAIN_COMMAND_BLOCK: u16 = 189;
    pub const GRASS_PATH: u16 = 198;
    pub const END_ROD: u16 = 208;
    pub const SHULKER_BOX: u16 = 218;
    pub const CONCRETE: u16 = 236;
    pub const CONCRETE_POWDER: u16 = 237;
    pub const CHORUS_PLANT: u16 = 240;
    pub const STAINED_GLASS: u16 = 241;
    pub const PODZOL: u16 = 243;
    pub const BEETROOT_BLOCK: u16 = 244;
    pub const OBSERVER: u16 = 251;
}

/// Nukkit glazed terracotta ids in Anvil colour order (white..black); purple sits at 219.
const GLAZED_TERRACOTTA: [u16; 16] = [
    220, 221, 222, 223, 224, 225, 226, 227, 228, 229, 219, 231, 232, 233, 234, 235,
];
/// Anvil id of white glazed terracotta; the other colours follow.
const ANVIL_GLAZED_TERRACOTTA: u16 = 235;
const ANVIL_WHITE_SHULKER_BOX: u16 = 219;

const fn id(block: u16, meta: u16) -> u16 {
    (block << 4) | meta
}

const fn keep_meta(id: u16, new_block: u16) -> u16 {
    (id & 0x0F) | (new_block << 4)
}

const fn keep_block(id: u16, new_meta: u16) -> u16 {
    (id & !0x0F) | new_meta
}

/// Button facing differs: Nukkit 0,5,4,3,2,1 are Anvil 0..5. The powered bit (8) is kept.
fn button_face(id: u16) -> u16 {
    let face = match id & 0x7 {
        5 => 1,
        4 => 2,
        3 => 3,
        2 => 4,
        1 => 5,
        _ => 0,
    };
    keep_block(id, face | (id & 0x8))
}

/// Remap one packed id. Ids without a rule are returned unchanged.
pub fn remap_block(packed: u16) -> u16 {
    use nukkit::*;
    let block = packed >> 4;
    let meta = packed & 0x0F;
    match block {
        PODZOL => id(3, 2),
        DOUBLE_WOODEN_SLAB => keep_meta(packed, 125),
        WOODEN_SLAB => keep_meta(packed, 126),
        STAINED_GLASS => keep_meta(packed, 95),
        ACTIVATOR_RAIL => keep_meta(packed, 157),
        DROPPER => keep_meta(packed, 158),
        GLASS_PANE => keep_meta(packed, 160),
        INVISIBLE_BEDROCK => id(166, 0),
        FENCE => match meta {
            1..=5 => id(187 + meta, 0),
            _ => id(FENCE, 0),
        },
        END_ROD => keep_meta(packed, 198),
        CHORUS_PLANT => keep_meta(packed, 199),
        BEETROOT_BLOCK => keep_meta(packed, 207),
        GRASS_PATH => keep_meta(packed, 208),
        REPEATING_COMMAND_BLOCK => keep_meta(packed, 210),
        CHAIN_COMMAND_BLOCK => keep_meta(packed, 211),
        OBSERVER => keep_meta(packed, 218),
        CONCRETE => keep_meta(packed, 251),
        CONCRETE_POWDER => keep_meta(packed, 252),
        STONE_BUTTON | WOODEN_BUTTON => button_face(packed),
        SHULKER_BOX => id(ANVIL_WHITE_SHULKER_BOX + meta, 0),
        _ => match GLAZED_TERRACOTTA.iter().position(|&b| b == block) {
            Some(colour) => keep_meta(packed, ANVIL_GLAZED_TERRACOTTA + colour as u16),
            None => packed,
        },
    }
}

/// Remap every block of `section` in place (y, z, x order). Returns the number changed.
pub fn remap_section(section: &mut Section) -> usize {
    let mut changed = 0;
    for y in 0..16 {
        for z in 0..16 {
            for x in 0..16 {
                let index = Section::index(x, y, z);
                let old = section.packed_id(index);
                let new = remap_block(old);
                if new != old {
                    section.set_packed_id(index, new);
                    changed += 1;
                }
            }
        }
    }
    changed
}

/// Chunk transform for the Nukkit → Anvil pair. Chunks with nothing to remap keep their bytes;
/// remapped ones are re-encoded with the compression they were read with.
#[derive(Clone, Copy, Debug, Default)]
pub struct NukkitToAnvil;

impl ChunkTransform for NukkitToAnvil {
    type Input = ChunkFile;
    type Output = ChunkFile;

    fn convert(&self, input: ChunkFile) -> Result<ChunkFile> {
        let mut nbt =
            ChunkNbt::decode(&input.data).with_context(|| format!("decode chunk {}", input.pos))?;
        let mut changed = 0;
        for tag in nbt
            .sections_mut()
            .with_context(|| format!("chunk {}", input.pos))?
        {
            let mut section =
                Section::from_compound(tag).with_context(|| format!("chunk {}", input.pos))?;
            let n = remap_section(&mut section);
            if n > 0 {
                section.write_to(tag);
                changed += n;
            }
        }
        if changed == 0 {
            return Ok(input);
        }
        trace!("{}: {} blocks remapped", input.pos, changed);
        Ok(ChunkFile {
            data: nbt
                .encode()
                .with_context(|| format!("encode chunk {}", input.pos))?,
            pos: input.pos,
        })
    }
}
