//! Chunk data as stored on disk: position plus raw bytes, and the NBT payload inside.
//!
//! A chunk payload is laid out like a region file sector: one compression byte
//! (1 gzip, 2 zlib, 3 none) followed by an NBT compound. Block data lives in
//! `Level.Sections[]`, each section carrying `Y`, `Blocks` (4096) and `Data` (2048).

use anyhow::{Context, Result, bail};
use fastnbt::{ByteArray, Value};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::utils::config::WorldLayout;

use super::nibble::NibbleArray;

/// Chunk coordinates within a dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub dim: String,
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Path of this chunk relative to the world root: `chunks/<dim>/<x>.<z>.chunk`.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(WorldLayout::CHUNKS_DIR)
            .join(&self.dim)
            .join(format!("{}.{}.{}", self.x, self.z, WorldLayout::CHUNK_EXT))
    }

    /// Parse `<dim>/<x>.<z>.chunk` relative to the chunks directory.
    pub fn from_chunk_path(rel: &Path) -> Result<Self> {
        let dim = rel
            .parent()
            .and_then(|p| p.to_str())
            .filter(|d| !d.is_empty())
            .with_context(|| format!("no dimension directory in {}", rel.display()))?;
        let stem = rel
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("bad chunk file name {}", rel.display()))?;
        let (x, z) = stem
            .split_once('.')
            .with_context(|| format!("chunk file name is not <x>.<z>: {}", rel.display()))?;
        Ok(Self {
            dim: dim.replace('\\', "/"),
            x: x.parse()
                .with_context(|| format!("bad x coordinate in {}", rel.display()))?,
            z: z.parse()
                .with_context(|| format!("bad z coordinate in {}", rel.display()))?,
        })
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}, {}]", self.dim, self.x, self.z)
    }
}

/// One chunk's position and encoded bytes. Used on both sides of the conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkFile {
    pub pos: ChunkPos,
    pub data: Vec<u8>,
}

/// Compression scheme named by a payload's first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkCompression {
    Gzip,
    Zlib,
    Uncompressed,
}

impl ChunkCompression {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zlib),
            3 => Ok(Self::Uncompressed),
            other => bail!("unknown chunk compression type {}", other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Gzip => 1,
            Self::Zlib => 2,
            Self::Uncompressed => 3,
        }
    }
}

/// Decoded chunk payload. Re-encoding keeps the compression it was read with.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkNbt {
    pub compression: ChunkCompression,
    pub root: Value,
}

impl ChunkNbt {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&kind, payload) = bytes.split_first().context("empty chunk payload")?;
        let compression = ChunkCompression::from_byte(kind)?;
        let mut raw = Vec::new();
        match compression {
            ChunkCompression::Gzip => {
                GzDecoder::new(payload)
                    .read_to_end(&mut raw)
                    .context("gunzip chunk payload")?;
            }
            ChunkCompression::Zlib => {
                ZlibDecoder::new(payload)
                    .read_to_end(&mut raw)
                    .context("inflate chunk payload")?;
            }
            ChunkCompression::Uncompressed => raw.extend_from_slice(payload),
        }
        let root: Value = fastnbt::from_bytes(&raw).context("parse chunk NBT")?;
        Ok(Self { compression, root })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let raw = fastnbt::to_bytes(&self.root).context("serialize chunk NBT")?;
        let out = vec![self.compression.as_byte()];
        let out = match self.compression {
            ChunkCompression::Gzip => {
                let mut enc = GzEncoder::new(out, Compression::default());
                enc.write_all(&raw)?;
                enc.finish()?
            }
            ChunkCompression::Zlib => {
                let mut enc = ZlibEncoder::new(out, Compression::default());
                enc.write_all(&raw)?;
                enc.finish()?
            }
            ChunkCompression::Uncompressed => {
                let mut out = out;
                out.extend_from_slice(&raw);
                out
            }
        };
        Ok(out)
    }

    /// Section compounds under `Level.Sections`. A chunk without a section list has none.
    pub fn sections_mut(&mut self) -> Result<Vec<&mut HashMap<String, Value>>> {
        let Value::Compound(root) = &mut self.root else {
            bail!("chunk root is not a compound");
        };
        let Some(Value::Compound(level)) = root.get_mut("Level") else {
            bail!("chunk has no Level compound");
        };
        let Some(sections) = level.get_mut("Sections") else {
            return Ok(Vec::new());
        };
        let Value::List(list) = sections else {
            bail!("Level.Sections is not a list");
        };
        list.iter_mut()
            .map(|v| match v {
                Value::Compound(section) => Ok(section),
                _ => bail!("Level.Sections holds a non-compound entry"),
            })
            .collect()
    }
}

/// One 16×16×16 section with legacy block ids and 4-bit metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub y: u8,
    pub blocks: Vec<u8>,
    pub data: NibbleArray,
}

impl Section {
    pub const BLOCKS: usize = NibbleArray::SECTION_VALUES;

    /// Empty (all air) section at height `y`.
    pub fn empty(y: u8) -> Self {
        Self {
            y,
            blocks: vec![0; Self::BLOCKS],
            data: NibbleArray::new(),
        }
    }

    /// Index in `blocks`/`data` for local coordinates, each in `0..16`.
    pub fn index(x: usize, y: usize, z: usize) -> usize {
        (y << 8) | (z << 4) | x
    }

    /// Packed `(block << 4) | meta` id at `index`.
    pub fn packed_id(&self, index: usize) -> u16 {
        (u16::from(self.blocks[index]) << 4) | u16::from(self.data.get(index))
    }

    pub fn set_packed_id(&mut self, index: usize, id: u16) {
        self.blocks[index] = (id >> 4) as u8;
        self.data.set(index, (id & 0x0F) as u8);
    }

    /// Read `Y`, `Blocks` and `Data` from a section compound.
    pub fn from_compound(tag: &HashMap<String, Value>) -> Result<Self> {
        let y = match tag.get("Y") {
            Some(Value::Byte(y)) => *y as u8,
            _ => bail!("section has no Y byte"),
        };
        let blocks = byte_array(tag, "Blocks", Self::BLOCKS)?;
        let data = NibbleArray::from_bytes(byte_array(tag, "Data", NibbleArray::SECTION_BYTES)?)?;
        Ok(Self { y, blocks, data })
    }

    /// Overwrite `Blocks` and `Data` in `tag`. Other keys (light, `Add`) are left as they are.
    pub fn write_to(&self, tag: &mut HashMap<String, Value>) {
        tag.insert("Blocks".to_string(), Value::ByteArray(to_byte_array(&self.blocks)));
        tag.insert(
            "Data".to_string(),
            Value::ByteArray(to_byte_array(self.data.as_bytes())),
        );
    }
}

fn byte_array(tag: &HashMap<String, Value>, name: &str, len: usize) -> Result<Vec<u8>> {
    let Some(Value::ByteArray(arr)) = tag.get(name) else {
        bail!("section has no {} byte array", name);
    };
    if arr.len() != len {
        bail!("section {} holds {} bytes, expected {}", name, arr.len(), len);
    }
    Ok(arr.iter().map(|&b| b as u8).collect())
}

fn to_byte_array(bytes: &[u8]) -> ByteArray {
    ByteArray::new(bytes.iter().map(|&b| b as i8).collect())
}
