//! Concrete format pair: Nukkit chunk NBT converted to Anvil block ids.

pub mod chunk;
pub mod dir_io;
pub mod level_info;
pub mod nibble;
pub mod nukkit_anvil;

pub use chunk::{ChunkCompression, ChunkFile, ChunkNbt, ChunkPos, Section};
pub use dir_io::{ChunkDirSink, ChunkDirSource};
pub use level_info::LevelInfoCopier;
pub use nibble::NibbleArray;
pub use nukkit_anvil::{NukkitToAnvil, remap_block, remap_section};
