//! Chunk persistence on disk
//!
//! Each chunk is stored as an rkyv archive compressed with LZ4 under
//! `<dir>/<x>_<y>_<z>.vxk`. Only dirty chunks are written on page-out.
//! Chunks without a file are delegated to an optional fallback pager
//! (typically a procedural generator).

use std::io;
use std::path::{Path, PathBuf};

use rkyv::{Archive, Deserialize, Serialize};

use crate::math::Region;
use crate::voxel::Voxel;
use super::chunk::{Chunk, ChunkCoord};
use super::pager::Pager;

/// File extension of persisted chunks
pub const CHUNK_FILE_EXTENSION: &str = "vxk";

/// Serializable chunk payload
#[derive(Archive, Deserialize, Serialize)]
pub struct ChunkData {
    pub coord: ChunkCoord,
    pub side_power: u32,
    pub voxels: Vec<Voxel>,
}

/// Serialize a chunk to bytes (uncompressed)
pub fn serialize_chunk(chunk: &Chunk) -> Result<Vec<u8>, io::Error> {
    let data = ChunkData {
        coord: chunk.coord(),
        side_power: chunk.side_power(),
        voxels: chunk.voxels().to_vec(),
    };
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Deserialize chunk data from bytes (uncompressed)
pub fn deserialize_chunk(data: &[u8]) -> Result<ChunkData, io::Error> {
    // Archives must be read from an aligned buffer
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(data.len());
    aligned.extend_from_slice(data);

    let archived = rkyv::access::<ArchivedChunkData, rkyv::rancor::Error>(&aligned)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    rkyv::deserialize::<ChunkData, rkyv::rancor::Error>(archived)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Serialize and compress a chunk using LZ4
pub fn compress_chunk(chunk: &Chunk) -> Result<Vec<u8>, io::Error> {
    let serialized = serialize_chunk(chunk)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize chunk data
pub fn decompress_chunk(data: &[u8]) -> Result<ChunkData, io::Error> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("LZ4 decompression failed: {}", e))
        })?;
    deserialize_chunk(&decompressed)
}

/// Get the file path for a chunk
pub fn chunk_path(base_dir: &Path, coord: ChunkCoord) -> PathBuf {
    base_dir.join(format!("{}_{}_{}.{}", coord.x, coord.y, coord.z, CHUNK_FILE_EXTENSION))
}

/// Pager reading and writing chunk files in one directory
pub struct FilePager {
    base_dir: PathBuf,
    fallback: Option<Box<dyn Pager>>,
    chunks_written: usize,
    chunks_read: usize,
}

impl FilePager {
    /// Create a pager rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            fallback: None,
            chunks_written: 0,
            chunks_read: 0,
        })
    }

    /// Use `fallback` for chunks that have no file yet
    pub fn with_fallback(mut self, fallback: Box<dyn Pager>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn chunks_written(&self) -> usize {
        self.chunks_written
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Check if a chunk exists on disk
    pub fn chunk_exists(&self, coord: ChunkCoord) -> bool {
        chunk_path(&self.base_dir, coord).exists()
    }

    /// Write a chunk to disk regardless of its dirty state
    pub fn save_chunk(&mut self, chunk: &Chunk) -> io::Result<()> {
        let compressed = compress_chunk(chunk)?;
        std::fs::write(chunk_path(&self.base_dir, chunk.coord()), compressed)?;
        self.chunks_written += 1;
        Ok(())
    }

    /// Load a chunk file into `chunk`. `Ok(false)` if there is no file.
    pub fn load_chunk(&mut self, chunk: &mut Chunk) -> io::Result<bool> {
        let path = chunk_path(&self.base_dir, chunk.coord());
        if !path.exists() {
            return Ok(false);
        }
        let data = decompress_chunk(&std::fs::read(&path)?)?;
        if data.coord != chunk.coord() || data.side_power != chunk.side_power() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} holds chunk {} with side power {}, expected {} with side power {}",
                    path.display(),
                    data.coord,
                    data.side_power,
                    chunk.coord(),
                    chunk.side_power()
                ),
            ));
        }
        if !chunk.load_voxels(&data.voxels) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "voxel count mismatch"));
        }
        self.chunks_read += 1;
        Ok(true)
    }

    /// Delete a chunk file if it exists
    pub fn delete_chunk(&self, coord: ChunkCoord) -> io::Result<()> {
        let path = chunk_path(&self.base_dir, coord);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl Pager for FilePager {
    fn page_in(&mut self, region: &Region, chunk: &mut Chunk) -> bool {
        match self.load_chunk(chunk) {
            Ok(true) => true,
            Ok(false) => match self.fallback.as_mut() {
                Some(fallback) => fallback.page_in(region, chunk),
                None => true,
            },
            Err(e) => {
                log::error!("Failed to read chunk {}: {}", chunk.coord(), e);
                false
            }
        }
    }

    fn page_out(&mut self, _region: &Region, chunk: &Chunk) {
        if !chunk.is_dirty() {
            return;
        }
        if let Err(e) = self.save_chunk(chunk) {
            log::warn!("Failed to persist chunk {}: {}", chunk.coord(), e);
        }
    }
}
