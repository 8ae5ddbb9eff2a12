//! Snapshot save/load for the memory stores.
//!
//! A snapshot holds the store configuration and every vector ever added, in
//! global order. Indices are not written: shards are recompiled from their
//! vector ranges on load, which reproduces them exactly because construction
//! is deterministic.
//!
//! `MemoryCollection` body:
//!
//! | field              | type                      |
//! |--------------------|---------------------------|
//! | capacity           | u64                       |
//! | shard index kind   | u8 tag + parameters       |
//! | parallel threshold | u64                       |
//! | shard count        | u64                       |
//! | buffer length      | u64                       |
//! | vector count       | u64                       |
//! | vectors            | u64 length + f32 values   |
//!
//! `FlatMemory` body: parallel threshold, vector count, vectors.

use super::{
    snapshot_path, FlatMemory, MemoryCollection, MemoryError, MemoryParams, MemoryStore,
};
use crate::containers::VectorStore;
use crate::index::{BallTreeParams, BruteForceParams, HnswParams, IndexKind};
use crate::serialization::{
    read_f32_vec, read_u64, read_u8, read_usize, write_f32_slice, write_u64, write_u8,
    write_usize, Deserializable, Serializable, SerializationError, SerializationResult,
    SnapshotHeader, StoreTypeId,
};
use crate::types::Matrix;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

const KIND_BRUTE_FORCE: u8 = 1;
const KIND_BALL_TREE: u8 = 2;
const KIND_HNSW: u8 = 3;

pub(crate) fn corruption(message: String) -> MemoryError {
    MemoryError::Serialization(SerializationError::DataCorruption(message))
}

impl Serializable for IndexKind {
    fn save<W: Write>(&self, writer: &mut W) -> SerializationResult<()> {
        match self {
            IndexKind::BruteForce(p) => {
                write_u8(writer, KIND_BRUTE_FORCE)?;
                write_usize(writer, p.parallel_threshold)?;
            }
            IndexKind::BallTree(p) => {
                write_u8(writer, KIND_BALL_TREE)?;
                write_usize(writer, p.leaf_size)?;
            }
            IndexKind::Hnsw(p) => {
                write_u8(writer, KIND_HNSW)?;
                write_usize(writer, p.m)?;
                write_usize(writer, p.ef_construction)?;
                write_usize(writer, p.ef_runtime)?;
                write_u64(writer, p.seed)?;
            }
        }
        Ok(())
    }
}

impl Deserializable for IndexKind {
    fn load<R: Read>(reader: &mut R) -> SerializationResult<Self> {
        match read_u8(reader)? {
            KIND_BRUTE_FORCE => Ok(IndexKind::BruteForce(
                BruteForceParams::new().with_parallel_threshold(read_usize(reader)?),
            )),
            KIND_BALL_TREE => Ok(IndexKind::BallTree(BallTreeParams::new(read_usize(reader)?))),
            KIND_HNSW => {
                let m = read_usize(reader)?;
                let ef_construction = read_usize(reader)?;
                let ef_runtime = read_usize(reader)?;
                let seed = read_u64(reader)?;
                Ok(IndexKind::Hnsw(HnswParams {
                    m,
                    ef_construction,
                    ef_runtime,
                    seed,
                }))
            }
            tag => Err(SerializationError::InvalidData(format!(
                "Invalid shard index kind: {tag}"
            ))),
        }
    }
}

impl Serializable for MemoryParams {
    fn save<W: Write>(&self, writer: &mut W) -> SerializationResult<()> {
        write_usize(writer, self.capacity)?;
        self.shard_index.save(writer)?;
        write_usize(writer, self.parallel_threshold)?;
        Ok(())
    }
}

impl Deserializable for MemoryParams {
    fn load<R: Read>(reader: &mut R) -> SerializationResult<Self> {
        let capacity = read_usize(reader)?;
        let shard_index = IndexKind::load(reader)?;
        let parallel_threshold = read_usize(reader)?;
        let params = MemoryParams {
            capacity,
            shard_index,
            parallel_threshold,
        };
        params
            .validate()
            .map_err(|e| SerializationError::InvalidData(e.to_string()))?;
        Ok(params)
    }
}

/// Write the vectors of `store` as count + flat f32 run.
fn write_vectors<W: Write>(writer: &mut W, store: &VectorStore) -> SerializationResult<()> {
    write_usize(writer, store.len())?;
    write_f32_slice(writer, store.as_slice())?;
    Ok(())
}

/// Read vectors written by `write_vectors` into a store of dimension `dim`.
fn read_vectors<R: Read>(reader: &mut R, dim: Option<usize>) -> Result<VectorStore, MemoryError> {
    let count = read_usize(reader)?;
    let data = read_f32_vec(reader)?;

    let Some(dim) = dim else {
        if count != 0 || !data.is_empty() {
            return Err(corruption(format!(
                "{count} vectors recorded without a dimension"
            )));
        }
        return Ok(VectorStore::new());
    };

    let mut store = VectorStore::with_dimension(dim)?;
    if count.checked_mul(dim) != Some(data.len()) {
        return Err(corruption(format!(
            "{} values cannot hold {count} vectors of dimension {dim}",
            data.len()
        )));
    }
    if count > 0 {
        store.append(&Matrix::from_vec(data, count, dim)?)?;
    }
    Ok(store)
}

/// Fail unless the reader is exhausted.
fn expect_end<R: Read>(reader: &mut R) -> Result<(), MemoryError> {
    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(corruption("trailing bytes after snapshot body".to_string()));
    }
    Ok(())
}

fn create_snapshot(directory: &Path) -> Result<BufWriter<File>, MemoryError> {
    fs::create_dir_all(directory)?;
    Ok(BufWriter::new(File::create(snapshot_path(directory))?))
}

fn open_snapshot(directory: &Path) -> Result<BufReader<File>, MemoryError> {
    Ok(BufReader::new(File::open(snapshot_path(directory))?))
}

pub(crate) fn save_collection(
    collection: &MemoryCollection,
    directory: &Path,
) -> Result<(), MemoryError> {
    let mut writer = create_snapshot(directory)?;

    SnapshotHeader::new(StoreTypeId::Collection, collection.dimension()).write(&mut writer)?;
    collection.params().save(&mut writer)?;
    write_usize(&mut writer, collection.num_shards())?;
    write_usize(&mut writer, collection.buffer_len())?;
    write_vectors(&mut writer, collection.vectors())?;
    writer.flush()?;

    info!(
        path = %snapshot_path(directory).display(),
        vectors = collection.len(),
        shards = collection.num_shards(),
        "saved memory collection"
    );
    Ok(())
}

pub(crate) fn load_collection(directory: &Path) -> Result<MemoryCollection, MemoryError> {
    let mut reader = open_snapshot(directory)?;

    let header = SnapshotHeader::read(&mut reader)?;
    header.expect_store_type(StoreTypeId::Collection)?;
    let params = MemoryParams::load(&mut reader)?;
    let num_shards = read_usize(&mut reader)?;
    let buffer_len = read_usize(&mut reader)?;
    let store = read_vectors(&mut reader, header.dimension)?;
    expect_end(&mut reader)?;

    let collection = MemoryCollection::restore(params, store, num_shards, buffer_len)?;
    info!(
        path = %snapshot_path(directory).display(),
        vectors = collection.len(),
        shards = collection.num_shards(),
        "loaded memory collection"
    );
    Ok(collection)
}

pub(crate) fn save_flat(memory: &FlatMemory, directory: &Path) -> Result<(), MemoryError> {
    let mut writer = create_snapshot(directory)?;

    SnapshotHeader::new(StoreTypeId::Flat, memory.dimension()).write(&mut writer)?;
    write_usize(&mut writer, memory.parallel_threshold())?;
    write_vectors(&mut writer, memory.vectors())?;
    writer.flush()?;

    info!(
        path = %snapshot_path(directory).display(),
        vectors = memory.len(),
        "saved flat memory"
    );
    Ok(())
}

pub(crate) fn load_flat(directory: &Path) -> Result<FlatMemory, MemoryError> {
    let mut reader = open_snapshot(directory)?;

    let header = SnapshotHeader::read(&mut reader)?;
    header.expect_store_type(StoreTypeId::Flat)?;
    let parallel_threshold = read_usize(&mut reader)?;
    let store = read_vectors(&mut reader, header.dimension)?;
    expect_end(&mut reader)?;

    let memory = FlatMemory::from_store(store, parallel_threshold)?;
    info!(
        path = %snapshot_path(directory).display(),
        vectors = memory.len(),
        "loaded flat memory"
    );
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{write_u32, MAGIC_NUMBER};
    use std::io::Cursor;

    fn kind_roundtrip(kind: IndexKind) {
        let mut buffer = Vec::new();
        kind.save(&mut buffer).unwrap();
        assert_eq!(IndexKind::load(&mut Cursor::new(buffer)).unwrap(), kind);
    }

    #[test]
    fn test_index_kind_encoding() {
        kind_roundtrip(IndexKind::BruteForce(
            BruteForceParams::new().with_parallel_threshold(usize::MAX),
        ));
        kind_roundtrip(IndexKind::BallTree(BallTreeParams::new(7)));
        kind_roundtrip(IndexKind::Hnsw(
            HnswParams::new().with_m(8).with_ef_runtime(12).with_seed(u64::MAX),
        ));
    }

    #[test]
    fn test_unknown_kind_tag() {
        let err = IndexKind::load(&mut Cursor::new(vec![9u8])).unwrap_err();
        assert!(matches!(err, SerializationError::InvalidData(_)));
    }

    #[test]
    fn test_invalid_params_rejected_on_load() {
        let mut buffer = Vec::new();
        MemoryParams::new(0).save(&mut buffer).unwrap();
        assert!(matches!(
            MemoryParams::load(&mut Cursor::new(buffer)),
            Err(SerializationError::InvalidData(_))
        ));
    }

    #[test]
    fn test_vector_count_mismatch_is_corruption() {
        let mut buffer = Vec::new();
        write_usize(&mut buffer, 3).unwrap();
        write_f32_slice(&mut buffer, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = read_vectors(&mut Cursor::new(buffer), Some(2)).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Serialization(SerializationError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryCollection::with_capacity(2).unwrap();
        memory.save(dir.path()).unwrap();

        let path = snapshot_path(dir.path());
        let mut bytes = fs::read(&path).unwrap();
        bytes.push(0);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            MemoryCollection::load(dir.path()),
            Err(MemoryError::Serialization(SerializationError::DataCorruption(_)))
        ));
    }

    #[test]
    fn test_foreign_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = Vec::new();
        write_u32(&mut bytes, MAGIC_NUMBER.swap_bytes()).unwrap();
        fs::write(snapshot_path(dir.path()), bytes).unwrap();

        assert!(matches!(
            MemoryCollection::load(dir.path()),
            Err(MemoryError::Serialization(SerializationError::InvalidMagicNumber { .. }))
        ));
    }
}
