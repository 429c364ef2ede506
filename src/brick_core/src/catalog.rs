//! Reading rigid-block catalog files.
//!
//! Catalogs are binary, read-only inputs produced by the external catalog
//! builder. A per-size file holds `size − 1` three-byte records
//! `{x: i8, y: i8, level_shifted: u8}` per block; block index is implicit in
//! file position. Combination-type files are terminated by a sentinel record
//! equal to the origin brick.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::info;
use thiserror::Error;

use crate::block::Block;
use crate::brick::GridBrick;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read block catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("block catalog {path} has length {len} not divisible into {record}-byte entries")]
    TruncatedEntry { path: PathBuf, len: u64, record: u64 },
    #[error("combination catalog {path} ended without its sentinel record")]
    MissingSentinel { path: PathBuf },
}

/// Load the catalog of rigid blocks of `size`, ordered by serial index.
pub fn load_blocks(dir: &Path, size: usize) -> Result<Vec<Block>, CatalogError> {
    assert!(size >= 1 && size <= crate::block::MAX_BLOCK_BRICKS);
    if size == 1 {
        // The single 2×4 brick; nothing is stored for it.
        return Ok(vec![Block::single(0)]);
    }

    let path = dir.join(format!("{size}.dat"));
    let io_err = |source| CatalogError::Io {
        path: path.clone(),
        source,
    };

    let file = File::open(&path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    let record = 3 * (size as u64 - 1);
    if len % record != 0 {
        return Err(CatalogError::TruncatedEntry {
            path: path.clone(),
            len,
            record,
        });
    }

    let mut reader = BufReader::new(file);
    let mut blocks = Vec::with_capacity(usize::try_from(len / record).unwrap_or(0));
    for index in 0..len / record {
        blocks.push(Block::read_from(&mut reader, size, index).map_err(io_err)?);
    }
    info!(
        "read {} rigid blocks of size {} from {}",
        blocks.len(),
        size,
        path.display()
    );
    Ok(blocks)
}

/// Load a combination-type catalog: blocks of `combined_size` bricks whose
/// strongly-connected components have the given sizes. Entries are rotated to
/// their lex-min form and deduplicated.
pub fn load_combination(path: &Path, combined_size: usize) -> Result<Vec<Block>, CatalogError> {
    assert!(combined_size >= 2 && combined_size <= crate::block::MAX_BLOCK_BRICKS);
    let io_err = |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);

    let mut set = BTreeSet::new();
    loop {
        let first = match GridBrick::read_from(&mut reader) {
            Ok(brick) => brick,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(CatalogError::MissingSentinel {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(io_err(e)),
        };
        if first.is_origin() {
            break;
        }
        let mut others = vec![first];
        for _ in 1..combined_size - 1 {
            others.push(GridBrick::read_from(&mut reader).map_err(io_err)?);
        }
        set.insert(Block::new(&others, 0).rotate_to_min());
    }

    info!(
        "read {} combination blocks from {}",
        set.len(),
        path.display()
    );
    Ok(set.into_iter().collect())
}

/// `<root>/<total size>/combination_type_<s1>_<s2>_...dat`
pub fn combination_file_path(root: &Path, component_sizes: &[usize]) -> PathBuf {
    let total: usize = component_sizes.iter().sum();
    let name = format!(
        "combination_type_{}.dat",
        component_sizes.iter().map(ToString::to_string).join("_")
    );
    root.join(total.to_string()).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("brick_core_catalog_{}", std::process::id()));
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test_log::test]
    fn size_one_catalog_is_implicit() {
        let blocks = load_blocks(Path::new("/nonexistent"), 1).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].size, 1);
    }

    #[test_log::test]
    fn reads_size_two_entries_in_order() {
        // Two blocks: a straight stack and an offset pair.
        let path = temp_file("2.dat", &[0, 0, 2, 0, 2, 2]);
        let blocks = load_blocks(path.parent().unwrap(), 2).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].index, Some(0));
        assert!(blocks[0].rotationally_symmetric);
        assert_eq!(blocks[1].index, Some(1));
        assert!(!blocks[1].rotationally_symmetric);
    }

    #[test]
    fn rejects_partial_entries() {
        let path = temp_file("partial/2.dat", &[0, 0, 2, 0]);
        assert!(matches!(
            load_blocks(path.parent().unwrap(), 2),
            Err(CatalogError::TruncatedEntry { .. })
        ));
    }

    #[test_log::test]
    fn combination_reads_until_sentinel() {
        let path = temp_file(
            "combination_type_1_1.dat",
            &[0, 2, 2, 0, 4, 2, 0, 0, 0],
        );
        let blocks = load_combination(&path, 2).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.index.is_none()));
    }

    #[test]
    fn combination_without_sentinel_is_an_error() {
        let path = temp_file("combination_type_bad.dat", &[0, 2, 2]);
        assert!(matches!(
            load_combination(&path, 2),
            Err(CatalogError::MissingSentinel { .. })
        ));
    }

    #[test]
    fn combination_paths_are_predictable() {
        let path = combination_file_path(Path::new("blocks"), &[2, 2, 1]);
        assert_eq!(
            path,
            Path::new("blocks").join("5").join("combination_type_2_2_1.dat")
        );
    }
}
