//! Canonical encoding of connection-pair sets.
//!
//! Two sets are equivalent iff they describe the same labeled graph up to
//! relabeling of interchangeable blocks and 180° rotation of rotationally
//! symmetric blocks. The encoder walks the graph breadth-first from every
//! minimum-rank base block (unrotated and, when symmetric, rotated), packs
//! each connection into 12 bits, and keeps the minimum.

use std::collections::VecDeque;
use std::fmt;

use brick_core::block::Block;
use brick_core::connection::{
    AngledConnection, BrickId, ConnectionEnd, ConnectionPair, ConnectionPairSet, ConnectionPoint,
    Corner,
};
use itertools::Itertools;

use crate::model::MAX_BLOCKS;

/// Canonical identifier: the spanning-tree connections in `required`, any
/// cycle-closing connections in `extra`. The low nibble of each component
/// holds its connection count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Encoding {
    pub required: u64,
    pub extra: u64,
}

impl Encoding {
    pub const MAX: Encoding = Encoding {
        required: u64::MAX,
        extra: u64::MAX,
    };
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.required, self.extra)
    }
}

/// Mutable working copy of a connection set during one encoding walk:
/// per-block sorted point vectors plus one global pair list. Rotating a
/// block rewrites its points and every pair endpoint referencing it.
#[derive(Clone)]
struct EncoderState {
    points: Vec<Vec<ConnectionPoint>>,
    pairs: Vec<ConnectionPair>,
}

impl EncoderState {
    fn pair_for(&self, block: usize, point: &ConnectionPoint) -> ConnectionPair {
        *self
            .pairs
            .iter()
            .find(|pair| {
                (pair.first.id.model_block == block && pair.first.point == *point)
                    || (pair.second.id.model_block == block && pair.second.point == *point)
            })
            .expect("connection point without a pair")
    }

    fn rotate_block(&mut self, i: usize, blocks: &[Block]) {
        let rotation_point = blocks[i].rotation_brick_position;
        for p in &mut self.points[i] {
            let mut rotated = p.rotated(rotation_point);
            rotated.brick_index = blocks[i].brick_index(&rotated.brick);
            *p = rotated;
        }
        self.points[i].sort_unstable();

        for pair in &mut self.pairs {
            for end in [&mut pair.first, &mut pair.second] {
                if end.id.model_block == i {
                    let mut rotated = end.point.rotated(rotation_point);
                    rotated.brick_index = blocks[i].brick_index(&rotated.brick);
                    end.point = rotated;
                    end.id.brick_index = rotated.brick_index;
                }
            }
        }
    }
}

pub struct ModelEncoder {
    blocks: Vec<Block>,
    /// Packed 4-bit brick index → identity of the brick.
    compressed_to_identifier: Vec<BrickId>,
    /// `MAX_BLOCKS * block + brick` → packed 4-bit brick index.
    identifier_to_compressed: [u8; MAX_BLOCKS * MAX_BLOCKS],
    /// Block → first block of its run of interchangeable catalog entries.
    duplicate_mapping: [usize; MAX_BLOCKS],
}

impl ModelEncoder {
    /// `combination` must be in catalog order: size descending, then serial
    /// index; connection pairs refer to blocks by position in this slice.
    pub fn new(combination: &[Block]) -> Self {
        assert!(!combination.is_empty() && combination.len() <= MAX_BLOCKS);
        assert!(
            combination.windows(2).all(|w| w[0] <= w[1]),
            "encoder blocks must be in catalog order"
        );

        let blocks = combination.to_vec();
        let mut compressed_to_identifier = Vec::new();
        let mut identifier_to_compressed = [0_u8; MAX_BLOCKS * MAX_BLOCKS];
        for (i, block) in blocks.iter().enumerate() {
            let catalog_index = block.index.expect("encoder blocks come from a catalog");
            for j in 0..block.size {
                #[allow(clippy::cast_possible_truncation)]
                let packed = compressed_to_identifier.len() as u8;
                identifier_to_compressed[MAX_BLOCKS * i + j] = packed;
                compressed_to_identifier.push(BrickId::new(catalog_index, j, i));
            }
        }

        let mut duplicate_mapping = [0_usize; MAX_BLOCKS];
        for i in 1..blocks.len() {
            duplicate_mapping[i] = if blocks[i - 1] == blocks[i] {
                duplicate_mapping[i - 1]
            } else {
                i
            };
        }

        ModelEncoder {
            blocks,
            compressed_to_identifier,
            identifier_to_compressed,
            duplicate_mapping,
        }
    }

    /// The canonical minimum over every minimum-rank base block and, for
    /// symmetric bases, the rotated start.
    pub fn encode(&self, list: &ConnectionPairSet) -> Encoding {
        let n = self.blocks.len();
        let mut state = EncoderState {
            points: vec![Vec::new(); n],
            pairs: Vec::new(),
        };
        for pair in list.iter() {
            state.points[pair.first.id.model_block].push(pair.first.point);
            state.points[pair.second.id.model_block].push(pair.second.point);
            state.pairs.push(*pair);
        }
        for points in &mut state.points {
            points.sort_unstable();
        }

        let mut min = Encoding::MAX;
        for base in 0..n {
            if self.blocks[base] != self.blocks[0] {
                break;
            }
            min = min.min(self.encode_from(base, false, state.clone()));
            if self.blocks[base].rotationally_symmetric {
                min = min.min(self.encode_from(base, true, state.clone()));
            }
        }
        min
    }

    fn encode_from(&self, base_index: usize, rotate: bool, mut state: EncoderState) -> Encoding {
        let n = self.blocks.len();
        let mut perm = [0_usize; MAX_BLOCKS];
        if rotate {
            state.rotate_block(base_index, &self.blocks);
        }
        // Counters allowing interchangeable blocks to take the next unused
        // permutation index within their equivalence class:
        let mut duplicate_counters = [0_usize; MAX_BLOCKS];
        duplicate_counters[0] = 1; // base_index is already mapped.
        for i in 1..n {
            duplicate_counters[i] = self.duplicate_mapping[i];
        }

        let mut unencoded = [true; MAX_BLOCKS];
        unencoded[base_index] = false;
        let mut unused_connections = [[true; MAX_BLOCKS]; MAX_BLOCKS];
        let mut required = Vec::new();
        let mut additional = Vec::new();

        let mut queue = VecDeque::new();
        queue.push_back(base_index);
        while let Some(block_i) = queue.pop_front() {
            let points = state.points[block_i].clone();
            for p in &points {
                let mut connection = state.pair_for(block_i, p);
                if connection.first.id.model_block != block_i {
                    connection = connection.swapped();
                }
                let block2 = connection.second.id.model_block;

                if unencoded[block2] {
                    // Connection to a new block; rotate it into canonical
                    // orientation first if needed:
                    if !self.blocks[block2].is_rotationally_minimal(&connection.second.point) {
                        state.rotate_block(block2, &self.blocks);
                        let mut rotated = connection
                            .second
                            .point
                            .rotated(self.blocks[block2].rotation_brick_position);
                        rotated.brick_index = self.blocks[block2].brick_index(&rotated.brick);
                        connection.second.point = rotated;
                        connection.second.id.brick_index = rotated.brick_index;
                    }
                    required.push(connection);
                    queue.push_back(block2);
                    unencoded[block2] = false;

                    let mapped = self.duplicate_mapping[block2];
                    perm[block2] = duplicate_counters[mapped];
                    duplicate_counters[mapped] += 1;
                } else if unused_connections[block_i][block2] {
                    // Cycle-closing connection:
                    additional.push(connection);
                }
                unused_connections[block_i][block2] = false;
                unused_connections[block2][block_i] = false;
            }
        }

        Encoding {
            required: self.encode_list(&required, &perm),
            extra: self.encode_list(&additional, &perm),
        }
    }

    /// Pack connections as `[above_brick(4b)][above_corner(2b)]
    /// [below_brick(4b)][below_corner(2b)]` each, with the count in the low
    /// nibble.
    fn encode_list(&self, list: &[ConnectionPair], perm: &[usize; MAX_BLOCKS]) -> u64 {
        let mut encoded = 0_u64;
        for pair in list {
            let mut c = *pair;
            if !c.first.point.above {
                c = c.swapped();
            }
            let above_i = MAX_BLOCKS * perm[c.first.id.model_block] + c.first.id.brick_index;
            let below_i = MAX_BLOCKS * perm[c.second.id.model_block] + c.second.id.brick_index;
            encoded = (encoded << 4) + u64::from(self.identifier_to_compressed[above_i]);
            encoded = (encoded << 2) + c.first.point.corner as u64;
            encoded = (encoded << 4) + u64::from(self.identifier_to_compressed[below_i]);
            encoded = (encoded << 2) + c.second.point.corner as u64;
        }
        encoded <<= 4;
        encoded + list.len() as u64
    }

    pub fn decode(&self, encoding: Encoding) -> ConnectionPairSet {
        let mut list = ConnectionPairSet::new();
        self.decode_component(encoding.required, &mut list);
        self.decode_component(encoding.extra, &mut list);
        list
    }

    fn decode_component(&self, mut encoded: u64, list: &mut ConnectionPairSet) {
        let size = (encoded & 0x0F) as usize;
        encoded >>= 4;

        for _ in 0..size {
            #[allow(clippy::cast_possible_truncation)]
            let below_corner = Corner::from_index((encoded & 0x03) as u8);
            encoded >>= 2;
            let below_index = (encoded & 0x0F) as usize;
            encoded >>= 4;
            #[allow(clippy::cast_possible_truncation)]
            let above_corner = Corner::from_index((encoded & 0x03) as u8);
            encoded >>= 2;
            let above_index = (encoded & 0x0F) as usize;
            encoded >>= 4;

            let above_id = self.compressed_to_identifier[above_index];
            let above_brick = self.blocks[above_id.model_block].brick(above_id.brick_index);
            let above_point =
                ConnectionPoint::new(above_corner, above_brick, true, above_id.brick_index);
            let below_id = self.compressed_to_identifier[below_index];
            let below_brick = self.blocks[below_id.model_block].brick(below_id.brick_index);
            let below_point =
                ConnectionPoint::new(below_corner, below_brick, false, below_id.brick_index);

            list.insert(ConnectionPair::new(
                ConnectionEnd::new(above_id, above_point),
                ConnectionEnd::new(below_id, below_point),
            ));
        }
    }

    /// URL-safe name identifying a configuration in reports and emitted
    /// visualization files.
    pub fn file_name(&self, connections: &[AngledConnection], include_angles: bool) -> String {
        let mut set = ConnectionPairSet::new();
        for c in connections {
            set.insert(c.pair());
        }
        let encoded = self.encode(&set);
        let brick_count: usize = self.blocks.iter().map(|b| b.size).sum();

        let mut name = format!(
            "size{}_blocks{}_blocksizes_{}_blockindices_{}_cc{}",
            brick_count,
            self.blocks.len(),
            self.blocks.iter().map(|b| b.size).join("_"),
            self.blocks
                .iter()
                .map(|b| b.index.unwrap_or(0))
                .join("_"),
            encoded.required
        );
        if include_angles {
            name.push_str("_angles");
            for c in connections {
                name.push_str(&format!("_{}", c.angle.n));
            }
        }
        name
    }
}
