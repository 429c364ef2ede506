//! Model assembly: placing rigid blocks in the plane along a connection list.
//!
//! The block at local index 0 sits at the origin with zero angle on level 0;
//! every other block is placed as a rigid body by composing the connection's
//! angle and position transform with the already-placed side, in
//! connection-list order.

use std::f64::consts::FRAC_PI_2;
use std::fmt;

use brick_core::block::Block;
use brick_core::brick::{Brick, BrickIntersection, GridBrick, Tolerance};
use brick_core::connection::{
    AngledConnection, BrickId, ConnectionEnd, ConnectionPair,
};

pub const MAX_BLOCKS: usize = 6;

/// A placed brick with its catalog form and owning-block back-reference.
#[derive(Clone, Copy, Debug)]
pub struct ModelBrick {
    pub grid: GridBrick,
    pub pose: Brick,
    pub id: BrickId,
}

/// A list of placed bricks, grouped by rigid block.
#[derive(Clone, Debug)]
pub struct Model {
    orig_bricks: [Brick; MAX_BLOCKS],
    pub bricks: Vec<ModelBrick>,
}

impl Model {
    /// A model holding only `block`, placed at the origin.
    pub fn new(block: &Block) -> Model {
        let mut model = Model {
            orig_bricks: [Brick::default(); MAX_BLOCKS],
            bricks: Vec::with_capacity(MAX_BLOCKS),
        };
        let catalog_index = block.index.expect("model blocks must come from a catalog");
        for (i, grid) in block.bricks().enumerate() {
            model.bricks.push(ModelBrick {
                grid,
                pose: Brick::from_grid(grid),
                id: BrickId::new(catalog_index, i, 0),
            });
        }
        model
    }

    /// The placed pose of block `model_block`'s origin brick.
    pub fn orig_brick(&self, model_block: usize) -> Brick {
        self.orig_bricks[model_block]
    }

    /// Place `block` as local block `model_block` through connection `c`.
    pub fn add(&mut self, block: &Block, model_block: usize, mut c: AngledConnection) {
        if model_block == c.first.id.model_block {
            std::mem::swap(&mut c.first, &mut c.second);
        }
        let prev_block_i = c.first.id.model_block;
        let curr_block_i = c.second.id.model_block;
        let prev_orig = self.orig_bricks[prev_block_i];
        let prev_point = c.first.point;
        let curr_point = c.second.point;
        let prev_brick = Brick::composed(&prev_orig, prev_point.brick);
        let prev_stud = prev_brick.stud_position(prev_point.corner);

        // The closed-form pose composition; the only trigonometry in the
        // placement path:
        let corner_delta = curr_point.corner as i32 - prev_point.corner as i32 - 2;
        let angle = prev_brick.angle + FRAC_PI_2 * f64::from(corner_delta) + c.angle_radians();
        let level =
            prev_orig.level + prev_point.brick.level() + if prev_point.above { 1 } else { -1 };

        let catalog_index = block.index.expect("model blocks must come from a catalog");
        self.orig_bricks[curr_block_i] =
            Brick::placed(GridBrick::default(), &curr_point, prev_stud, angle, level);
        for (i, grid) in block.bricks().enumerate() {
            self.bricks.push(ModelBrick {
                grid,
                pose: Brick::placed(grid, &curr_point, prev_stud, angle, level),
                id: BrickId::new(catalog_index, i, curr_block_i),
            });
        }
    }

    /// Assemble a model from scratch, placing blocks as their connections
    /// become reachable from block 0. Cycle-closing connections are skipped;
    /// their geometry is implied by the angles of the tree.
    pub fn from_connections(blocks: &[Block], connections: &[AngledConnection]) -> Model {
        let mut model = Model::new(&blocks[0]);
        let mut remaining: Vec<AngledConnection> = connections.to_vec();
        let mut added = [false; MAX_BLOCKS];
        added[0] = true;

        while !remaining.is_empty() {
            let pos = remaining
                .iter()
                .position(|c| added[c.first.id.model_block] || added[c.second.id.model_block])
                .expect("connection list does not span the model");
            let c = remaining.remove(pos);
            let i1 = c.first.id.model_block;
            let i2 = c.second.id.model_block;
            if added[i1] && added[i2] {
                continue;
            }
            let new_block = if added[i1] { i2 } else { i1 };
            model.add(&blocks[new_block], new_block, c);
            added[new_block] = true;
        }
        model
    }

    /// Full realizability check over all brick pairs of distinct blocks.
    /// Returns the corner connections found, or `None` on any overlap.
    pub fn realizable_connections(&self, tolerance: Tolerance) -> Option<Vec<ConnectionPair>> {
        let mut found = Vec::new();
        for i in 0..self.bricks.len() {
            let ib = self.bricks[i];
            for jb in &self.bricks[i + 1..] {
                if ib.id.model_block == jb.id.model_block {
                    continue;
                }
                match ib.pose.intersects(tolerance, ib.grid, &jb.pose, jb.grid) {
                    BrickIntersection::Disjoint => {}
                    BrickIntersection::Overlap => return None,
                    BrickIntersection::Connected {
                        mut on_self,
                        mut on_other,
                    } => {
                        on_self.brick_index = ib.id.brick_index;
                        on_other.brick_index = jb.id.brick_index;
                        found.push(ConnectionPair::new(
                            ConnectionEnd::new(ib.id, on_self),
                            ConnectionEnd::new(jb.id, on_other),
                        ));
                    }
                }
            }
        }
        Some(found)
    }

    /// Candidate-set realizability: the last `tail` bricks (the newly placed
    /// block) against the given candidate indices. Corner connections are
    /// pre-established and ignored.
    pub fn is_realizable(
        &self,
        tolerance: Tolerance,
        possible_collisions: &[usize],
        tail: usize,
    ) -> bool {
        for &pc in possible_collisions {
            let ib = self.bricks[pc];
            for jb in &self.bricks[self.bricks.len() - tail..] {
                debug_assert_ne!(ib.id.model_block, jb.id.model_block);
                if matches!(
                    ib.pose.intersects(tolerance, ib.grid, &jb.pose, jb.grid),
                    BrickIntersection::Overlap
                ) {
                    return false;
                }
            }
        }
        true
    }

    /// Indices of placed bricks within one level of any brick of `block`
    /// when placed through `pair`.
    pub fn possible_collisions(&self, block: &Block, pair: &ConnectionPair) -> Vec<usize> {
        let prev_block_i = pair.first.id.model_block;
        let prev_orig = self.orig_bricks[prev_block_i];
        let prev_point = pair.first.point;
        let curr_point = pair.second.point;
        let level = prev_orig.level
            + prev_point.brick.level()
            + if prev_point.above { 1 } else { -1 }
            - curr_point.brick.level();

        let mut result = Vec::new();
        for (i, ib) in self.bricks.iter().enumerate() {
            if block.size == 1
                && pair.first.id.model_block == ib.id.model_block
                && pair.first.id.brick_index == ib.id.brick_index
            {
                // Exclude the brick we are connecting to.
                continue;
            }
            let level_i = ib.pose.level;
            for grid in block.bricks() {
                let level_j = level + grid.level();
                if (level_i - level_j).abs() <= 1 {
                    result.push(i);
                    break;
                }
            }
        }
        result
    }

    /// The whole model as a single normalized rigid block, rotated to its
    /// lex-min form.
    pub fn to_min_block(&self) -> Block {
        let poses: Vec<Brick> = self.bricks.iter().map(|ib| ib.pose).collect();
        Block::from_placed_bricks(&poses).rotate_to_min()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MODEL[size={},", self.bricks.len())?;
        for ib in &self.bricks {
            write!(f, "{}", ib.pose)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::connection::{ConnectionPoint, Corner, StepAngle};
    use brick_core::geometry;

    fn corner_pair(
        upper_block: usize,
        upper_corner: Corner,
        lower_block: usize,
        lower_corner: Corner,
    ) -> ConnectionPair {
        // `above = true` marks the stud on the lower brick pointing up.
        let up = ConnectionPoint::new(upper_corner, GridBrick::default(), false, 0);
        let low = ConnectionPoint::new(lower_corner, GridBrick::default(), true, 0);
        ConnectionPair::new(
            ConnectionEnd::new(BrickId::new(0, 0, lower_block), low),
            ConnectionEnd::new(BrickId::new(0, 0, upper_block), up),
        )
    }

    #[test]
    fn two_singles_connect_at_a_corner() {
        let blocks = [Block::single(0), Block::single(0)];
        let pair = corner_pair(1, Corner::Sw, 0, Corner::Ne);
        let c = AngledConnection::new(pair, StepAngle::default());
        let model = Model::from_connections(&blocks, &[c]);

        assert_eq!(model.bricks.len(), 2);
        let placed = model.bricks[1].pose;
        assert!(geometry::eq_epsilon(placed.center.x, 1.0));
        assert!(geometry::eq_epsilon(placed.center.y, 3.0));
        assert_eq!(placed.level, 1);

        let found = model
            .realizable_connections(Tolerance::Nominal)
            .expect("the corner connection is realizable");
        assert_eq!(found.len(), 1);
        let pair = found[0];
        assert_eq!(pair.first.id.model_block, 0);
        assert_eq!(pair.second.id.model_block, 1);
        assert_eq!(pair.first.point.corner, Corner::Ne);
        assert!(pair.first.point.above);
        assert_eq!(pair.second.point.corner, Corner::Sw);
    }

    #[test]
    fn rotated_attachment_stays_connected() {
        let blocks = [Block::single(0), Block::single(0)];
        let pair = corner_pair(1, Corner::Sw, 0, Corner::Ne);

        // Half the legal arc keeps a clear margin everywhere:
        let c = AngledConnection::new(pair, StepAngle::new(5000, 10000));
        let model = Model::from_connections(&blocks, &[c]);
        let found = model.realizable_connections(Tolerance::Nominal).unwrap();
        assert_eq!(found.len(), 1);

        // The extreme angle grazes the neighboring stud; the strict
        // tolerance (the one the engine reads models back with) clears it:
        let c = AngledConnection::new(pair, StepAngle::new(10000, 10000));
        let model = Model::from_connections(&blocks, &[c]);
        let found = model
            .realizable_connections(Tolerance::StrictMolding)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn collision_candidates_follow_levels() {
        let blocks = [Block::single(0), Block::single(0)];
        let model = Model::new(&blocks[0]);
        let pair = corner_pair(1, Corner::Sw, 0, Corner::Ne);
        // A single-brick block excludes the brick it connects to:
        assert!(model.possible_collisions(&blocks[1], &pair).is_empty());

        let tall = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        let candidates = model.possible_collisions(&tall, &pair);
        assert_eq!(candidates, vec![0]);
    }

    #[test]
    fn assembly_order_is_connection_driven() {
        // Blocks 0-1-2 in a chain, connections listed leaf-first; placement
        // still succeeds and stays deterministic.
        let blocks = [Block::single(0), Block::single(0), Block::single(0)];
        let c01 = AngledConnection::new(corner_pair(1, Corner::Sw, 0, Corner::Ne), StepAngle::default());
        let c12 = AngledConnection::new(corner_pair(2, Corner::Sw, 1, Corner::Ne), StepAngle::default());
        let a = Model::from_connections(&blocks, &[c12, c01]);
        let b = Model::from_connections(&blocks, &[c01, c12]);
        assert_eq!(a.bricks.len(), 3);
        for (x, y) in a.bricks.iter().zip(&b.bricks) {
            assert!(geometry::eq_epsilon(x.pose.center.x, y.pose.center.x));
            assert!(geometry::eq_epsilon(x.pose.center.y, y.pose.center.y));
        }
    }

    #[test]
    fn min_block_of_flat_model() {
        let blocks = [Block::single(0), Block::single(0)];
        let pair = corner_pair(1, Corner::Sw, 0, Corner::Ne);
        let c = AngledConnection::new(pair, StepAngle::default());
        let model = Model::from_connections(&blocks, &[c]);
        let min = model.to_min_block();
        assert_eq!(min.size, 2);
        assert!(min.index.is_none());
    }
}
