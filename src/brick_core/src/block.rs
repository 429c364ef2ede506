//! Rigid blocks: strongly-connected sets of bricks, atomic in the model's
//! angular degrees of freedom.
//!
//! A block is normalized so its lex-minimum brick sits at the origin; only
//! the non-origin bricks are stored. Catalog entries carry their serial index
//! and 180°-rotation symmetry information.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::io;

use crate::brick::{Brick, GridBrick};
use crate::connection::ConnectionPoint;

pub const MAX_BLOCK_BRICKS: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub size: usize,
    /// Serial index in the catalog file; `None` for normalized min-forms.
    pub index: Option<u64>,
    pub other_bricks: [GridBrick; MAX_BLOCK_BRICKS - 1],
    pub rotationally_symmetric: bool,
    /// Fulcrum for canonical rotation of a symmetric block: position of the
    /// bottom-level non-origin vertical brick.
    pub rotation_brick_position: (i8, i8),
}

impl Block {
    pub fn single(index: u64) -> Self {
        Block {
            size: 1,
            index: Some(index),
            other_bricks: [GridBrick::default(); MAX_BLOCK_BRICKS - 1],
            rotationally_symmetric: true,
            rotation_brick_position: (0, 0),
        }
    }

    pub fn new(other_bricks: &[GridBrick], index: u64) -> Self {
        assert!(other_bricks.len() < MAX_BLOCK_BRICKS);
        let mut bricks = [GridBrick::default(); MAX_BLOCK_BRICKS - 1];
        bricks[..other_bricks.len()].copy_from_slice(other_bricks);
        bricks[..other_bricks.len()].sort_unstable();
        let mut block = Block {
            size: other_bricks.len() + 1,
            index: Some(index),
            other_bricks: bricks,
            rotationally_symmetric: false,
            rotation_brick_position: (0, 0),
        };
        block.finish_symmetry();
        block
    }

    pub fn read_from(r: &mut impl io::Read, size: usize, index: u64) -> io::Result<Block> {
        let mut bricks = [GridBrick::default(); MAX_BLOCK_BRICKS - 1];
        for brick in bricks.iter_mut().take(size - 1) {
            *brick = GridBrick::read_from(r)?;
        }
        let mut block = Block {
            size,
            index: Some(index),
            other_bricks: bricks,
            rotationally_symmetric: false,
            rotation_brick_position: (0, 0),
        };
        block.finish_symmetry();
        Ok(block)
    }

    /// Normalize a set of placed bricks into catalog form: levels shifted to
    /// start at 0, turned a quarter if the minimum brick is horizontal,
    /// translated so the minimum brick is the origin. The result carries no
    /// index and no symmetry information.
    pub fn from_placed_bricks(v: &[Brick]) -> Block {
        assert!(!v.is_empty() && v.len() <= MAX_BLOCK_BRICKS);
        let min_lv = v.iter().map(|b| b.level).min().unwrap_or(0);

        let mut rbricks: Vec<GridBrick> = v
            .iter()
            .map(|b| {
                Brick {
                    level: b.level - min_lv,
                    ..*b
                }
                .to_grid_brick()
            })
            .collect();
        let mut min = *rbricks.iter().min().unwrap_or(&GridBrick::default());

        // Turn 90 degrees if the minimum is horizontal:
        if min.horizontal() {
            for b in &mut rbricks {
                let old_x = b.x;
                b.x = b.y;
                b.y = -old_x;
                b.flip_horizontal();
            }
            min = *rbricks.iter().min().unwrap_or(&GridBrick::default());
        }

        for b in &mut rbricks {
            b.x -= min.x;
            b.y -= min.y;
        }
        rbricks.sort_unstable();

        let mut other_bricks = [GridBrick::default(); MAX_BLOCK_BRICKS - 1];
        other_bricks[..rbricks.len() - 1].copy_from_slice(&rbricks[1..]);
        Block {
            size: rbricks.len(),
            index: None,
            other_bricks,
            rotationally_symmetric: false,
            rotation_brick_position: (0, 0),
        }
    }

    fn finish_symmetry(&mut self) {
        let mut turned = *self;
        turned.turn180();
        self.rotationally_symmetric = turned.others() == self.others();
        self.rotation_brick_position = self.compute_rotation_brick_position();
    }

    /// The non-origin bricks, sorted.
    pub fn others(&self) -> &[GridBrick] {
        &self.other_bricks[..self.size - 1]
    }

    /// Brick `i` of the block; index 0 is the origin brick.
    pub fn brick(&self, i: usize) -> GridBrick {
        if i == 0 {
            GridBrick::default()
        } else {
            self.other_bricks[i - 1]
        }
    }

    pub fn bricks(&self) -> impl Iterator<Item = GridBrick> + '_ {
        (0..self.size).map(|i| self.brick(i))
    }

    pub fn brick_index(&self, b: &GridBrick) -> usize {
        if b.is_origin() {
            return 0;
        }
        for (i, other) in self.others().iter().enumerate() {
            if b == other {
                return i + 1;
            }
        }
        panic!("brick {b} is not part of {self}");
    }

    /// Returns true if changed.
    fn ensure_origin_is_smallest(&mut self) -> bool {
        let n = self.size - 1;
        let mut min_i = None;
        let mut min = GridBrick::default();
        for i in 0..n {
            if self.other_bricks[i] < min {
                min_i = Some(i);
                min = self.other_bricks[i];
            }
        }
        let Some(min_i) = min_i else {
            return false;
        };

        // Move all according to the new origin:
        for b in &mut self.other_bricks[..n] {
            b.x -= min.x;
            b.y -= min.y;
        }
        // Re-introduce the old origin at the slot of the new one:
        self.other_bricks[min_i].x = -min.x;
        self.other_bricks[min_i].y = -min.y;
        self.other_bricks[..n].sort_unstable();
        true
    }

    /// Turns this block 90 degrees. A new brick becomes the origin; assumes
    /// `can_turn90`.
    pub fn turn90(&mut self) {
        let n = self.size - 1;
        for b in &mut self.other_bricks[..n] {
            let old_x = b.x;
            b.x = b.y;
            b.y = -old_x;
            b.flip_horizontal();
        }

        let mut min_i = 0;
        for i in 1..n {
            if self.other_bricks[i] < self.other_bricks[min_i] {
                min_i = i;
            }
        }

        let move_x = self.other_bricks[min_i].x;
        let move_y = self.other_bricks[min_i].y;
        for b in &mut self.other_bricks[..n] {
            b.x -= move_x;
            b.y -= move_y;
        }

        // Re-introduce the turned old origin:
        self.other_bricks[min_i].set_horizontal(true);
        self.other_bricks[min_i].x -= move_x;
        self.other_bricks[min_i].y -= move_y;

        self.other_bricks[..n].sort_unstable();
    }

    pub fn turn180(&mut self) {
        let n = self.size - 1;
        for b in &mut self.other_bricks[..n] {
            b.x = -b.x;
            b.y = -b.y;
        }
        if self.size <= 2 {
            return;
        }
        if !self.ensure_origin_is_smallest() {
            self.other_bricks[..n].sort_unstable();
        }
    }

    pub fn can_turn90(&self) -> bool {
        if self.size <= 2 {
            return false;
        }
        for b in self.others() {
            if b.level() > 0 {
                return false;
            }
            if b.horizontal() {
                return true;
            }
        }
        false
    }

    /// The lex-minimum form over all allowed whole turns. The result carries
    /// no catalog index.
    pub fn rotate_to_min(&self) -> Block {
        let mut min = *self;
        min.index = None;
        let mut candidate = min;
        if self.can_turn90() {
            for _ in 0..3 {
                candidate.turn90();
                if candidate.others() < min.others() {
                    min = candidate;
                }
            }
        } else {
            candidate.turn180();
            if candidate.others() < min.others() {
                min = candidate;
            }
        }
        min
    }

    fn compute_rotation_brick_position(&self) -> (i8, i8) {
        if self.size == 1 {
            return (0, 0);
        }
        let mut furthest = GridBrick::default();
        for b in self.others() {
            if b.level() > 0 {
                break;
            }
            if b.horizontal() {
                continue;
            }
            furthest = *b;
        }
        (furthest.x, furthest.y)
    }

    /// Any adjacent touching brick pins a connection at `p`.
    pub fn angle_locked(&self, p: &ConnectionPoint) -> bool {
        self.bricks().any(|b| b.angle_locks(p))
    }

    /// A stud or tube of this block occupies the cell `p` connects into.
    pub fn blocked(&self, p: &ConnectionPoint) -> bool {
        self.bricks().any(|b| b.blocks(p))
    }

    /// All unblocked connection points, split by side.
    pub fn connection_points(&self) -> (BTreeSet<ConnectionPoint>, BTreeSet<ConnectionPoint>) {
        let mut above = BTreeSet::new();
        let mut below = BTreeSet::new();
        for (i, b) in self.bricks().enumerate() {
            for p in b.connection_points(true, i) {
                if !self.blocked(&p) {
                    above.insert(p);
                }
            }
            for p in b.connection_points(false, i) {
                if !self.blocked(&p) {
                    below.insert(p);
                }
            }
        }
        (above, below)
    }

    /// Whether `p` is the rotation-minimal of its two symmetric images.
    pub fn is_rotationally_minimal(&self, p: &ConnectionPoint) -> bool {
        if !self.rotationally_symmetric {
            return true;
        }
        let rotated = p.rotated(self.rotation_brick_position);
        *p < rotated
    }

    /// Whether a sorted set of points is minimal under block rotation.
    pub fn is_rotationally_minimal_set(&self, points: &[ConnectionPoint]) -> bool {
        if !self.rotationally_symmetric {
            return true;
        }
        let mut rotated: Vec<ConnectionPoint> = points
            .iter()
            .map(|p| p.rotated(self.rotation_brick_position))
            .collect();
        rotated.sort_unstable();

        for (orig, rot) in points.iter().zip(&rotated) {
            if rot < orig {
                return false;
            }
            if orig < rot {
                return true;
            }
        }
        true
    }

    /// Sizes of the strongly-connected components among this block's bricks,
    /// sorted descending.
    pub fn combination_type(&self) -> Vec<usize> {
        let n = self.size;
        let mut linked = [[false; MAX_BLOCK_BRICKS]; MAX_BLOCK_BRICKS];
        for i in 0..n {
            for j in i + 1..n {
                if self.brick(i).is_strongly_connected_with(&self.brick(j)) {
                    linked[i][j] = true;
                    linked[j][i] = true;
                }
            }
        }

        let mut handled = [false; MAX_BLOCK_BRICKS];
        let mut sizes = Vec::new();
        let mut stack = Vec::new();
        for i in 0..n {
            if handled[i] {
                continue;
            }
            handled[i] = true;
            let mut component_size = 1;
            stack.push(i);
            while let Some(from) = stack.pop() {
                for j in 0..n {
                    if !handled[j] && linked[from][j] {
                        stack.push(j);
                        handled[j] = true;
                        component_size += 1;
                    }
                }
            }
            sizes.push(component_size);
        }
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Block {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.index, other.index) {
            // Catalog ordering: big sizes first, then serial index.
            (Some(i), Some(j)) => other.size.cmp(&self.size).then(i.cmp(&j)),
            // Normalized forms compare structurally.
            _ => self
                .size
                .cmp(&other.size)
                .then_with(|| self.others().cmp(other.others())),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block[size={}", self.size)?;
        if let Some(index) = self.index {
            write!(f, ",index={index}")?;
        }
        if self.rotationally_symmetric {
            write!(
                f,
                ",symmetric@{},{}",
                self.rotation_brick_position.0, self.rotation_brick_position.1
            )?;
        }
        for b in self.others() {
            write!(f, "{b}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Corner;
    use crate::geometry::Point;

    #[test]
    fn single_brick_is_symmetric() {
        let b = Block::single(0);
        assert!(b.rotationally_symmetric);
        assert_eq!(b.rotation_brick_position, (0, 0));
    }

    #[test]
    fn stacked_pair_is_symmetric_offset_pair_is_not() {
        let stacked = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        assert!(stacked.rotationally_symmetric);
        let offset = Block::new(&[GridBrick::new(0, 2, 1, false)], 1);
        assert!(!offset.rotationally_symmetric);
    }

    #[test]
    fn rotation_brick_position_is_last_bottom_vertical() {
        let block = Block::new(
            &[GridBrick::new(0, 2, 1, false), GridBrick::new(0, 4, 0, false)],
            0,
        );
        assert_eq!(block.rotation_brick_position, (0, 4));
    }

    #[test]
    fn rotate_to_min_joins_mirrored_forms() {
        let a = Block::new(&[GridBrick::new(1, 2, 1, false)], 0).rotate_to_min();
        let b = Block::new(&[GridBrick::new(-1, -2, 1, false)], 0).rotate_to_min();
        assert_eq!(a, b);
        assert_eq!(a.others()[0], GridBrick::new(-1, -2, 1, false));
    }

    #[test]
    fn connection_points_filter_blocked() {
        let single = Block::single(0);
        let (above, below) = single.connection_points();
        assert_eq!(above.len(), 4);
        assert_eq!(below.len(), 4);

        let stacked = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        let (above, below) = stacked.connection_points();
        // The origin brick's up-studs and the upper brick's down-tubes are
        // covered by each other:
        assert_eq!(above.len(), 4);
        assert!(above.iter().all(|p| p.brick.level() == 1));
        assert_eq!(below.len(), 4);
        assert!(below.iter().all(|p| p.brick.level() == 0));
    }

    #[test]
    fn symmetric_block_rotational_minimality() {
        let stacked = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        let p = ConnectionPoint::new(Corner::Ne, GridBrick::default(), true, 0);
        let rotated = p.rotated(stacked.rotation_brick_position);
        assert_ne!(
            stacked.is_rotationally_minimal(&p),
            stacked.is_rotationally_minimal(&rotated)
        );
    }

    #[test]
    fn point_set_minimality_is_antisymmetric() {
        let stacked = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        let points = [
            ConnectionPoint::new(Corner::Ne, GridBrick::default(), true, 0),
            ConnectionPoint::new(Corner::Se, GridBrick::default(), true, 0),
        ];
        let mut rotated: Vec<_> = points
            .iter()
            .map(|p| p.rotated(stacked.rotation_brick_position))
            .collect();
        rotated.sort_unstable();
        assert_ne!(
            stacked.is_rotationally_minimal_set(&points),
            stacked.is_rotationally_minimal_set(&rotated)
        );
    }

    #[test]
    fn combination_type_splits_components() {
        let two_islands = Block::from_placed_bricks(&[
            Brick::new(Point::new(0.0, 0.0), 0.0, 0),
            Brick::new(Point::new(10.0, 0.0), 0.0, 0),
        ]);
        assert_eq!(two_islands.combination_type(), vec![1, 1]);

        let tower = Block::new(&[GridBrick::new(0, 0, 1, false)], 0);
        assert_eq!(tower.combination_type(), vec![2]);
    }

    #[test]
    fn from_placed_bricks_normalizes() {
        let placed = Block::from_placed_bricks(&[
            Brick::new(Point::new(3.0, 2.0), 0.0, 1),
            Brick::new(Point::new(3.0, 2.0), 0.0, 2),
        ]);
        assert_eq!(placed.size, 2);
        assert!(placed.index.is_none());
        assert_eq!(placed.others()[0], GridBrick::new(0, 0, 1, false));
    }
}
