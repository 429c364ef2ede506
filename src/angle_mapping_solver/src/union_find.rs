//! Union-find over a hybrid grid: discrete step dimensions plus a final
//! interval-list axis.
//!
//! Every non-empty interval stored in the grid is one element; id 0 is a
//! sentinel for empty cells. Two intervals are joined when their cells differ
//! by one step in a single dimension and the intervals overlap.

use std::time::Instant;

use brick_core::geometry::IntervalListVector;
use log::info;

pub const MAX_DIMENSIONS: usize = 5;

/// A point of the hybrid grid: steps for the discrete dimensions and a real
/// angle on the last axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixedPosition {
    pub steps: [u16; MAX_DIMENSIONS - 1],
    pub last_angle: f64,
}

/// Quick-union with rank; reads become O(1) after `compress_all`.
struct UnionFindCore {
    parents: Vec<u32>,
    ranks: Vec<u32>,
}

impl UnionFindCore {
    fn new(size: u32) -> Self {
        UnionFindCore {
            parents: (0..size).collect(),
            ranks: vec![0; size as usize],
        }
    }

    fn find(&self, mut a: u32) -> u32 {
        loop {
            let parent = self.parents[a as usize];
            if parent == a {
                return a;
            }
            a = parent;
        }
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let (ra, rb) = (self.ranks[root_a as usize], self.ranks[root_b as usize]);
        if ra < rb {
            self.parents[root_a as usize] = root_b;
        } else if ra > rb {
            self.parents[root_b as usize] = root_a;
        } else {
            self.parents[root_b as usize] = root_a;
            self.ranks[root_a as usize] += 1;
        }
    }

    fn compress_all(&mut self) {
        for i in 0..self.parents.len() {
            let root = self.find(self.parents[i]);
            self.parents[i] = root;
        }
    }
}

pub struct IntervalUnionFind<'a> {
    step_dimensions: usize,
    dimension_sizes: [u16; MAX_DIMENSIONS - 1],
    strides: [u32; MAX_DIMENSIONS - 1],
    core: UnionFindCore,
    /// Cell index → union id of the cell's first interval; 0 when empty.
    indicator_to_union: Vec<u32>,
    /// Union id → (cell index, interval index within the cell).
    union_to_interval: Vec<(u32, u16)>,
    lists: &'a IntervalListVector,
    roots: Vec<u32>,
}

impl<'a> IntervalUnionFind<'a> {
    /// `num_dimensions` counts the step dimensions plus the interval axis.
    pub fn new(
        num_dimensions: usize,
        dimension_sizes: &[u16],
        lists: &'a IntervalListVector,
    ) -> Self {
        let start = Instant::now();
        let step_dimensions = num_dimensions - 1;
        assert!(step_dimensions < MAX_DIMENSIONS);

        let mut sizes = [0_u16; MAX_DIMENSIONS - 1];
        sizes[..step_dimensions].copy_from_slice(&dimension_sizes[..step_dimensions]);

        let mut strides = [1_u32; MAX_DIMENSIONS - 1];
        for i in (0..step_dimensions.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * u32::from(sizes[i + 1]);
        }

        // Assign one union id per stored interval; 1-based, 0 is sentinel.
        let cell_count = lists.indicator_len();
        let mut indicator_to_union = vec![0_u32; cell_count as usize];
        let mut union_to_interval = vec![(0_u32, 0_u16); lists.interval_count() as usize + 1];
        let mut next_union = 1_u32;
        for cell in 0..cell_count {
            let interval_count = lists.interval_len_at(cell);
            if interval_count == 0 {
                continue;
            }
            indicator_to_union[cell as usize] = next_union;
            for j in 0..interval_count {
                union_to_interval[(next_union + u32::from(j)) as usize] = (cell, j);
            }
            next_union += u32::from(interval_count);
        }

        let mut this = IntervalUnionFind {
            step_dimensions,
            dimension_sizes: sizes,
            strides,
            core: UnionFindCore::new(next_union),
            indicator_to_union,
            union_to_interval,
            lists,
            roots: Vec::new(),
        };
        this.build_unions();
        this.core.compress_all();
        this.roots = (1..next_union)
            .filter(|&i| this.core.parents[i as usize] == i)
            .collect();

        let elapsed = start.elapsed();
        if elapsed.as_secs() >= 2 {
            info!("union find performed in {:.1} seconds", elapsed.as_secs_f64());
        }
        this
    }

    fn build_unions(&mut self) {
        let lists = self.lists;
        let cell_count = lists.indicator_len();
        let mut pos = [0_u16; MAX_DIMENSIONS - 1];
        for cell in 0..cell_count {
            if !lists.get(cell).is_empty() {
                let union_start1 = self.indicator_to_union[cell as usize];
                // Join towards each lower neighbor in the step grid:
                for dim in 0..self.step_dimensions {
                    if pos[dim] == 0 {
                        continue;
                    }
                    let neighbour = cell - self.strides[dim];
                    if lists.get(neighbour).is_empty() {
                        continue;
                    }
                    let union_start2 = self.indicator_to_union[neighbour as usize];
                    self.union_overlapping(cell, neighbour, union_start1, union_start2);
                }
            }
            // Advance the odometer, last dimension fastest:
            for dim in (0..self.step_dimensions).rev() {
                pos[dim] += 1;
                if pos[dim] < self.dimension_sizes[dim] {
                    break;
                }
                pos[dim] = 0;
            }
        }
    }

    /// Union every overlapping interval pair of two adjacent cells by a
    /// parallel sweep.
    fn union_overlapping(&mut self, cell1: u32, cell2: u32, union1: u32, union2: u32) {
        let lists = self.lists;
        let l1 = lists.get(cell1);
        let l2 = lists.get(cell2);
        let mut i1 = 0;
        let mut i2 = 0;
        while i1 < l1.len() && i2 < l2.len() {
            if l2[i2].max < l1[i1].min {
                i2 += 1;
                continue;
            }
            if l1[i1].max < l2[i2].min {
                i1 += 1;
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            self.core
                .union(union1 + i1 as u32, union2 + i2 as u32);
            if l1[i1].max <= l2[i2].max {
                i1 += 1;
            } else {
                i2 += 1;
            }
        }
    }

    fn indicator_index_of(&self, position: &MixedPosition) -> u32 {
        if self.step_dimensions == 0 {
            return 0;
        }
        let mut index = u32::from(position.steps[0]);
        for i in 1..self.step_dimensions {
            index = index * u32::from(self.dimension_sizes[i]) + u32::from(position.steps[i]);
        }
        index
    }

    /// Root of the interval containing `position`.
    ///
    /// Panics if no interval of the position's cell contains `last_angle`;
    /// callers only pass positions known to lie in the grid.
    pub fn root_for_position(&self, position: &MixedPosition) -> u32 {
        let index = self.indicator_index_of(position);
        let first_union = self.indicator_to_union[index as usize];
        let l = self.lists.get(index);
        for (j, it) in l.iter().enumerate() {
            if it.min <= position.last_angle && position.last_angle <= it.max {
                #[allow(clippy::cast_possible_truncation)]
                return self.core.find(first_union + j as u32);
            }
        }
        panic!("no interval contains the last angle of {position:?}");
    }

    /// A concrete grid point inside the union: the cell of the interval and
    /// the interval's midpoint on the last axis.
    pub fn representative(&self, union_id: u32) -> MixedPosition {
        assert_ne!(union_id, 0);
        let (cell, interval_index) = self.union_to_interval[union_id as usize];

        let mut rep = MixedPosition::default();
        let mut encoded = cell;
        for i in 0..self.step_dimensions {
            let rev_dim = self.step_dimensions - i - 1;
            rep.steps[rev_dim] = (encoded % u32::from(self.dimension_sizes[rev_dim])) as u16;
            encoded /= u32::from(self.dimension_sizes[rev_dim]);
        }

        let interval = self.lists.get_interval(cell, interval_index);
        rep.last_angle = (interval.min + interval.max) / 2.0;
        rep
    }

    /// Distinct island roots.
    pub fn roots(&self) -> impl Iterator<Item = u32> + '_ {
        self.roots.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::geometry::Interval;

    fn iv(min: f64, max: f64) -> Interval {
        Interval::new(min, max)
    }

    #[test]
    fn joins_overlapping_neighbours() {
        // One step dimension of size 3 plus the interval axis.
        let mut lists = IntervalListVector::new(3, 4);
        lists.insert(0, &[iv(-0.5, -0.1), iv(0.1, 0.5)]);
        lists.insert(1, &[iv(-0.5, -0.3)]);
        lists.insert(2, &[iv(-0.5, -0.25), iv(0.2, 0.4)]);

        let uf = IntervalUnionFind::new(2, &[3], &lists);
        // Low band joins across all three cells; the two high bands are cut
        // off by cell 1:
        assert_eq!(uf.roots().count(), 3);

        let root_of = |step: u16, angle: f64| {
            let mut p = MixedPosition::default();
            p.steps[0] = step;
            p.last_angle = angle;
            uf.root_for_position(&p)
        };
        assert_eq!(root_of(0, -0.4), root_of(2, -0.3));
        assert_eq!(root_of(0, -0.4), root_of(1, -0.35));
        assert_ne!(root_of(0, 0.3), root_of(2, 0.3));
        assert_ne!(root_of(0, 0.3), root_of(0, -0.4));
    }

    #[test]
    fn representatives_invert_to_their_roots() {
        let mut lists = IntervalListVector::new(3, 4);
        lists.insert(0, &[iv(-0.5, -0.1), iv(0.1, 0.5)]);
        lists.insert(1, &[iv(-0.5, -0.3)]);
        lists.insert(2, &[iv(-0.5, -0.25), iv(0.2, 0.4)]);

        let uf = IntervalUnionFind::new(2, &[3], &lists);
        for root in uf.roots() {
            let rep = uf.representative(root);
            assert_eq!(uf.root_for_position(&rep), root);
        }
    }

    #[test]
    fn empty_cells_split_islands() {
        let mut lists = IntervalListVector::new(3, 4);
        lists.insert(0, &[iv(0.0, 1.0)]);
        lists.insert_empty(1);
        lists.insert(2, &[iv(0.0, 1.0)]);

        let uf = IntervalUnionFind::new(2, &[3], &lists);
        assert_eq!(uf.roots().count(), 2);
    }

    #[test]
    fn single_cell_grid() {
        // No step dimensions at all: one cell, two islands.
        let mut lists = IntervalListVector::new(1, 4);
        lists.insert(0, &[iv(-0.6, -0.2), iv(0.2, 0.6)]);
        let uf = IntervalUnionFind::new(1, &[], &lists);
        assert_eq!(uf.roots().count(), 2);
        let rep = uf.representative(uf.roots().next().unwrap());
        assert!(rep.last_angle.abs() > 0.3);
    }

    #[test]
    fn two_step_dimensions() {
        // 2×2 grid; diagonal cells connect only through a shared neighbour.
        let mut lists = IntervalListVector::new(4, 4);
        lists.insert(0, &[iv(0.0, 1.0)]);
        lists.insert(1, &[iv(0.0, 1.0)]);
        lists.insert_empty(2);
        lists.insert(3, &[iv(0.0, 1.0)]);

        let uf = IntervalUnionFind::new(3, &[2, 2], &lists);
        assert_eq!(uf.roots().count(), 1);

        let mut p = MixedPosition::default();
        p.last_angle = 0.5;
        let a = uf.root_for_position(&p);
        p.steps = [1, 1, 0, 0];
        let b = uf.root_for_position(&p);
        assert_eq!(a, b);
    }
}
