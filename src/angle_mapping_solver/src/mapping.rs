//! The angle-mapping core: discretize all free angles but the last, evaluate
//! realizability at three tolerance levels, extract islands with union-find,
//! and classify each as confirmed, rectilinear or problematic.

use std::time::Instant;

use brick_core::block::Block;
use brick_core::brick::{PRECISION_BOOST_MULTIPLIER, Tolerance};
use brick_core::connection::{
    AngledConnection, ConnectionEnd, ConnectionPair, ConnectionPairSet, MAX_ANGLE_RADIANS,
    StepAngle,
};
use brick_core::geometry::{self, EPSILON, Interval, IntervalListVector};
use fxhash::FxHashSet;
use itertools::Itertools;
use log::info;

use crate::encoder::{Encoding, ModelEncoder};
use crate::model::{MAX_BLOCKS, Model};
use crate::report::{ProblematicReport, ReportAngle};
use crate::turning::TurningBlock;
use crate::union_find::{IntervalUnionFind, MAX_DIMENSIONS, MixedPosition};

/// Steps per angle type: a type-`t` angle is quantized to `2·S_t + 1` steps.
pub const STEPS_1: u16 = 203;
pub const STEPS_2: u16 = 370;
pub const STEPS_3: u16 = 538;
pub const BOOST_STAGES: usize = 4;
pub const MAX_LOAD_FACTOR: u32 = 4;

/// An island of the nominal grid, sitting inside one strict island.
#[derive(Clone, Debug)]
pub struct NominalIsland {
    pub loose_islands: usize,
    pub is_rectilinear: bool,
    pub is_cyclic: bool,
    pub representative: MixedPosition,
    pub encoding: Encoding,
}

/// An island of the strict grid with the nominal islands it contains.
#[derive(Clone, Debug)]
pub struct StrictIsland {
    pub nominal_islands: Vec<NominalIsland>,
    pub representative: MixedPosition,
}

impl StrictIsland {
    /// Confirmed means exactly one nominal island holding exactly one loose
    /// island; everything else needs manual review.
    pub fn is_problematic(&self) -> bool {
        self.nominal_islands.len() != 1
            || self.nominal_islands.iter().any(|m| m.loose_islands != 1)
    }
}

/// Everything one mapping run produced.
#[derive(Default)]
pub struct FoundModels {
    /// One representative model per confirmed non-rectilinear class.
    pub models: Vec<Model>,
    /// Newly discovered rectilinear forms with their encodings.
    pub new_rectilinear: Vec<(Model, Encoding)>,
    pub problematic: Vec<ProblematicReport>,
    pub model_count: u64,
    pub rectilinear_count: u64,
    pub any_problematic: bool,
}

pub struct AngleMapping<'a> {
    num_angles: usize,
    num_bricks: usize,
    size_mappings: u32,
    blocks: &'a [Block],
    /// Endpoints of connection `i` at `points[2i]` and `points[2i+1]`.
    points: Vec<ConnectionEnd>,
    angle_types: [usize; MAX_DIMENSIONS],
    angle_steps: [u16; MAX_DIMENSIONS],
    encoder: &'a ModelEncoder,
    rectilinear_index: u32,
    rectilinear_position: MixedPosition,
    /// How often each evalSML short-circuit fired; diagnostic only.
    pub boosts: [u64; BOOST_STAGES],
    single_free_angle: bool,
    find_extreme_angles_only: bool,
    boost_precision: bool,
    strict: IntervalListVector,
    nominal: IntervalListVector,
    loose: IntervalListVector,
}

impl<'a> AngleMapping<'a> {
    pub fn new(
        blocks: &'a [Block],
        connections: &[ConnectionPair],
        encoder: &'a ModelEncoder,
        find_extreme_angles_only: bool,
    ) -> Self {
        let num_angles = connections.len();
        assert!(num_angles >= 1 && num_angles <= MAX_DIMENSIONS);
        assert_eq!(blocks.len(), num_angles + 1);
        assert!(blocks.len() <= MAX_BLOCKS);

        let mut points = Vec::with_capacity(2 * num_angles);
        for c in connections {
            points.push(c.first);
            points.push(c.second);
        }

        let mut this = AngleMapping {
            num_angles,
            num_bricks: blocks.iter().map(|b| b.size).sum(),
            size_mappings: 0,
            blocks,
            points,
            angle_types: [0; MAX_DIMENSIONS],
            angle_steps: [0; MAX_DIMENSIONS],
            encoder,
            rectilinear_index: 0,
            rectilinear_position: MixedPosition::default(),
            boosts: [0; BOOST_STAGES],
            single_free_angle: false,
            find_extreme_angles_only,
            boost_precision: false,
            strict: IntervalListVector::new(0, 0),
            nominal: IntervalListVector::new(0, 0),
            loose: IntervalListVector::new(0, 0),
        };
        this.init();
        this
    }

    fn init(&mut self) {
        self.boosts = [0; BOOST_STAGES];
        self.setup_angle_types();

        let mut free_angles = 0;
        for i in 0..self.num_angles {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let boost = if self.boost_precision {
                PRECISION_BOOST_MULTIPLIER as u16
            } else {
                1
            };
            self.angle_steps[i] = match self.angle_types[i] {
                0 => 0,
                1 => STEPS_1 * boost,
                2 => STEPS_2 * boost,
                _ => STEPS_3 * boost,
            };
            if self.angle_types[i] != 0 {
                free_angles += 1;
            }
        }
        self.single_free_angle = free_angles == 1;

        if self.find_extreme_angles_only {
            return;
        }

        self.size_mappings = 1;
        for i in 0..self.num_angles - 1 {
            self.size_mappings *= 2 * u32::from(self.angle_steps[i]) + 1;
        }
        self.strict = IntervalListVector::new(self.size_mappings, MAX_LOAD_FACTOR);
        self.nominal = IntervalListVector::new(self.size_mappings, MAX_LOAD_FACTOR);
        self.loose = IntervalListVector::new(self.size_mappings, MAX_LOAD_FACTOR);
    }

    /// Re-run setup with boosted step counts and tolerances.
    pub fn set_boost_precision(&mut self) {
        assert!(!self.find_extreme_angles_only);
        self.boost_precision = true;
        self.init();
    }

    /// Angle types derive from the sizes of the subtrees a connection
    /// separates, leaves reduced first; locked connections get type 0.
    fn setup_angle_types(&mut self) {
        let n = self.num_angles;

        // Connection counts and a last-seen neighbor per block:
        let mut connection_counts = [0_usize; MAX_BLOCKS];
        let mut last_connected_to = [0_usize; MAX_BLOCKS];
        for i in 0..n {
            let i1 = self.points[2 * i].id.model_block;
            let i2 = self.points[2 * i + 1].id.model_block;
            connection_counts[i1] += 1;
            connection_counts[i2] += 1;
            last_connected_to[i1] = i2;
            last_connected_to[i2] = i1;
        }

        let mut block_sizes = [0_usize; MAX_BLOCKS];
        for i in 0..=n {
            block_sizes[i] = self.blocks[i].size;
        }

        for t in &mut self.angle_types[..n] {
            *t = 3;
        }
        // Minimize angles connecting leaves:
        for i in 0..2 * n {
            let angle_i = i / 2;
            let block_i = self.points[i].id.model_block;
            if connection_counts[block_i] == 1 {
                self.angle_types[angle_i] = self.angle_types[angle_i]
                    .min(block_sizes[block_i].min(self.num_bricks - block_sizes[block_i]));
            }
        }
        // Reduce the graph by merging leaves into their parents:
        for i in 0..=n {
            if connection_counts[i] == 1 {
                let other = last_connected_to[i];
                block_sizes[other] += block_sizes[i];
                block_sizes[i] = 0;
                connection_counts[other] -= 1;
                connection_counts[i] = 0;
            }
        }
        // Minimize again on the reduced graph:
        for i in 0..2 * n {
            let angle_i = i / 2;
            let block_i = self.points[i].id.model_block;
            if connection_counts[block_i] == 1 {
                self.angle_types[angle_i] = self.angle_types[angle_i]
                    .min(block_sizes[block_i].min(self.num_bricks - block_sizes[block_i]));
            }
        }

        // Connections locked directly on a block:
        for i in 0..2 * n {
            let block_i = self.points[i].id.model_block;
            if self.blocks[block_i].angle_locked(&self.points[i].point) {
                self.angle_types[i / 2] = 0;
            }
        }
        // Touching connections lock each other:
        for i in 0..2 * n {
            for j in i + 1..2 * n {
                if self.points[i].id.model_block != self.points[j].id.model_block {
                    continue;
                }
                if self.points[i].point.angle_locks(&self.points[j].point) {
                    self.angle_types[i / 2] = 0;
                    self.angle_types[j / 2] = 0;
                }
            }
        }
    }

    fn strict_tolerance(&self) -> Tolerance {
        if self.single_free_angle {
            Tolerance::StrictEpsilon
        } else if self.boost_precision {
            Tolerance::StrictBoost
        } else {
            Tolerance::StrictMolding
        }
    }

    fn loose_tolerance(&self) -> Tolerance {
        if self.single_free_angle {
            Tolerance::LooseEpsilon
        } else if self.boost_precision {
            Tolerance::LooseBoost
        } else {
            Tolerance::LooseMolding
        }
    }

    fn add_connection(&self, c: &mut Model, angle_i: usize, angle: StepAngle) {
        let ip1 = self.points[2 * angle_i];
        let ip2 = self.points[2 * angle_i + 1];
        debug_assert_ne!(ip2.id.model_block, 0);
        let blocks = self.blocks;
        c.add(
            &blocks[ip2.id.model_block],
            ip2.id.model_block,
            AngledConnection::new(ConnectionPair::new(ip1, ip2), angle),
        );
    }

    #[allow(clippy::cast_possible_wrap)]
    fn step_angle(&self, angle_i: usize, step: u16) -> StepAngle {
        let steps = self.angle_steps[angle_i];
        StepAngle::new(step as i16 - steps as i16, if steps == 0 { 1 } else { steps })
    }

    fn with_step(&self, base: &Model, angle_i: usize, step: u16) -> Model {
        let mut c = base.clone();
        self.add_connection(&mut c, angle_i, self.step_angle(angle_i, step));
        c
    }

    fn with_last_angle(&self, base: &Model, last_angle: f64) -> Model {
        let mut c = base.clone();
        self.add_connection(&mut c, self.num_angles - 1, StepAngle::from_radians(last_angle));
        c
    }

    /// The fully assembled model at a grid position.
    pub fn model_at(&self, p: &MixedPosition) -> Model {
        let mut c = Model::new(&self.blocks[0]);
        for i in 0..self.num_angles - 1 {
            self.add_connection(&mut c, i, self.step_angle(i, p.steps[i]));
        }
        self.add_connection(&mut c, self.num_angles - 1, StepAngle::from_radians(p.last_angle));
        c
    }

    /// The connection list with the representative angles of a position.
    pub fn connections_at(&self, p: &MixedPosition) -> Vec<AngledConnection> {
        let mut result = Vec::with_capacity(self.num_angles);
        for i in 0..self.num_angles - 1 {
            let pair = ConnectionPair::new(self.points[2 * i], self.points[2 * i + 1]);
            result.push(AngledConnection::new(pair, self.step_angle(i, p.steps[i])));
        }
        let pair = ConnectionPair::new(
            self.points[2 * (self.num_angles - 1)],
            self.points[2 * (self.num_angles - 1) + 1],
        );
        result.push(AngledConnection::new(pair, StepAngle::from_radians(p.last_angle)));
        result
    }

    /// Recursive S/M/L evaluation over the discrete angles; the last angle
    /// is computed analytically as interval lists.
    fn eval_sml(
        &mut self,
        angle_i: usize,
        sml_index: u32,
        c: &Model,
        no_s: bool,
        no_m: bool,
        no_l: bool,
    ) {
        let blocks = self.blocks;
        let ip1 = self.points[2 * angle_i];
        let ip2 = self.points[2 * angle_i + 1];
        let block2 = ip2.id.model_block;
        let pair = ConnectionPair::new(ip1, ip2);
        let possible_collisions = c.possible_collisions(&blocks[block2], &pair);
        let tail = blocks[block2].size;

        if angle_i < self.num_angles - 1 {
            debug_assert!(sml_index < self.size_mappings);
            let steps = 2 * self.angle_steps[angle_i] + 1;
            let sml_index = sml_index * u32::from(steps);

            for i in 0..steps {
                let c2 = self.with_step(c, angle_i, i);
                let no_s2 = no_s
                    || !c2.is_realizable(self.strict_tolerance(), &possible_collisions, tail);
                let no_m2 =
                    no_m || !c2.is_realizable(Tolerance::Nominal, &possible_collisions, tail);
                let no_l2 = no_l
                    || !c2.is_realizable(self.loose_tolerance(), &possible_collisions, tail);
                self.eval_sml(angle_i + 1, sml_index + u32::from(i), &c2, no_s2, no_m2, no_l2);
            }
            return;
        }

        // End of recursion; the analytic axis.
        if no_s {
            self.strict.insert_empty(sml_index);
        }
        if no_m {
            self.nominal.insert_empty(sml_index);
        }
        if no_l {
            self.loose.insert_empty(sml_index);
        }
        let mut s_done = no_s;
        let mut m_done = no_m;
        let mut l_done = no_l;
        if s_done && m_done && l_done {
            self.boosts[0] += 1;
            return;
        }

        if self.angle_types[angle_i] == 0 {
            // Locked angle: a single realizability test decides a tiny
            // interval around zero.
            let c2 = self.with_step(c, angle_i, 0);
            let tiny = vec![Interval::new(-EPSILON, EPSILON)];
            if !s_done {
                if c2.is_realizable(self.strict_tolerance(), &possible_collisions, tail) {
                    self.strict.insert(sml_index, &tiny);
                } else {
                    self.strict.insert_empty(sml_index);
                }
            }
            if !m_done {
                if c2.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                    self.nominal.insert(sml_index, &tiny);
                } else {
                    self.nominal.insert_empty(sml_index);
                }
            }
            if !l_done {
                if c2.is_realizable(self.loose_tolerance(), &possible_collisions, tail) {
                    self.loose.insert(sml_index, &tiny);
                } else {
                    self.loose.insert_empty(sml_index);
                }
            }
            self.boosts[1] += 1;
            return;
        }

        let investigator = TurningBlock::new(c, &blocks[block2], block2, pair);
        let full = vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)];

        // Quick clear first:
        if !s_done && investigator.is_clear(self.strict_tolerance(), &possible_collisions) {
            self.strict.insert(sml_index, &full);
            s_done = true;
        }
        if !m_done && investigator.is_clear(Tolerance::Nominal, &possible_collisions) {
            self.nominal.insert(sml_index, &full);
            m_done = true;
        }
        if !l_done && investigator.is_clear(self.loose_tolerance(), &possible_collisions) {
            self.loose.insert(sml_index, &full);
            l_done = true;
        }
        if s_done && m_done && l_done {
            self.boosts[2] += 1;
            return;
        }

        // Full swept-volume analysis:
        if !s_done {
            let l =
                investigator.allowable_angles_for_bricks(self.strict_tolerance(), &possible_collisions);
            self.strict.insert(sml_index, &l);
        }
        if !m_done {
            let l = investigator
                .allowable_angles_for_bricks(Tolerance::Nominal, &possible_collisions);
            self.nominal.insert(sml_index, &l);
        }
        if !l_done {
            let l =
                investigator.allowable_angles_for_bricks(self.loose_tolerance(), &possible_collisions);
            self.loose.insert(sml_index, &l);
        }
        self.boosts[3] += 1;
    }

    fn pair_set(found: &[ConnectionPair]) -> ConnectionPairSet {
        found.iter().collect()
    }

    fn nominal_island(
        &self,
        m_root: u32,
        representative: MixedPosition,
        encoding: Encoding,
        is_cyclic: bool,
        uf_m: &IntervalUnionFind<'_>,
        uf_l: &IntervalUnionFind<'_>,
    ) -> NominalIsland {
        let mut island = NominalIsland {
            loose_islands: 0,
            is_rectilinear: false,
            is_cyclic,
            representative,
            encoding,
        };

        let rectilinear_list = self.nominal.get(self.rectilinear_index);
        island.is_rectilinear = geometry::interval_contains(rectilinear_list, 0.0)
            && uf_m.root_for_position(&self.rectilinear_position) == m_root;

        let mut encoding_updated = false;
        if island.is_rectilinear {
            // Re-read the model at the rectilinear position so the encoding
            // reflects any connections closed there:
            let found = self
                .model_at(&self.rectilinear_position)
                .realizable_connections(Tolerance::StrictMolding)
                .unwrap_or_default();
            island.encoding = self.encoder.encode(&Self::pair_set(&found));
            island.is_cyclic = found.len() > self.num_angles;
            island.representative = self.rectilinear_position;
            encoding_updated = true;
        }

        for l_root in uf_l.roots() {
            let l_rep = uf_l.representative(l_root);
            if uf_m.root_for_position(&l_rep) == m_root {
                if !encoding_updated {
                    let found = self
                        .model_at(&l_rep)
                        .realizable_connections(Tolerance::StrictMolding)
                        .unwrap_or_default();
                    island.encoding = self.encoder.encode(&Self::pair_set(&found));
                    island.is_cyclic = found.len() > self.num_angles;
                    island.representative = l_rep;
                    encoding_updated = true;
                }
                island.loose_islands += 1;
            }
        }
        island
    }

    fn find_islands(
        &self,
        uf_s: &IntervalUnionFind<'_>,
        uf_m: &IntervalUnionFind<'_>,
        uf_l: &IntervalUnionFind<'_>,
    ) -> Vec<StrictIsland> {
        let mut islands = Vec::new();
        for s_root in uf_s.roots() {
            let representative = uf_s.representative(s_root);
            debug_assert_eq!(uf_s.root_for_position(&representative), s_root);

            let mut nominal_islands = Vec::new();
            for m_root in uf_m.roots() {
                let m_rep = uf_m.representative(m_root);
                if uf_s.root_for_position(&m_rep) != s_root {
                    continue;
                }
                let found = self
                    .model_at(&m_rep)
                    .realizable_connections(Tolerance::StrictMolding)
                    .unwrap_or_default();
                let is_cyclic = found.len() > self.num_angles;
                let encoding = self.encoder.encode(&Self::pair_set(&found));
                nominal_islands.push(self.nominal_island(
                    m_root, m_rep, encoding, is_cyclic, uf_m, uf_l,
                ));
            }
            islands.push(StrictIsland {
                nominal_islands,
                representative,
            });
        }
        islands
    }

    fn problem_report(
        &self,
        p: &MixedPosition,
        m_island_index: usize,
        m_island_total: usize,
        l_island_total: usize,
    ) -> ProblematicReport {
        let connections = self.connections_at(p);
        let file_name = self.encoder.file_name(&connections, true);

        let mut angles = Vec::with_capacity(self.num_angles - 1);
        for i in 0..self.num_angles - 1 {
            let steps = self.angle_steps[i];
            #[allow(clippy::cast_possible_wrap)]
            let numerator = p.steps[i] as i16 - steps as i16;
            angles.push(ReportAngle {
                step: p.steps[i],
                total_steps: 2 * steps + 1,
                numerator,
                denominator: steps,
                radians: StepAngle::new(numerator, if steps == 0 { 1 } else { steps }).to_radians(),
            });
        }

        ProblematicReport {
            loop_special_case: m_island_total == 1
                && l_island_total == 0
                && connections.len() > self.num_angles,
            connections,
            file_name,
            angles,
            last_angle: p.last_angle,
            m_island_index,
            m_island_total,
            l_island_total,
        }
    }

    /// Full grid evaluation and island analysis. New encodings land in the
    /// caller's deduplication sets; already-present cyclic encodings are
    /// skipped.
    pub fn find_new_models(
        &mut self,
        non_cyclic: &mut FxHashSet<u64>,
        cyclic: &mut FxHashSet<Encoding>,
        stop_early_if_any_problematic: bool,
    ) -> FoundModels {
        assert!(!self.find_extreme_angles_only);
        let start = Instant::now();

        // The rectilinear position: all discrete axes at their center step.
        self.rectilinear_index = if self.num_angles > 1 {
            u32::from(self.angle_steps[0])
        } else {
            0
        };
        self.rectilinear_position.steps[0] = self.angle_steps[0];
        for i in 1..self.num_angles - 1 {
            let push = 2 * u32::from(self.angle_steps[i]) + 1;
            self.rectilinear_index =
                self.rectilinear_index * push + u32::from(self.angle_steps[i]);
            self.rectilinear_position.steps[i] = self.angle_steps[i];
        }
        self.rectilinear_position.last_angle = 0.0;

        let c = Model::new(&self.blocks[0]);
        self.eval_sml(0, 0, &c, false, false, false);

        let mut sizes = [0_u16; MAX_DIMENSIONS - 1];
        for i in 0..self.num_angles - 1 {
            sizes[i] = 2 * self.angle_steps[i] + 1;
        }
        let uf_s = IntervalUnionFind::new(self.num_angles, &sizes, &self.strict);
        let uf_m = IntervalUnionFind::new(self.num_angles, &sizes, &self.nominal);
        let uf_l = IntervalUnionFind::new(self.num_angles, &sizes, &self.loose);

        let mut result = FoundModels::default();
        let islands = self.find_islands(&uf_s, &uf_m, &uf_l);
        result.any_problematic = islands.iter().any(StrictIsland::is_problematic);
        if stop_early_if_any_problematic && result.any_problematic {
            return result;
        }

        // Stage new encodings and merge at the end, exactly once per run:
        let mut new_non_cyclic: FxHashSet<u64> = FxHashSet::default();
        let mut new_cyclic: FxHashSet<Encoding> = FxHashSet::default();

        for s_island in &islands {
            if s_island.nominal_islands.is_empty() {
                // No M-island inside: problematic, not counted.
                result
                    .problematic
                    .push(self.problem_report(&s_island.representative, 0, 0, 0));
                continue;
            }

            for (m_index, m_island) in s_island.nominal_islands.iter().enumerate() {
                let encoding = m_island.encoding;
                // A cycle may already be known from another connection list:
                if m_island.is_cyclic && cyclic.contains(&encoding) {
                    continue;
                }

                if m_island.is_rectilinear {
                    result
                        .new_rectilinear
                        .push((self.model_at(&self.rectilinear_position), encoding));
                    result.rectilinear_count += 1;
                }

                if s_island.nominal_islands.len() != 1 || m_island.loose_islands != 1 {
                    result.problematic.push(self.problem_report(
                        &m_island.representative,
                        m_index,
                        s_island.nominal_islands.len(),
                        m_island.loose_islands,
                    ));
                } else if !m_island.is_rectilinear {
                    result.models.push(self.model_at(&m_island.representative));
                    result.model_count += 1;
                }

                if m_island.is_cyclic {
                    new_cyclic.insert(encoding);
                } else {
                    new_non_cyclic.insert(encoding.required);
                }
            }
        }

        cyclic.extend(new_cyclic);
        non_cyclic.extend(new_non_cyclic);

        let elapsed = start.elapsed();
        if elapsed.as_secs() >= 2 {
            info!(
                "angle mapping performed in {:.1} seconds for block sizes {}",
                elapsed.as_secs_f64(),
                self.blocks.iter().map(|b| b.size).join(" ")
            );
        }
        result
    }

    /// Run with early stop, retry once at boosted precision when any island
    /// is problematic, and only then report for manual review.
    pub fn find_new_models_with_boost_retry(
        &mut self,
        non_cyclic: &mut FxHashSet<u64>,
        cyclic: &mut FxHashSet<Encoding>,
    ) -> FoundModels {
        let first = self.find_new_models(non_cyclic, cyclic, true);
        if !first.any_problematic {
            return first;
        }
        info!("problematic islands found; running again with boosted precision");
        self.set_boost_precision();
        self.find_new_models(non_cyclic, cyclic, false)
    }

    fn add_found_model(
        &self,
        c: &Model,
        rectilinear: bool,
        non_cyclic: &mut FxHashSet<u64>,
        cyclic: &mut FxHashSet<Encoding>,
        out: &mut FoundModels,
    ) {
        let found = c
            .realizable_connections(Tolerance::StrictMolding)
            .unwrap_or_else(|| panic!("found model is not realizable: {c}"));
        let is_cyclic = found.len() > self.num_angles;
        let encoding = self.encoder.encode(&Self::pair_set(&found));

        let is_new = if is_cyclic {
            cyclic.insert(encoding)
        } else {
            non_cyclic.insert(encoding.required)
        };
        if !is_new {
            return;
        }
        if rectilinear {
            out.new_rectilinear.push((c.clone(), encoding));
            out.rectilinear_count += 1;
        } else {
            out.models.push(c.clone());
            out.model_count += 1;
        }
    }

    fn eval_extreme_models(
        &self,
        angle_i: usize,
        c: &Model,
        rectilinear: bool,
        non_cyclic: &mut FxHashSet<u64>,
        cyclic: &mut FxHashSet<Encoding>,
        out: &mut FoundModels,
    ) {
        let blocks = self.blocks;
        let ip1 = self.points[2 * angle_i];
        let ip2 = self.points[2 * angle_i + 1];
        let block2 = ip2.id.model_block;
        let pair = ConnectionPair::new(ip1, ip2);
        let possible_collisions = c.possible_collisions(&blocks[block2], &pair);
        let tail = blocks[block2].size;

        if angle_i + 1 < self.num_angles {
            let c2 = self.with_step(c, angle_i, self.angle_steps[angle_i]);
            if c2.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                self.eval_extreme_models(angle_i + 1, &c2, rectilinear, non_cyclic, cyclic, out);
            }
            if self.angle_steps[angle_i] != 0 {
                for extreme in 0..=1_u16 {
                    let c2 = self.with_step(c, angle_i, 2 * extreme * self.angle_steps[angle_i]);
                    if c2.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                        self.eval_extreme_models(angle_i + 1, &c2, false, non_cyclic, cyclic, out);
                    }
                }
            }
            return;
        }

        if self.angle_types[angle_i] == 0 {
            let c2 = self.with_last_angle(c, 0.0);
            if !c2.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                return;
            }
            self.add_found_model(&c2, rectilinear, non_cyclic, cyclic, out);
            return;
        }

        let investigator = TurningBlock::new(c, &blocks[block2], block2, pair);
        if investigator.is_clear(Tolerance::Nominal, &possible_collisions) {
            let c2 = self.with_last_angle(c, 0.0);
            self.add_found_model(&c2, rectilinear, non_cyclic, cyclic, out);
            return;
        }

        let l = investigator.allowable_angles_for_bricks(Tolerance::Nominal, &possible_collisions);
        if rectilinear && geometry::interval_contains(&l, 0.0) {
            let c2 = self.with_last_angle(c, 0.0);
            self.add_found_model(&c2, true, non_cyclic, cyclic, out);
        }

        // One representative per remaining interval, preferring realizable
        // endpoints over the midpoint:
        for it in &l {
            if rectilinear && it.min <= 0.0 && 0.0 <= it.max {
                continue;
            }
            let at_max = self.with_last_angle(c, it.max);
            let c2 = if at_max.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                at_max
            } else {
                let at_min = self.with_last_angle(c, it.min);
                if at_min.is_realizable(Tolerance::Nominal, &possible_collisions, tail) {
                    at_min
                } else {
                    self.with_last_angle(c, (it.min + it.max) / 2.0)
                }
            };
            self.add_found_model(&c2, false, non_cyclic, cyclic, out);
        }
    }

    /// Fast approximation for large inputs: only the 3^(N-1) extreme angle
    /// combinations plus interval-boundary angles on the last axis.
    pub fn find_new_extreme_models(
        &mut self,
        non_cyclic: &mut FxHashSet<u64>,
        cyclic: &mut FxHashSet<Encoding>,
    ) -> FoundModels {
        assert!(self.find_extreme_angles_only);
        let start = Instant::now();

        let c = Model::new(&self.blocks[0]);
        let mut result = FoundModels::default();
        self.eval_extreme_models(0, &c, true, non_cyclic, cyclic, &mut result);

        let elapsed = start.elapsed();
        if elapsed.as_secs() >= 2 {
            info!(
                "extreme angle finding performed in {:.1} seconds for block sizes {}",
                elapsed.as_secs_f64(),
                self.blocks.iter().map(|b| b.size).join(" ")
            );
        }
        result
    }
}
