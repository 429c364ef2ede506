//! The turning-block engine: collision-free angle intervals for a rigid
//! block hinged at a corner stud.
//!
//! From the viewpoint of collision checking, a rotating brick is the union of
//! its two extremal poses plus swept features: fans (annular sectors traced
//! by box points of interest) and moving studs (tracts with end circles).
//! All results are rescaled from the local sweep frame into the reference
//! `[-MAX_ANGLE; MAX_ANGLE]`.

use std::f64::consts::{FRAC_PI_2, PI};

use brick_core::block::Block;
use brick_core::brick::{
    Brick, ClickInfo, GridBrick, NUMBER_OF_STUDS, SNAP_DISTANCE, STUD_RADIUS, Tolerance,
    box_intersects_inner_stud,
};
use brick_core::connection::{AngledConnection, ConnectionPair, MAX_ANGLE_RADIANS, StepAngle};
use brick_core::geometry::{
    self, EPSILON, Interval, IntervalList, LineSegment, Point, RadianInterval,
};

use crate::model::Model;

/// Map an angle in the sweep frame linearly back onto
/// `[-MAX_ANGLE; MAX_ANGLE]`, handling a sweep that wraps at ±π.
pub fn angle_to_original_interval(a: f64, interval: RadianInterval) -> f64 {
    let RadianInterval { from, to } = interval;
    if to < from {
        // The sweep is [from;π] ∪ [-π;to].
        let width = 2.0 * PI + to - from;
        if a <= to {
            MAX_ANGLE_RADIANS - 2.0 * MAX_ANGLE_RADIANS * (to - a) / width
        } else {
            -MAX_ANGLE_RADIANS + 2.0 * MAX_ANGLE_RADIANS * (a - from) / width
        }
    } else {
        -MAX_ANGLE_RADIANS + 2.0 * MAX_ANGLE_RADIANS * (a - from) / (to - from)
    }
}

pub fn intervals_to_original_interval(l: &[Interval], interval: RadianInterval) -> IntervalList {
    let mut ret: IntervalList = l
        .iter()
        .map(|it| {
            Interval::new(
                angle_to_original_interval(it.min, interval),
                angle_to_original_interval(it.max, interval),
            )
        })
        .collect();
    ret.sort_unstable_by(|a, b| a.min.total_cmp(&b.min).then(a.max.total_cmp(&b.max)));
    geometry::collapse_intervals(&mut ret);
    ret
}

/// A "pizza slice" swept by a box point of interest, centered on the pivot.
#[derive(Clone, Copy, Debug)]
pub struct Fan {
    pub radius: f64,
    pub interval: RadianInterval,
}

impl Default for Fan {
    fn default() -> Self {
        Fan {
            radius: 0.0,
            interval: RadianInterval::new(0.0, 0.0),
        }
    }
}

impl Fan {
    pub fn new(radius: f64, min: f64, max: f64) -> Self {
        debug_assert!(min >= -PI - EPSILON && min < PI + EPSILON);
        debug_assert!(max >= -PI - EPSILON && max < PI + EPSILON);
        Fan {
            radius,
            interval: RadianInterval::new(min, max),
        }
    }

    /// A fan intersects a segment if the segment crosses the arc.
    fn intersects_line_segment(&self, l: LineSegment) -> bool {
        geometry::circle_cutout_intersects_line_segment(self.radius - EPSILON, self.interval, l)
    }

    /// A fan intersects a stud if the stud center is radially within reach
    /// and angularly inside the sweep.
    fn intersects_stud(&self, stud: Point) -> bool {
        stud.norm_squared() < (self.radius + STUD_RADIUS) * (self.radius + STUD_RADIUS)
            && geometry::in_radian_interval(geometry::angle_of_point(stud), self.interval)
    }

    fn intersects_box(&self, tolerance: Tolerance, brick: &Brick) -> bool {
        brick
            .box_line_segments(tolerance, false)
            .into_iter()
            .any(|s| self.intersects_line_segment(s))
    }

    /// Angles (in the original reference) at which the swept point avoids
    /// `block`.
    fn allowable_angles_for_block(&self, tolerance: Tolerance, block: &Brick) -> IntervalList {
        let collisions = if self.radius < EPSILON {
            block.block_intersection_with_rotating_point(tolerance, self.interval)
        } else {
            block.block_intersection_with_moving_point(tolerance, self.radius, self.interval)
        };
        let free = geometry::interval_inverse_radians(&collisions, self.interval);
        intervals_to_original_interval(&free, self.interval)
    }
}

/// The shape swept by a stud: a tract (annulus slice) plus two end circles.
#[derive(Clone, Copy, Debug)]
pub struct MovingStud {
    pub radius: f64,
    pub interval: RadianInterval,
}

impl Default for MovingStud {
    fn default() -> Self {
        MovingStud {
            radius: 0.0,
            interval: RadianInterval::new(0.0, 0.0),
        }
    }
}

impl MovingStud {
    pub fn new(radius: f64, min: f64, max: f64) -> Self {
        debug_assert!(min >= -PI - EPSILON && min < PI + EPSILON);
        debug_assert!(max >= -PI - EPSILON && max < PI + EPSILON);
        MovingStud {
            radius,
            interval: RadianInterval::new(min, max),
        }
    }

    /// A tract intersects a segment lying inside the annulus walls, or one
    /// crossing either wall within the sweep.
    fn tract_intersects_line_segment(&self, l: LineSegment) -> bool {
        let norm_p1 = l.p1.norm();
        let norm_p2 = l.p2.norm();
        let inner_wall = self.radius - STUD_RADIUS;
        let outer_wall = self.radius + STUD_RADIUS;
        let end_points_between_walls = (inner_wall <= norm_p1 && norm_p1 <= outer_wall)
            && (inner_wall <= norm_p2 && norm_p2 <= outer_wall);
        let end_points_inside = end_points_between_walls
            && (geometry::in_radian_interval(geometry::angle_of_point(l.p1), self.interval)
                || geometry::in_radian_interval(geometry::angle_of_point(l.p2), self.interval));
        end_points_inside
            || Fan {
                radius: inner_wall,
                interval: self.interval,
            }
            .intersects_line_segment(l)
            || Fan {
                radius: outer_wall,
                interval: self.interval,
            }
            .intersects_line_segment(l)
    }

    fn min_point(&self) -> Point {
        Point::new(
            self.radius * self.interval.from.cos(),
            self.radius * self.interval.from.sin(),
        )
    }

    fn max_point(&self) -> Point {
        Point::new(
            self.radius * self.interval.to.cos(),
            self.radius * self.interval.to.sin(),
        )
    }

    fn intersects_box(&self, tolerance: Tolerance, brick: &Brick) -> bool {
        if brick
            .box_line_segments(tolerance, false)
            .into_iter()
            .any(|s| self.tract_intersects_line_segment(s))
        {
            return true;
        }
        // Check the end circles:
        let end1 = brick.to_local(self.min_point());
        if box_intersects_inner_stud(tolerance, end1) {
            return true;
        }
        let end2 = brick.to_local(self.max_point());
        box_intersects_inner_stud(tolerance, end2)
    }

    /// Angles at which the swept stud avoids `block`. For outer studs
    /// (`allow_click`), snap candidates onto the block's outer studs are
    /// reported separately; `ClickInfo::distance` carries the half-width of
    /// the permissive click interval.
    fn allowable_angles_for_block(
        &self,
        tolerance: Tolerance,
        block: &Brick,
        allow_click: bool,
        clicks: &mut Vec<ClickInfo>,
    ) -> IntervalList {
        let collisions = if self.radius < SNAP_DISTANCE {
            block.block_intersection_with_rotating_stud(tolerance, self.interval, allow_click)
        } else {
            block.block_intersection_with_moving_stud(tolerance, self.radius, self.interval)
        };
        let free = geometry::interval_inverse_radians(&collisions, self.interval);
        let ret = intervals_to_original_interval(&free, self.interval);

        if !allow_click || self.radius <= SNAP_DISTANCE {
            return ret;
        }

        let mut found = Vec::new();
        block.stud_clicks(self.radius, self.interval, &mut found);
        for stud in found {
            let stud_angle = angle_to_original_interval(stud.angle, self.interval);

            let b = self.radius;
            let c = stud.distance;
            // Cosine rule for the click's angular half-width:
            let mut half_width =
                ((b * b + c * c - SNAP_DISTANCE * SNAP_DISTANCE) / (2.0 * b * c)).acos();
            // Keep the click interval inside the reference:
            if stud_angle + half_width > MAX_ANGLE_RADIANS {
                half_width = MAX_ANGLE_RADIANS - stud_angle;
            } else if stud_angle - half_width < -MAX_ANGLE_RADIANS {
                half_width = MAX_ANGLE_RADIANS + stud_angle;
            }
            clicks.push(ClickInfo {
                angle: stud_angle,
                distance: half_width,
            });
        }
        ret
    }
}

/// One brick of a turning block: extremal poses, fans and moving studs, all
/// in the frame where the pivot stud is the origin.
pub struct TurningBrick {
    blocks: [Brick; 2],
    block_above: Brick,
    fans: [Fan; 6],
    moving_studs: [MovingStud; NUMBER_OF_STUDS],
    pub stud_translation: Point,
}

impl TurningBrick {
    pub fn new(model: &Model, pair: &ConnectionPair, b: GridBrick, tolerance: Tolerance) -> Self {
        let prev_block_i = pair.first.id.model_block;
        let prev_orig = model.orig_brick(prev_block_i);
        let prev_point = pair.first.point;
        let curr_point = pair.second.point;
        let prev_brick = Brick::composed(&prev_orig, prev_point.brick);
        let stud_translation = prev_brick.stud_position(prev_point.corner);

        let corner_delta = curr_point.corner as i32 - prev_point.corner as i32 - 2;
        let angle = prev_brick.angle + FRAC_PI_2 * f64::from(corner_delta);
        let level =
            prev_orig.level + prev_point.brick.level() + if prev_point.above { 1 } else { -1 };

        let origin = Point::new(0.0, 0.0);
        let mut this = TurningBrick {
            blocks: [
                Brick::placed(b, &curr_point, origin, angle - MAX_ANGLE_RADIANS, level),
                Brick::placed(b, &curr_point, origin, angle + MAX_ANGLE_RADIANS, level),
            ],
            block_above: Brick::placed(b, &curr_point, origin, angle, level),
            fans: [Fan::default(); 6],
            moving_studs: [MovingStud::default(); NUMBER_OF_STUDS],
            stud_translation,
        };
        this.create_fans(tolerance);
        this.create_moving_studs();
        this
    }

    fn create_fans(&mut self, tolerance: Tolerance) {
        let pois1 = self.blocks[0].box_pois(tolerance);
        let pois2 = self.blocks[1].box_pois(tolerance);
        for i in 0..self.fans.len() {
            let min_angle = geometry::angle_of_point(pois1[i]);
            let max_angle = geometry::angle_of_point(pois2[i]);
            let radius = pois1[i].norm();
            debug_assert!((pois2[i].norm() - radius).abs() < EPSILON);
            self.fans[i] = Fan::new(radius, min_angle, max_angle);
        }
    }

    fn create_moving_studs(&mut self) {
        let pois1 = self.blocks[0].stud_positions();
        let pois2 = self.blocks[1].stud_positions();
        for i in 0..NUMBER_OF_STUDS {
            let radius = pois1[i].norm();
            if radius < EPSILON {
                // The stud sits on the pivot:
                self.moving_studs[i] = MovingStud::new(0.0, -PI, PI);
                continue;
            }
            let min_angle = geometry::angle_of_point(pois1[i]);
            let max_angle = geometry::angle_of_point(pois2[i]);
            debug_assert!((pois2[i].norm() - radius).abs() < EPSILON);
            self.moving_studs[i] = MovingStud::new(radius, min_angle, max_angle);
        }
    }

    fn allowable_angles_below(
        &self,
        tolerance: Tolerance,
        brick: &Brick,
        clicks: &mut Vec<ClickInfo>,
    ) -> IntervalList {
        let mut l = vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)];
        for (i, stud) in self.moving_studs.iter().enumerate() {
            // The last four studs are outer and thus allow clicking.
            let list_for_stud = stud.allowable_angles_for_block(tolerance, brick, i >= 4, clicks);
            l = geometry::interval_and(&l, &list_for_stud);
            if l.is_empty() {
                break;
            }
        }
        l
    }

    fn allowable_angles_above(
        &self,
        tolerance: Tolerance,
        brick: &Brick,
        clicks: &mut Vec<ClickInfo>,
    ) -> IntervalList {
        let mut l = vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)];

        // Reciprocal frame: the obstacle's studs sweep against the resting
        // pose, and the result is mirrored at the end.
        for (i, stud) in brick.stud_positions().into_iter().enumerate() {
            let mid_angle = geometry::angle_of_point(stud);
            let mut min_angle = mid_angle - MAX_ANGLE_RADIANS;
            if min_angle < -PI {
                min_angle += 2.0 * PI;
            }
            let mut max_angle = mid_angle + MAX_ANGLE_RADIANS;
            if max_angle > PI {
                max_angle -= 2.0 * PI;
            }
            let ms = MovingStud::new(stud.norm(), min_angle, max_angle);

            let mut reversed_clicks = Vec::new();
            let list_for_stud = ms.allowable_angles_for_block(
                tolerance,
                &self.block_above,
                i >= 4,
                &mut reversed_clicks,
            );
            for click in reversed_clicks {
                clicks.push(ClickInfo {
                    angle: -click.angle,
                    distance: click.distance,
                });
            }
            l = geometry::interval_and(&l, &list_for_stud);
        }
        geometry::interval_reverse(&mut l);
        l
    }

    fn allowable_angles_at_same_level(&self, tolerance: Tolerance, brick: &Brick) -> IntervalList {
        let mut l = vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)];

        // First this block's fans against the brick:
        for fan in &self.fans {
            let list_for_fan = fan.allowable_angles_for_block(tolerance, brick);
            l = geometry::interval_and(&l, &list_for_fan);
            if l.is_empty() {
                return l;
            }
        }

        // Then the brick's points of interest swept against the resting pose:
        let mut pois = brick.box_pois(tolerance);
        pois[4] = brick.center;
        for poi in &pois[..6] {
            let mid_angle = geometry::angle_of_point(*poi);
            let mut min_angle = mid_angle - MAX_ANGLE_RADIANS;
            if min_angle < -PI {
                min_angle += 2.0 * PI;
            }
            let mut max_angle = mid_angle + MAX_ANGLE_RADIANS;
            if max_angle > PI {
                max_angle -= 2.0 * PI;
            }
            let f = Fan::new(poi.norm(), min_angle, max_angle);

            let mut list_for_fan = f.allowable_angles_for_block(tolerance, &self.block_above);
            geometry::interval_reverse(&mut list_for_fan);
            l = geometry::interval_and(&l, &list_for_fan);
            if l.is_empty() {
                return l;
            }
        }
        l
    }

    /// Angles at which this turning brick avoids `brick`, with snap clicks.
    pub fn allowable_angles_for_brick(
        &self,
        tolerance: Tolerance,
        brick: &Brick,
        clicks: &mut Vec<ClickInfo>,
    ) -> IntervalList {
        let level = self.blocks[0].level;
        if brick.level == level {
            self.allowable_angles_at_same_level(tolerance, brick)
        } else if level + 1 == brick.level {
            self.allowable_angles_below(tolerance, brick, clicks)
        } else if level - 1 == brick.level {
            self.allowable_angles_above(tolerance, brick, clicks)
        } else {
            vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)]
        }
    }

    /// Fast predicate: can any collision with `brick` occur anywhere in the
    /// arc?
    pub fn intersects_brick(&self, tolerance: Tolerance, brick: &Brick) -> bool {
        let level = self.blocks[0].level;
        if brick.level == level {
            for pose in &self.blocks {
                if pose.boxes_intersect(tolerance, brick) {
                    return true;
                }
            }
            for fan in &self.fans[..4] {
                if fan.intersects_box(tolerance, brick) {
                    return true;
                }
            }
        } else if level + 1 == brick.level {
            // Turning below the obstacle:
            for stud in &self.moving_studs {
                if stud.intersects_box(tolerance, brick) {
                    return true;
                }
            }
        } else if level - 1 == brick.level {
            // Turning above the obstacle:
            for stud in brick.stud_positions() {
                for pose in &self.blocks {
                    if box_intersects_inner_stud(tolerance, pose.to_local(stud)) {
                        return true;
                    }
                }
                for fan in &self.fans[..4] {
                    if fan.intersects_stud(stud) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Swept-collision analysis of one block turning at one connection against a
/// base model.
pub struct TurningBlock<'a> {
    base_model: &'a Model,
    pair: ConnectionPair,
    block: &'a Block,
}

impl<'a> TurningBlock<'a> {
    pub fn new(
        base_model: &'a Model,
        block: &'a Block,
        model_block: usize,
        pair: ConnectionPair,
    ) -> Self {
        // Ensure the already-placed side is first:
        let pair = if model_block == pair.first.id.model_block {
            pair.swapped()
        } else {
            pair
        };
        TurningBlock {
            base_model,
            pair,
            block,
        }
    }

    /// The set of rotation angles avoiding every candidate brick, as an
    /// interval list over `[-MAX_ANGLE; MAX_ANGLE]`. Clicks are admitted when
    /// a full realizability check at the snap angle succeeds.
    pub fn allowable_angles_for_bricks(
        &self,
        tolerance: Tolerance,
        possible_collisions: &[usize],
    ) -> IntervalList {
        let mut ret = vec![Interval::new(-MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS)];

        for b in self.block.bricks() {
            let turning = TurningBrick::new(self.base_model, &self.pair, b, tolerance);

            for &pc in possible_collisions {
                let mut brick = self.base_model.bricks[pc].pose;
                brick.center -= turning.stud_translation;

                let mut clicks = Vec::new();
                let joiner = turning.allowable_angles_for_brick(tolerance, &brick, &mut clicks);
                ret = geometry::interval_and(&ret, &joiner);

                for click in clicks {
                    let mut with_block = self.base_model.clone();
                    let connection =
                        AngledConnection::new(self.pair, StepAngle::from_radians(click.angle));
                    with_block.add(self.block, self.pair.second.id.model_block, connection);
                    if with_block.is_realizable(tolerance, possible_collisions, self.block.size) {
                        let stud_interval = vec![Interval::new(
                            click.angle - click.distance,
                            click.angle + click.distance,
                        )];
                        ret = geometry::interval_or(&ret, &stud_interval);
                    }
                }
            }
        }
        ret
    }

    /// True when no candidate brick can collide anywhere in the full arc.
    pub fn is_clear(&self, tolerance: Tolerance, possible_collisions: &[usize]) -> bool {
        for b in self.block.bricks() {
            let turning = TurningBrick::new(self.base_model, &self.pair, b, tolerance);
            for &pc in possible_collisions {
                let mut brick = self.base_model.bricks[pc].pose;
                brick.center -= turning.stud_translation;
                if turning.intersects_brick(tolerance, &brick) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBrick;
    use brick_core::connection::{BrickId, ConnectionEnd, ConnectionPoint, Corner};
    use brick_core::geometry::is_full_interval;

    fn hinge_pair() -> ConnectionPair {
        let low = ConnectionPoint::new(Corner::Ne, GridBrick::default(), true, 0);
        let up = ConnectionPoint::new(Corner::Sw, GridBrick::default(), false, 0);
        ConnectionPair::new(
            ConnectionEnd::new(BrickId::new(0, 0, 0), low),
            ConnectionEnd::new(BrickId::new(0, 0, 1), up),
        )
    }

    #[test]
    fn rescaling_is_linear_over_the_sweep() {
        let sweep = RadianInterval::new(0.0, 2.0 * MAX_ANGLE_RADIANS);
        assert!(geometry::eq_epsilon(
            angle_to_original_interval(0.0, sweep),
            -MAX_ANGLE_RADIANS
        ));
        assert!(geometry::eq_epsilon(
            angle_to_original_interval(MAX_ANGLE_RADIANS, sweep),
            0.0
        ));
        let l = intervals_to_original_interval(&[Interval::new(0.0, MAX_ANGLE_RADIANS)], sweep);
        assert_eq!(l.len(), 1);
        assert!(geometry::eq_epsilon(l[0].min, -MAX_ANGLE_RADIANS));
        assert!(geometry::eq_epsilon(l[0].max, 0.0));
    }

    #[test]
    fn far_obstacle_allows_the_full_arc() {
        let block0 = Block::single(0);
        let block1 = Block::single(0);
        let mut model = Model::new(&block0);
        model.bricks.push(ModelBrick {
            grid: GridBrick::default(),
            pose: Brick::new(Point::new(20.0, 0.0), 0.0, 1),
            id: BrickId::new(0, 0, 2),
        });

        let turning = TurningBlock::new(&model, &block1, 1, hinge_pair());
        assert!(turning.is_clear(Tolerance::Nominal, &[1]));
        let l = turning.allowable_angles_for_bricks(Tolerance::Nominal, &[1]);
        assert!(is_full_interval(&l, -MAX_ANGLE_RADIANS, MAX_ANGLE_RADIANS));
    }

    #[test]
    fn coincident_obstacle_blocks_the_whole_arc() {
        let block0 = Block::single(0);
        let block1 = Block::single(0);
        let mut model = Model::new(&block0);
        // An obstacle exactly where the turning brick rests:
        model.bricks.push(ModelBrick {
            grid: GridBrick::default(),
            pose: Brick::new(Point::new(1.0, 3.0), 0.0, 1),
            id: BrickId::new(0, 0, 2),
        });

        let turning = TurningBlock::new(&model, &block1, 1, hinge_pair());
        assert!(!turning.is_clear(Tolerance::Nominal, &[1]));
        let l = turning.allowable_angles_for_bricks(Tolerance::Nominal, &[1]);
        assert!(l.is_empty());
    }

    #[test]
    fn click_half_width_follows_the_cosine_rule() {
        // A stud orbit of radius 1 passing exactly over the NE stud of a
        // resting brick:
        let block = Brick::new(Point::new(0.5, -1.5), 0.0, 0);
        let ms = MovingStud::new(1.0, -0.5, 0.5);
        let mut clicks = Vec::new();
        ms.allowable_angles_for_block(Tolerance::Nominal, &block, true, &mut clicks);
        assert_eq!(clicks.len(), 1);
        assert!(clicks[0].angle.abs() < 1e-9);
        assert!((clicks[0].distance - SNAP_DISTANCE).abs() < 1e-3);
    }
}
