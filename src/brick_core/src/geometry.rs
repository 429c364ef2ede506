//! Plane geometry and closed-interval algebra for the collision kernel.
//!
//! All angle intervals live inside a bounded reference, either
//! `[-MAX_ANGLE; MAX_ANGLE]` or `[-π; π]`. Radian intervals may "jump" at
//! ±π: a pair with `from > to` denotes `[from; π] ∪ [-π; to]`.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::Vector2;

/// Margin of error to consider values equal.
pub const EPSILON: f64 = 1e-6;

pub type Point = Vector2<f64>;

/// A closed interval `[min; max]` with `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Interval { min, max }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{};{}]", self.min, self.max)
    }
}

/// Counter-clockwise from `from` to `to`. Jumps at ±π when `from > to`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadianInterval {
    pub from: f64,
    pub to: f64,
}

impl RadianInterval {
    pub fn new(from: f64, to: f64) -> Self {
        RadianInterval { from, to }
    }
}

pub type IntervalList = Vec<Interval>;

#[derive(Clone, Copy, Debug)]
pub struct LineSegment {
    pub p1: Point,
    pub p2: Point,
}

impl LineSegment {
    pub fn new(p1: Point, p2: Point) -> Self {
        LineSegment { p1, p2 }
    }
}

pub fn eq_epsilon(a: f64, b: f64) -> bool {
    a >= b - EPSILON && a <= b + EPSILON
}

/// Returns `a <= b <= c` or `c <= b <= a`.
pub fn between(a: f64, b: f64, c: f64) -> bool {
    (a <= b && b <= c) || (a >= b && b >= c)
}

pub fn between_epsilon(a: f64, b: f64, c: f64) -> bool {
    (a - EPSILON <= b && b <= c + EPSILON) || (a + EPSILON >= b && b >= c - EPSILON)
}

pub fn between_end_points_epsilon(a: Point, b: Point, c: Point) -> bool {
    between_epsilon(a.x, b.x, c.x) && between_epsilon(a.y, b.y, c.y)
}

pub fn in_radian_interval(a: f64, interval: RadianInterval) -> bool {
    debug_assert!(a >= -PI - EPSILON && a <= PI + EPSILON);
    if interval.from > interval.to {
        // Jumps at ±π:
        (-PI <= a && a <= interval.to) || (interval.from <= a && a <= PI)
    } else {
        interval.from <= a && a <= interval.to
    }
}

pub fn angle_of_point(p: Point) -> f64 {
    p.y.atan2(p.x)
}

/// Normalize an angle to `[-π; π[`.
pub fn normalize_angle(mut a: f64) -> f64 {
    while a < -PI {
        a += 2.0 * PI;
    }
    while a >= PI {
        a -= 2.0 * PI;
    }
    a
}

pub fn right_turn(line_start: Point, line_end: Point, p: Point) -> bool {
    (line_end.x - line_start.x) * (p.y - line_start.y)
        - (line_end.y - line_start.y) * (p.x - line_start.x)
        < 0.0
}

fn signum(d: f64) -> f64 {
    if d < 0.0 { -1.0 } else { 1.0 }
}

/// Intersection points between the circle of radius `r` at the origin and the
/// line through `l`. From http://mathworld.wolfram.com/Circle-LineIntersection.html
pub fn circle_line_points(r: f64, l: LineSegment) -> Option<(Point, Point)> {
    let dx = l.p2.x - l.p1.x;
    let dy = l.p2.y - l.p1.y;
    let dr_sq = dx * dx + dy * dy;
    let d = l.p1.x * l.p2.y - l.p2.x * l.p1.y;
    let discriminant = r * r * dr_sq - d * d;

    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let i1 = Point::new(
        (d * dy + signum(dy) * dx * root) / dr_sq,
        (-d * dx + dy.abs() * root) / dr_sq,
    );
    let i2 = Point::new(
        (d * dy - signum(dy) * dx * root) / dr_sq,
        (-d * dx - dy.abs() * root) / dr_sq,
    );
    Some((i1, i2))
}

/// Angles at which the circle of radius `r` at the origin crosses the line
/// through `l`. Uses http://mathworld.wolfram.com/Point-LineDistance2-Dimensional.html
pub fn circle_line_angles(r: f64, l: LineSegment) -> Option<(f64, f64)> {
    // First compute the distance between the circle center and the line:
    let mut p1 = l.p1;
    let mut p2 = l.p2;
    if right_turn(p1, p2, Point::new(0.0, 0.0)) {
        std::mem::swap(&mut p1, &mut p2);
    }
    let dist_nominator = ((p2.x - p1.x) * p1.y - p1.x * (p2.y - p1.y)).abs();
    let dist_denominator = ((p2.x - p1.x) * (p2.x - p1.x) + (p2.y - p1.y) * (p2.y - p1.y)).sqrt();
    let dist = dist_nominator / dist_denominator;
    if dist >= r {
        return None;
    }
    let angle_of_v = (-p2.x + p1.x).atan2(p2.y - p1.y);
    let angle_diff = (dist / r).acos();
    let mut ai1 = angle_of_v - angle_diff;
    if ai1 < -PI {
        ai1 += 2.0 * PI;
    }
    let mut ai2 = angle_of_v + angle_diff;
    if ai2 > PI {
        ai2 -= 2.0 * PI;
    }
    Some((ai1, ai2))
}

/// True when the arc of radius `r` restricted to `circle_interval` crosses `l`.
pub fn circle_cutout_intersects_line_segment(
    r: f64,
    circle_interval: RadianInterval,
    l: LineSegment,
) -> bool {
    let Some((i1, i2)) = circle_line_points(r, l) else {
        return false;
    };
    // One of the intersections must lie on the segment and inside the cutout:
    if between_end_points_epsilon(l.p1, i1, l.p2) && in_radian_interval(angle_of_point(i1), circle_interval)
    {
        return true;
    }
    between_end_points_epsilon(l.p1, i2, l.p2) && in_radian_interval(angle_of_point(i2), circle_interval)
}

/// Intersection between the circle of radius `radius` at the origin and the
/// half plane right of `line`.
///
/// A jumping result (`from > to`) means the intersection passes ±π and
/// consists of `[from; π]` and `[-π; to]`.
pub fn circle_half_plane_intersection(radius: f64, line: LineSegment) -> Option<RadianInterval> {
    let Some((a1, a2)) = circle_line_angles(radius, line) else {
        return if right_turn(line.p1, line.p2, Point::new(0.0, 0.0)) {
            // Inside half plane:
            Some(RadianInterval::new(-PI, PI))
        } else {
            // Ignore no intersection and intersection in a point.
            None
        };
    };

    let (mut from, mut to) = if a1 > a2 { (a2, a1) } else { (a1, a2) };

    // Find the mid-point and determine which interval is inside the half plane:
    let mid_angle = (from + to) / 2.0;
    let mid_point = Point::new(radius * mid_angle.cos(), radius * mid_angle.sin());
    if !right_turn(line.p1, line.p2, mid_point) {
        // The side with the jump is inside the half plane.
        std::mem::swap(&mut from, &mut to);
    }

    Some(RadianInterval::new(from, to))
}

/// Angles at which the circle of radius `r` at the origin crosses the circle
/// at `p` with radius `pr`.
pub fn circle_circle_angles(r: f64, p: Point, pr: f64) -> Option<(f64, f64)> {
    let dist_centres_sq = p.norm_squared();
    let dist_centres = dist_centres_sq.sqrt();
    if dist_centres > r + pr || dist_centres + pr <= r || dist_centres + r <= pr {
        return None;
    }
    if pr > dist_centres {
        // Special case: the other circle encloses the origin:
        return Some((-PI, PI));
    }

    let angle_p = angle_of_point(p);
    let angle_diff = ((pr * pr - dist_centres_sq - r * r) / (-2.0 * r * dist_centres)).acos();
    let mut ai1 = angle_p - angle_diff;
    while ai1 < -PI {
        ai1 += 2.0 * PI;
    }
    let mut ai2 = angle_p + angle_diff;
    while ai2 > PI {
        ai2 -= 2.0 * PI;
    }
    Some((ai1, ai2))
}

/// The angle intervals of the circle at the origin with radius `r` where it
/// intersects the circle at `p` with radius `pr`.
pub fn circle_circle_intersection(r: f64, p: Point, pr: f64) -> IntervalList {
    let Some((mut ai1, mut ai2)) = circle_circle_angles(r, p, pr) else {
        return IntervalList::new();
    };

    if ai1 > ai2 {
        std::mem::swap(&mut ai1, &mut ai2);
    }

    // The interval of intersection is less than π in length:
    if ai2 - ai1 < PI {
        vec![Interval::new(ai1, ai2)]
    } else {
        vec![Interval::new(-PI, ai1), Interval::new(ai2, PI)]
    }
}

pub fn interval_contains(l: &[Interval], d: f64) -> bool {
    for it in l {
        if it.max < d {
            continue;
        }
        return it.min <= d;
    }
    false
}

pub fn is_full_interval(l: &[Interval], min: f64, max: f64) -> bool {
    if l.len() != 1 {
        return false;
    }
    eq_epsilon(l[0].min, min) && eq_epsilon(l[0].max, max)
}

/// Set intersection of two sorted disjoint interval lists.
pub fn interval_and(a: &[Interval], b: &[Interval]) -> IntervalList {
    let mut result = IntervalList::new();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        // B ends before A starts:
        if b[j].max < a[i].min {
            j += 1;
            continue;
        }
        // A ends before B starts:
        if a[i].max < b[j].min {
            i += 1;
            continue;
        }
        // Both A and B end after they both have started:
        let min = a[i].min.max(b[j].min);
        if a[i].max < b[j].max {
            if min < a[i].max - EPSILON {
                result.push(Interval::new(min, a[i].max));
            }
            i += 1;
        } else {
            if min < b[j].max - EPSILON {
                result.push(Interval::new(min, b[j].max));
            }
            j += 1;
        }
    }
    result
}

/// Set union of two sorted disjoint interval lists.
pub fn interval_or(a: &[Interval], b: &[Interval]) -> IntervalList {
    let mut result = IntervalList::new();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        // B ends before A starts:
        if b[j].max < a[i].min {
            result.push(b[j]);
            j += 1;
            continue;
        }
        // A ends before B starts:
        if a[i].max < b[j].min {
            result.push(a[i]);
            i += 1;
            continue;
        }
        let min = a[i].min.min(b[j].min);
        let mut max;
        loop {
            max = a[i].max.max(b[j].max);
            if a[i].max < max {
                i += 1;
                if i == a.len() || a[i].min > max {
                    j += 1;
                    break;
                }
            } else {
                j += 1;
                if j == b.len() || b[j].min > max {
                    i += 1;
                    break;
                }
            }
        }
        result.push(Interval::new(min, max));
    }
    // Clean up the rest:
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Intersection of two radian intervals, splitting operands that jump at ±π.
pub fn interval_and_radians(a: RadianInterval, b: RadianInterval) -> IntervalList {
    let mut result = IntervalList::new();
    let RadianInterval { from: a1, to: a2 } = a;
    let RadianInterval { from: b1, to: b2 } = b;

    let a_jumps = a1 > a2;
    let b_jumps = b1 > b2;
    if a_jumps {
        if b_jumps {
            // a consists of [a1;π] and [-π;a2],
            // b consists of [b1;π] and [-π;b2]:
            result.push(Interval::new(-PI, a2.min(b2)));
            if b1 < a2 {
                result.push(Interval::new(b1, a2));
            }
            if a1 < b2 {
                result.push(Interval::new(a1, b2));
            }
            result.push(Interval::new(a1.max(b1), PI));
        } else {
            // a consists of [-π;a2] and [a1;π]:
            if b1 < a2 {
                result.push(Interval::new(b1, b2.min(a2)));
            }
            if b2 > a1 {
                result.push(Interval::new(b1.max(a1), b2));
            }
        }
    } else if b_jumps {
        // b consists of [b1;π] and [-π;b2]:
        if a1 < b2 {
            result.push(Interval::new(a1, a2.min(b2)));
        }
        if a2 > b1 {
            result.push(Interval::new(a1.max(b1), a2));
        }
    } else {
        // Normal case: no jumping anywhere:
        if a2 > b1 && a1 < b2 {
            result.push(Interval::new(a1.max(b1), a2.min(b2)));
        }
    }
    result
}

/// The reference interval as an interval list, split in two when it jumps.
pub fn to_intervals_radians(interval: RadianInterval) -> IntervalList {
    if interval.from < interval.to {
        vec![Interval::new(interval.from, interval.to)]
    } else {
        vec![
            Interval::new(-PI, interval.to),
            Interval::new(interval.from, PI),
        ]
    }
}

/// Complement of `l` within the (possibly jumping) reference interval.
pub fn interval_inverse_radians(l: &[Interval], minmax: RadianInterval) -> IntervalList {
    let RadianInterval { from: min, to: max } = minmax;

    if l.is_empty() {
        return to_intervals_radians(minmax);
    }

    let mut result = IntervalList::new();
    let mut it = 0;
    if min < max {
        if l[it].min > min {
            result.push(Interval::new(min, l[it].min));
        }
        let mut last = l[it].max;
        it += 1;
        while it < l.len() {
            result.push(Interval::new(last, l[it].min));
            last = l[it].max;
            it += 1;
        }
        if last != max {
            result.push(Interval::new(last, max));
        }
    } else {
        // The reference is [min;π] ∪ [-π;max].
        // First section, [-π;max]:
        if l[it].min >= min {
            // Nothing in the first section:
            result.push(Interval::new(-PI, max));
        } else {
            if l[it].min > -PI {
                result.push(Interval::new(-PI, l[it].min));
            }
            let mut last = l[it].max;
            it += 1;
            while it < l.len() && l[it].min < max {
                result.push(Interval::new(last, l[it].min));
                last = l[it].max;
                it += 1;
            }
            if last != max {
                result.push(Interval::new(last, max));
            }
        }

        // Second section, [min;π]:
        if it == l.len() {
            // Nothing in the second section:
            result.push(Interval::new(min, PI));
        } else {
            if l[it].min > min {
                result.push(Interval::new(min, l[it].min));
            }
            let mut last = l[it].max;
            it += 1;
            while it < l.len() {
                result.push(Interval::new(last, l[it].min));
                last = l[it].max;
                it += 1;
            }
            if last != PI {
                result.push(Interval::new(last, PI));
            }
        }
    }
    result
}

/// In-place merge of intervals whose endpoints meet within `EPSILON`.
pub fn collapse_intervals(l: &mut IntervalList) {
    if l.len() <= 1 {
        return;
    }

    let mut size = 0;
    let mut prev = l[0];
    for it in 1..l.len() {
        if eq_epsilon(prev.max, l[it].min) {
            prev.max = l[it].max;
        } else {
            l[size] = prev;
            size += 1;
            prev = l[it];
        }
    }
    l[size] = prev;
    l.truncate(size + 1);
}

/// In-place replacement of `l` with `{[-max; -min]}`, kept sorted.
pub fn interval_reverse(l: &mut IntervalList) {
    for it in l.iter_mut() {
        *it = Interval::new(-it.max, -it.min);
    }
    l.reverse();
}

/// Arena-backed vector of interval lists with a fixed number of slots.
///
/// One flat interval store plus a parallel indicator array mapping a logical
/// slot to `(offset, count)`. Every slot is written exactly once, in order;
/// the single backing allocation is required because a full grid is filled in
/// one pass and peak memory exceeds per-slot vectors.
pub struct IntervalListVector {
    intervals: Vec<Interval>,
    indicators: Vec<(u32, u16)>,
    capacity: usize,
}

impl IntervalListVector {
    pub fn new(indicator_size: u32, max_load_factor: u32) -> Self {
        let capacity = 512 + (indicator_size as usize) * (max_load_factor as usize);
        IntervalListVector {
            intervals: Vec::with_capacity(capacity),
            indicators: vec![(0, 0); indicator_size as usize],
            capacity,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, location: u32, interval_list: &[Interval]) {
        debug_assert!(interval_list.len() < 20);
        assert!(
            self.intervals.len() + interval_list.len() <= self.capacity,
            "interval arena overflow: {}+{} > {}",
            self.intervals.len(),
            interval_list.len(),
            self.capacity
        );
        self.indicators[location as usize] =
            (self.intervals.len() as u32, interval_list.len() as u16);
        self.intervals.extend_from_slice(interval_list);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn insert_empty(&mut self, location: u32) {
        self.indicators[location as usize] = (self.intervals.len() as u32, 0);
    }

    pub fn get(&self, location: u32) -> &[Interval] {
        let (offset, count) = self.indicators[location as usize];
        &self.intervals[offset as usize..offset as usize + count as usize]
    }

    pub fn get_interval(&self, location: u32, interval_index: u16) -> Interval {
        let (offset, _) = self.indicators[location as usize];
        self.intervals[offset as usize + interval_index as usize]
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn indicator_len(&self) -> u32 {
        self.indicators.len() as u32
    }

    /// Total number of stored (non-empty slot) intervals.
    #[allow(clippy::cast_possible_truncation)]
    pub fn interval_count(&self) -> u32 {
        self.intervals.len() as u32
    }

    pub fn interval_len_at(&self, location: u32) -> u16 {
        self.indicators[location as usize].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(min: f64, max: f64) -> Interval {
        Interval::new(min, max)
    }

    #[test]
    fn and_of_overlapping_lists() {
        let a = vec![iv(-0.5, -0.1), iv(0.1, 0.5)];
        let b = vec![iv(-0.3, 0.3)];
        let c = interval_and(&a, &b);
        assert_eq!(c, vec![iv(-0.3, -0.1), iv(0.1, 0.3)]);
    }

    #[test]
    fn and_discards_slivers() {
        let a = vec![iv(0.0, 1.0)];
        let b = vec![iv(1.0 - EPSILON / 2.0, 2.0)];
        assert!(interval_and(&a, &b).is_empty());
    }

    #[test]
    fn or_merges_touching() {
        let a = vec![iv(-0.5, 0.0), iv(0.4, 0.6)];
        let b = vec![iv(-0.1, 0.45)];
        let c = interval_or(&a, &b);
        assert_eq!(c, vec![iv(-0.5, 0.6)]);
    }

    #[test]
    fn or_keeps_disjoint() {
        let a = vec![iv(-0.5, -0.4)];
        let b = vec![iv(0.4, 0.5)];
        assert_eq!(interval_or(&a, &b), vec![iv(-0.5, -0.4), iv(0.4, 0.5)]);
    }

    #[test]
    fn inverse_is_involution() {
        let reference = RadianInterval::new(-1.0, 1.0);
        let l = vec![iv(-0.8, -0.2), iv(0.3, 0.7)];
        let inv = interval_inverse_radians(&l, reference);
        assert_eq!(inv, vec![iv(-1.0, -0.8), iv(-0.2, 0.3), iv(0.7, 1.0)]);
        let back = interval_inverse_radians(&inv, reference);
        assert_eq!(back, l);
    }

    #[test]
    fn inverse_of_empty_is_reference() {
        let reference = RadianInterval::new(-0.5, 0.5);
        assert_eq!(
            interval_inverse_radians(&[], reference),
            vec![iv(-0.5, 0.5)]
        );
    }

    #[test]
    fn inverse_of_jumping_reference() {
        let reference = RadianInterval::new(2.0, -2.0);
        let l = vec![iv(-3.0, -2.5)];
        let inv = interval_inverse_radians(&l, reference);
        assert_eq!(inv, vec![iv(-PI, -3.0), iv(-2.5, -2.0), iv(2.0, PI)]);
    }

    #[test]
    fn reverse_is_involution() {
        let orig = vec![iv(-0.8, -0.2), iv(0.3, 0.7)];
        let mut l = orig.clone();
        interval_reverse(&mut l);
        assert_eq!(l, vec![iv(-0.7, -0.3), iv(0.2, 0.8)]);
        interval_reverse(&mut l);
        assert_eq!(l, orig);
    }

    #[test]
    fn and_radians_no_jumps() {
        let c = interval_and_radians(RadianInterval::new(-1.0, 1.0), RadianInterval::new(0.0, 2.0));
        assert_eq!(c, vec![iv(0.0, 1.0)]);
    }

    #[test]
    fn and_radians_one_jump() {
        // a = [2.5;π] ∪ [-π;-2.5], b = [-3.0;3.0]
        let c = interval_and_radians(
            RadianInterval::new(2.5, -2.5),
            RadianInterval::new(-3.0, 3.0),
        );
        assert_eq!(c, vec![iv(-3.0, -2.5), iv(2.5, 3.0)]);
    }

    #[test]
    fn collapse_merges_adjacent() {
        let mut l = vec![iv(0.0, 0.5), iv(0.5 + EPSILON / 10.0, 1.0), iv(2.0, 3.0)];
        collapse_intervals(&mut l);
        assert_eq!(l, vec![iv(0.0, 1.0), iv(2.0, 3.0)]);
    }

    #[test]
    fn contains_scans_to_covering_interval() {
        let l = vec![iv(-0.5, -0.1), iv(0.1, 0.5)];
        assert!(interval_contains(&l, -0.3));
        assert!(interval_contains(&l, 0.1));
        assert!(!interval_contains(&l, 0.0));
        assert!(!interval_contains(&l, 0.7));
    }

    #[test]
    fn full_interval_detection() {
        assert!(is_full_interval(&[iv(-0.5, 0.5)], -0.5, 0.5));
        assert!(!is_full_interval(&[iv(-0.5, 0.4)], -0.5, 0.5));
        assert!(!is_full_interval(
            &[iv(-0.5, 0.0), iv(0.0, 0.5)],
            -0.5,
            0.5
        ));
    }

    #[test]
    fn half_plane_full_when_circle_inside() {
        // Line far to the right of a unit circle, right side facing the origin:
        let l = LineSegment::new(Point::new(5.0, 1.0), Point::new(5.0, -1.0));
        let i = circle_half_plane_intersection(1.0, l).unwrap();
        assert_eq!((i.from, i.to), (-PI, PI));
    }

    #[test]
    fn half_plane_none_when_circle_outside() {
        let l = LineSegment::new(Point::new(5.0, -1.0), Point::new(5.0, 1.0));
        assert!(circle_half_plane_intersection(1.0, l).is_none());
    }

    #[test]
    fn half_plane_crossing_is_half_circle() {
        // Vertical line through the origin, right side is x > 0... the half
        // plane right of p1->p2 going up is the x > 0 side.
        let l = LineSegment::new(Point::new(0.0, -5.0), Point::new(0.0, 5.0));
        let i = circle_half_plane_intersection(1.0, l).unwrap();
        assert!(in_radian_interval(0.0, i));
        assert!(!in_radian_interval(PI - 0.1, i));
    }

    #[test]
    fn circle_circle_overlapping() {
        let l = circle_circle_intersection(1.0, Point::new(1.0, 0.0), 0.5);
        assert_eq!(l.len(), 1);
        assert!(interval_contains(&l, 0.0));
        assert!(!interval_contains(&l, PI / 2.0));
    }

    #[test]
    fn circle_circle_disjoint() {
        assert!(circle_circle_intersection(1.0, Point::new(5.0, 0.0), 0.5).is_empty());
    }

    #[test]
    fn arena_roundtrip() {
        let mut v = IntervalListVector::new(3, 4);
        v.insert(0, &[iv(0.0, 1.0), iv(2.0, 3.0)]);
        v.insert_empty(1);
        v.insert(2, &[iv(-1.0, 1.0)]);
        assert_eq!(v.get(0), &[iv(0.0, 1.0), iv(2.0, 3.0)]);
        assert!(v.get(1).is_empty());
        assert_eq!(v.interval_len_at(2), 1);
        assert_eq!(v.interval_count(), 3);
        assert_eq!(v.get_interval(0, 1), iv(2.0, 3.0));
        assert_eq!(v.indicator_len(), 3);
    }
}
