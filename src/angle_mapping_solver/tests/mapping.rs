use angle_mapping_solver::encoder::{Encoding, ModelEncoder};
use angle_mapping_solver::mapping::AngleMapping;
use brick_core::block::Block;
use brick_core::brick::GridBrick;
use brick_core::connection::{BrickId, ConnectionEnd, ConnectionPair, ConnectionPoint, Corner};
use fxhash::FxHashSet;

/// A corner connection: the stud `corner_low` of `lower_block` pointing up
/// into the tube `corner_up` of `upper_block`.
fn corner_pair(
    lower_block: usize,
    corner_low: Corner,
    upper_block: usize,
    corner_up: Corner,
) -> ConnectionPair {
    let low = ConnectionPoint::new(corner_low, GridBrick::default(), true, 0);
    let up = ConnectionPoint::new(corner_up, GridBrick::default(), false, 0);
    ConnectionPair::new(
        ConnectionEnd::new(BrickId::new(0, 0, lower_block), low),
        ConnectionEnd::new(BrickId::new(0, 0, upper_block), up),
    )
}

fn singles(n: usize) -> Vec<Block> {
    (0..n).map(|_| Block::single(0)).collect()
}

#[test_log::test]
fn two_singles_one_hinge_is_one_rectilinear_class() {
    let blocks = singles(2);
    let encoder = ModelEncoder::new(&blocks);
    let connections = [corner_pair(0, Corner::Ne, 1, Corner::Sw)];

    let mut non_cyclic: FxHashSet<u64> = FxHashSet::default();
    let mut cyclic: FxHashSet<Encoding> = FxHashSet::default();
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, false);
    let found = mapping.find_new_models(&mut non_cyclic, &mut cyclic, true);

    // The single rotation arc is one connected region around the
    // rectilinear form:
    assert!(!found.any_problematic);
    assert!(found.problematic.is_empty());
    assert_eq!(found.rectilinear_count, 1);
    assert_eq!(found.new_rectilinear.len(), 1);
    assert_eq!(found.model_count, 0);

    let encoding = found.new_rectilinear[0].1;
    assert_eq!(encoding.required & 0x0F, 1);
    // A two-block tree can never close a cycle:
    assert_eq!(encoding.extra, 0);
    assert_eq!(non_cyclic.len(), 1);
    assert!(cyclic.is_empty());
}

#[test_log::test]
fn boost_retry_is_a_no_op_without_problems() {
    let blocks = singles(2);
    let encoder = ModelEncoder::new(&blocks);
    let connections = [corner_pair(0, Corner::Ne, 1, Corner::Sw)];

    let mut non_cyclic: FxHashSet<u64> = FxHashSet::default();
    let mut cyclic: FxHashSet<Encoding> = FxHashSet::default();
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, false);
    let found = mapping.find_new_models_with_boost_retry(&mut non_cyclic, &mut cyclic);

    assert!(!found.any_problematic);
    assert_eq!(found.rectilinear_count, 1);
    assert_eq!(mapping.boosts.iter().sum::<u64>(), 1);
}

#[test_log::test]
fn chain_of_three_singles_stays_rectilinear() {
    let blocks = singles(3);
    let encoder = ModelEncoder::new(&blocks);
    let connections = [
        corner_pair(0, Corner::Ne, 1, Corner::Sw),
        corner_pair(1, Corner::Ne, 2, Corner::Sw),
    ];

    let mut non_cyclic: FxHashSet<u64> = FxHashSet::default();
    let mut cyclic: FxHashSet<Encoding> = FxHashSet::default();
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, false);
    let found = mapping.find_new_models(&mut non_cyclic, &mut cyclic, true);

    // Both free angles turn freely; one region, containing the rectilinear
    // form:
    assert!(!found.any_problematic);
    assert_eq!(found.rectilinear_count, 1);
    assert_eq!(found.model_count, 0);
    assert_eq!(non_cyclic.len(), 1);
    assert!(cyclic.is_empty());
}

#[test_log::test]
fn adjacent_hinges_are_angle_locked() {
    // Two blocks on side-by-side studs of the base pin each other's angle;
    // both connections collapse to the locked path and the rectilinear form
    // is the single survivor.
    let blocks = singles(3);
    let encoder = ModelEncoder::new(&blocks);
    let connections = [
        corner_pair(0, Corner::Ne, 1, Corner::Sw),
        corner_pair(0, Corner::Nw, 2, Corner::Se),
    ];

    let mut non_cyclic: FxHashSet<u64> = FxHashSet::default();
    let mut cyclic: FxHashSet<Encoding> = FxHashSet::default();
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, false);
    let found = mapping.find_new_models(&mut non_cyclic, &mut cyclic, true);

    assert!(!found.any_problematic);
    assert_eq!(found.rectilinear_count, 1);
    assert_eq!(found.model_count, 0);
}

#[test_log::test]
fn extreme_mode_deduplicates_relabeled_attempts() {
    let blocks = singles(2);
    let encoder = ModelEncoder::new(&blocks);

    let mut non_cyclic: FxHashSet<u64> = FxHashSet::default();
    let mut cyclic: FxHashSet<Encoding> = FxHashSet::default();

    let connections = [corner_pair(0, Corner::Ne, 1, Corner::Sw)];
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, true);
    let first = mapping.find_new_extreme_models(&mut non_cyclic, &mut cyclic);
    assert_eq!(first.rectilinear_count, 1);
    assert_eq!(first.model_count, 0);
    assert_eq!(non_cyclic.len(), 1);

    // The same assembly with the two interchangeable blocks relabeled, so
    // block 1 now hangs underneath block 0. The canonical encoding is
    // already known and nothing new is counted.
    let low = ConnectionPoint::new(Corner::Ne, GridBrick::default(), true, 0);
    let up = ConnectionPoint::new(Corner::Sw, GridBrick::default(), false, 0);
    let relabeled = [ConnectionPair::new(
        ConnectionEnd::new(BrickId::new(0, 0, 0), up),
        ConnectionEnd::new(BrickId::new(0, 0, 1), low),
    )];
    let mut mapping = AngleMapping::new(&blocks, &relabeled, &encoder, true);
    let second = mapping.find_new_extreme_models(&mut non_cyclic, &mut cyclic);
    assert_eq!(second.rectilinear_count, 0);
    assert_eq!(second.model_count, 0);
    assert_eq!(non_cyclic.len(), 1);

    // Running the original again is also a no-op:
    let mut mapping = AngleMapping::new(&blocks, &connections, &encoder, true);
    let third = mapping.find_new_extreme_models(&mut non_cyclic, &mut cyclic);
    assert_eq!(third.rectilinear_count, 0);
    assert_eq!(non_cyclic.len(), 1);
}
