#![warn(clippy::pedantic)]
#![allow(clippy::float_cmp)]

pub mod encoder;
pub mod mapping;
pub mod model;
pub mod report;
pub mod turning;
pub mod union_find;

pub use encoder::{Encoding, ModelEncoder};
pub use mapping::{AngleMapping, FoundModels, NominalIsland, StrictIsland};
pub use model::Model;
pub use report::ProblematicReport;
pub use union_find::{IntervalUnionFind, MixedPosition};
