//! Core translation logic — types, expressions, resolution, linking, emission.

pub mod emit;
pub mod enrich;
pub mod expr;
pub mod link;
pub mod logical_id;
pub mod modtree;
pub mod pipeline;
pub mod resolver;
pub mod translate;
pub mod types;
