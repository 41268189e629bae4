pub mod builder;
pub mod engine;

pub use builder::CompositionBuilder;
pub use engine::EditEngine;
