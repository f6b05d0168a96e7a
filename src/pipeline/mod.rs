mod aggregator;
mod engine;
mod pacer;

pub use aggregator::Aggregator;
pub use engine::*;
pub use pacer::*;
