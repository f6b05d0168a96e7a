//! Text processing: tokenization of record fields and preparation of counts
//! for downstream rendering.

mod filter;
mod tokenizer;

pub use filter::*;
pub use tokenizer::*;
