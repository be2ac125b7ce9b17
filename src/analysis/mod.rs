// Scoring core: turns one peer-evaluation comment into a tone label and
// flags contradictions with the declared score.
//
// rules holds the immutable tables; each other module is one pipeline
// stage; pipeline sequences them per item and batch fans items out.

pub mod batch;
pub mod bias;
pub mod contrast;
pub mod disparity;
pub mod label;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod rules;
pub mod sentences;
pub mod toxicity;
