pub mod bm25;
pub mod corpus;
pub mod fusion;
pub mod tokenize;

pub use bm25::{Bm25Params, SparseScorer, SparseVector};
pub use corpus::CorpusStats;
pub use fusion::{FusedHit, Modality, RankedHit, fuse};
