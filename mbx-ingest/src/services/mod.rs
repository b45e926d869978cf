//! Pipeline services

pub mod deduplicator;
pub mod file_categorizer;
pub mod normalizer;
pub mod unwrapper;

pub use deduplicator::{DedupStats, Deduplicator};
pub use file_categorizer::{CategorizeResult, FileCategorizer, ScanError};
pub use normalizer::Normalizer;
pub use unwrapper::{
    extract_tar, ContainerUnwrapper, ExternalToolUnwrapper, ExtractStats, NativeUnwrapper,
};
