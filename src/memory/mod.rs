pub mod embeddings;
pub mod models;
pub mod store;
pub mod vector;

pub use embeddings::EmbeddingClient;
pub use models::{
    Expression, Jargon, MemberProfile, Memory, MemoryType, MessageLog, MoodState, StoreStats,
    Sticker,
};
pub use store::MemoryStore;
pub use vector::{Metric, VectorIndex};

#[cfg(test)]
mod tests;
