pub mod pinecone;

pub use pinecone::{PineconeConfig, PineconeStore, DEFAULT_CONTROLLER_URL};
