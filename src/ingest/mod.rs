pub mod chunker;
pub mod extract;
pub mod metadata;
pub mod pipeline;
pub mod registry;

pub use chunker::{ChunkMetadata, Chunker, TextChunk};
pub use extract::{ExtractorRegistry, MediaType, TextExtractor};
pub use metadata::{
    file_id_for_bytes, guess_media_type, DocumentMetadata, FileDescriptor, SourceDocument,
    SOURCE_TAG,
};
pub use pipeline::IndexingPipeline;
pub use registry::IngestionRegistry;
