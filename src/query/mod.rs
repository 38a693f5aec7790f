pub mod context;
pub mod pipeline;

pub use context::{assemble, format_block, AssembledContext};
pub use pipeline::{Answer, AnswerSource, QueryPipeline, NO_DOCUMENTS_MESSAGE, SYSTEM_INSTRUCTION};
