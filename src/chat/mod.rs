pub mod dispatch;
pub mod events;

pub use dispatch::{ChatDispatcher, FileSource, InlineFileSource};
pub use events::{ChatEvent, ChatReply, SharedFile};
