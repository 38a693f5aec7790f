use thiserror::Error;

/// Main error type for chatrag
#[derive(Error, Debug)]
pub enum ChatragError {
    /// Source bytes could not be read in their declared format
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Embedding service unavailable, rejected the request, or timed out
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Completion service unavailable, rejected the request, or timed out
    #[error("Completion service error: {0}")]
    Completion(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Any failure while indexing one file, tagged with its display name
    #[error("Failed to index `{filename}`: {source}")]
    Indexing {
        filename: String,
        #[source]
        source: Box<ChatragError>,
    },

    /// Any failure while answering one query, tagged with the query text
    #[error("Failed to answer \"{query}\": {source}")]
    Query {
        query: String,
        #[source]
        source: Box<ChatragError>,
    },
}

impl ChatragError {
    /// Wrap an error with the display name of the file being indexed.
    pub fn indexing(filename: impl Into<String>, source: ChatragError) -> Self {
        Self::Indexing {
            filename: filename.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the query that was being answered.
    pub fn query(query: impl Into<String>, source: ChatragError) -> Self {
        Self::Query {
            query: query.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, past any indexing/query context wrappers.
    pub fn root(&self) -> &ChatragError {
        match self {
            Self::Indexing { source, .. } | Self::Query { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenient Result type using ChatragError
pub type Result<T> = std::result::Result<T, ChatragError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatragError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChatragError = io_err.into();
        assert!(matches!(err, ChatragError::Io(_)));
    }

    #[test]
    fn test_indexing_error_carries_filename() {
        let err = ChatragError::indexing(
            "handbook.pdf",
            ChatragError::Extraction("bad xref table".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("handbook.pdf"));
        assert!(msg.contains("bad xref table"));
        assert!(matches!(err.root(), ChatragError::Extraction(_)));
    }

    #[test]
    fn test_query_error_carries_query() {
        let err = ChatragError::query(
            "refund policy",
            ChatragError::Completion("503 Service Unavailable".to_string()),
        );
        assert!(err.to_string().contains("refund policy"));
        assert!(matches!(err.root(), ChatragError::Completion(_)));
    }
}
