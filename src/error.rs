//! Error taxonomy for the transform pipeline.
//!
//! A file either transforms fully or fails as a whole; no variant here is
//! recoverable mid-file.

use thiserror::Error;

use crate::loader::LoadError;

pub type TransformResult<T> = Result<T, TransformError>;

#[derive(Debug, Error)]
pub enum TransformError {
    /// The source text could not be parsed at all.
    #[error("{file}: parse failed: {message}")]
    Parse { file: String, message: String },

    /// A compile-time marker was used outside the supported shapes.
    #[error("{file}: {message}")]
    Usage { file: String, message: String },

    /// An `import.meta.compileTime` specifier did not resolve to a file.
    #[error("{file}: cannot resolve \"{specifier}\"")]
    Resolution { file: String, specifier: String },

    /// User code threw while the module loader executed it.
    #[error("{file}: compile-time evaluation failed: {message}")]
    Evaluation { file: String, message: String },

    /// A resolved value has no literal representation.
    #[error("cannot serialize compile-time value: {message}")]
    Serialization { message: String },
}

impl TransformError {
    pub(crate) fn usage(file: impl Into<String>, message: impl Into<String>) -> Self {
        TransformError::Usage {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Wraps a loader failure, keeping the original stack when one was
    /// reported.
    pub(crate) fn evaluation(file: impl Into<String>, error: LoadError) -> Self {
        let message = match error.stack {
            Some(stack) => format!("{}\n{}", error.message, stack),
            None => error.message,
        };
        TransformError::Evaluation {
            file: file.into(),
            message,
        }
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        TransformError::Serialization {
            message: message.into(),
        }
    }
}
