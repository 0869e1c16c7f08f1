use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not an FBX binary container: bad magic")]
    Magic,

    #[error("failed to parse FBX binary: {message}")]
    Parse { message: String },

    #[error("failed to inflate compressed array: {message}")]
    Decompress { message: String },
}
