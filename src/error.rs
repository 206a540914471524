use thiserror::Error;

/// Failures while decoding the JSON body of the status protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected '{found}' at byte {offset}, expected '['")]
    UnexpectedByte { found: char, offset: usize },

    #[error("trailing data after the end of the status stream")]
    TrailingData,
}

/// Failures while supervising the status command process.
#[derive(Error, Debug)]
pub enum ChildError {
    #[error("could not spawn status_command: {0}")]
    Spawn(std::io::Error),

    #[error("read from status_command failed: {0}")]
    Read(std::io::Error),

    #[error("could not send signal {signal} to status_command: {source}")]
    Signal {
        signal: i32,
        source: std::io::Error,
    },

    #[error("waiting for status_command failed: {0}")]
    Wait(std::io::Error),
}
