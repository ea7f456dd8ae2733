use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Spawned process did not expose {channel}")]
    ChannelUnavailable { channel: &'static str },

    #[error("Process termination is not supported on this platform")]
    TerminationUnsupported,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
