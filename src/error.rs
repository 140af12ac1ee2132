use crate::types::{EventId, StreamId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Trace directory '{}' was not found", .0.display())]
    NotFound(PathBuf),

    #[error("Encountered an IO error ({})", .0.kind())]
    Io(#[from] io::Error),

    #[error("Metadata framing uses an unsupported feature: {0}")]
    UnsupportedFraming(&'static str),

    #[error("Metadata packet header magic number 0x{found:X} isn't recognized")]
    BadMetadataMagic { found: u32 },

    #[error("Packet header magic number 0x{found:X} doesn't match CTF_MAGIC_NUMBER")]
    BadMagic { found: u32 },

    #[error("Packet UUID {found} doesn't match the trace UUID {expected}")]
    UuidMismatch { expected: Uuid, found: Uuid },

    #[error("Stream file declares stream id {found}, but a prior packet declared {expected}")]
    StreamIdChange { expected: StreamId, found: StreamId },

    #[error("Encountered a CTF stream ID ({0}) that's not defined in the metadata")]
    UnknownStream(StreamId),

    #[error("Encountered a CTF event ID ({0}) that's not defined in its stream's metadata")]
    InvalidEventId(EventId),

    #[error("Packet size invariant violated: {0}")]
    BadPacketSize(String),

    #[error("Failed to parse trace metadata: {0}")]
    MetadataParseError(String),

    #[error("Unsupported field type '{0}' (size {1}, alignment {2})")]
    UnsupportedFieldType(String, usize, usize),

    #[error("Unsupported alignment '{0}'")]
    UnsupportedAlignment(String),

    #[error("Attempted to decode an invalid float size ({0})")]
    InvalidFloatSize(usize),

    #[error("Field reference '{0}' couldn't be resolved against any known scope")]
    UnresolvedFieldRef(String),

    #[error("Attempted to read past the mapped packet window")]
    Eof,
}

impl Error {
    pub(crate) fn unsupported_alignment<S: AsRef<str>>(f: S) -> Self {
        Error::UnsupportedAlignment(f.as_ref().to_owned())
    }
}
