mod arrival;
mod started;

pub use arrival::{BlobEventData, CodecError, FileArrivalMessage, BLOB_CREATED_MARKER};
pub use started::{AudioFileInfo, JobStartedMessage};
