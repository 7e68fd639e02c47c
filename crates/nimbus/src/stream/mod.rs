//! Request handles and the auth-gate buffer

mod buffer;
mod handle;

pub use buffer::{BufferState, HIGH_WATER_MARK, StreamBuffer};
pub use handle::{
    DownloadTarget, LiveBody, Reply, RequestHandle, RequestStream, RequestWriter, ResponseHead,
};

pub(crate) use handle::DownloadSlot;
