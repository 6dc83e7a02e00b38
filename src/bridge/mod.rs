pub mod error_channel;
pub mod handle;
pub mod marshal;

pub use error_channel::{adopt_handle, check_extent, check_status, discard_stale, take_last_error};
pub use handle::NativeHandle;
pub use marshal::StableArray;
