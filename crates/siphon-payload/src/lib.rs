mod codec;
mod error;
mod reading;

pub use codec::decode;
pub use error::{PayloadError, Result};
pub use reading::{DecodedPayload, Reading, RecoveryBatch};
