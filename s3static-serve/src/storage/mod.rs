//! Object store backends

mod ephemeral;
mod remote;
mod traits;


pub use ephemeral::EphemeralStorage;
pub use remote::RemoteStorage;
pub use traits::{BodyStream, ObjectContent, ObjectInfo, ObjectStore, StoreError};
