pub mod device;

pub use device::{DegradationModel, StorageDevice, StorageError, StorageParameters};
