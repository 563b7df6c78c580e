pub mod device;
pub mod envelope;
pub mod mds;
pub mod metrics;
pub mod session;

pub use device::{AttestationMetadata, Device, DeviceState, MdsDeviceMetadata};
pub use envelope::RawEnvelope;
pub use mds::{MdsBlob, MdsDeviceRecord};
pub use metrics::Metrics;
pub use session::{Session, SessionStatus};
