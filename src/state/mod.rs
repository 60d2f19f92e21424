pub mod kv_store;
pub mod readiness;

pub use kv_store::KvStore;
pub use readiness::ReadinessFlag;
