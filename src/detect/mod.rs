mod detector;
mod fingerprint;

pub use detector::{ChangeDetector, Detection};
pub use fingerprint::fingerprint;
