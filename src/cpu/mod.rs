pub mod leaf;
pub mod platform;
pub mod features;

pub use features::{CpuCaps, FeatureDetector};
pub use leaf::{CpuidProbe, FixedLeafProbe, LeafProbe, ProbeProvider, RawLeaf};
pub use platform::{HostPlatform, PlatformFeatures, StaticPlatform};
