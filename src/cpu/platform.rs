//! Platform capability source.
//! Supplies the features that are not read from leaf 1 directly.

use crate::cpu::leaf::{LeafProbe, ProbeProvider};

const EXT_LEAF_MAX: u32 = 0x8000_0000;
const EXT_LEAF_FEATURES: u32 = 0x8000_0001;
const EXT_D_3DNOW: u32 = 1 << 31;

pub trait PlatformFeatures {
    fn has_mmx(&self) -> bool;
    fn has_3dnow(&self) -> bool;
    fn has_sse(&self) -> bool;
    fn has_sse2(&self) -> bool;
    fn has_altivec(&self) -> bool;
}

/// Runtime detection through std, plus the AMD extended leaf for 3DNow.
#[derive(Debug, Clone, Copy)]
pub struct HostPlatform<P = ProbeProvider> {
    probe: P,
}

impl HostPlatform {
    pub fn detect() -> Self {
        Self::with_probe(ProbeProvider::detect())
    }
}

impl<P: LeafProbe> HostPlatform<P> {
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::detect()
    }
}

impl<P: LeafProbe> PlatformFeatures for HostPlatform<P> {
    fn has_mmx(&self) -> bool {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            is_x86_feature_detected!("mmx")
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            false
        }
    }

    // std_detect has no entry for 3DNow, so read it from the extended leaf.
    fn has_3dnow(&self) -> bool {
        if !self.probe.is_available() {
            return false;
        }
        if self.probe.query(EXT_LEAF_MAX).a < EXT_LEAF_FEATURES {
            return false;
        }
        self.probe.query(EXT_LEAF_FEATURES).d & EXT_D_3DNOW == EXT_D_3DNOW
    }

    fn has_sse(&self) -> bool {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            is_x86_feature_detected!("sse")
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            false
        }
    }

    fn has_sse2(&self) -> bool {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            is_x86_feature_detected!("sse2")
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            false
        }
    }

    fn has_altivec(&self) -> bool {
        cfg!(target_feature = "altivec")
    }
}

/// Fixed answers, e.g. for tests or a pinned deployment profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticPlatform {
    pub mmx: bool,
    pub three_dnow: bool,
    pub sse: bool,
    pub sse2: bool,
    pub altivec: bool,
}

impl PlatformFeatures for StaticPlatform {
    fn has_mmx(&self) -> bool {
        self.mmx
    }

    fn has_3dnow(&self) -> bool {
        self.three_dnow
    }

    fn has_sse(&self) -> bool {
        self.sse
    }

    fn has_sse2(&self) -> bool {
        self.sse2
    }

    fn has_altivec(&self) -> bool {
        self.altivec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::leaf::{FixedLeafProbe, RawLeaf};

    #[test]
    fn test_host_platform_x86_64_baseline() {
        let host = HostPlatform::detect();
        if cfg!(target_arch = "x86_64") {
            // SSE and SSE2 are mandatory on x86_64.
            assert!(host.has_sse());
            assert!(host.has_sse2());
            assert!(!host.has_altivec());
        }
    }

    #[test]
    fn test_host_platform_3dnow_without_probe() {
        let host = HostPlatform::with_probe(ProbeProvider::Unavailable);
        assert!(!host.has_3dnow());
    }

    #[test]
    fn test_3dnow_skips_missing_extended_leaf() {
        // Feature leaf claims 3DNow, but the max extended leaf stops short of it.
        let probe = FixedLeafProbe::new()
            .with_leaf(EXT_LEAF_MAX, RawLeaf::new(EXT_LEAF_MAX, 0, 0, 0))
            .with_leaf(EXT_LEAF_FEATURES, RawLeaf::new(0, 0, 0, EXT_D_3DNOW));
        let host = HostPlatform::with_probe(probe);

        assert!(!host.has_3dnow());
        assert_eq!(host.probe().queried(), vec![EXT_LEAF_MAX]);
    }

    #[test]
    fn test_3dnow_bit_set() {
        let probe = FixedLeafProbe::new()
            .with_leaf(EXT_LEAF_MAX, RawLeaf::new(0x8000_0008, 0, 0, 0))
            .with_leaf(EXT_LEAF_FEATURES, RawLeaf::new(0, 0, 0, EXT_D_3DNOW | 1));
        let host = HostPlatform::with_probe(probe);

        assert!(host.has_3dnow());
        assert_eq!(host.probe().queried(), vec![EXT_LEAF_MAX, EXT_LEAF_FEATURES]);
    }

    #[test]
    fn test_3dnow_bit_clear() {
        // Every other EDX bit set, including 3DNow+ (bit 30).
        let probe = FixedLeafProbe::new()
            .with_leaf(EXT_LEAF_MAX, RawLeaf::new(EXT_LEAF_FEATURES, 0, 0, 0))
            .with_leaf(EXT_LEAF_FEATURES, RawLeaf::new(0, 0, 0, !EXT_D_3DNOW));
        let host = HostPlatform::with_probe(probe);

        assert!(!host.has_3dnow());
    }
}
