//! Feature Detection Module
//! Turns raw leaf results into named capabilities and the dispatch bitmask.

use bitflags::bitflags;
use tracing::debug;

use crate::cpu::leaf::{LeafProbe, ProbeProvider, RawLeaf};
use crate::cpu::platform::{HostPlatform, PlatformFeatures};

const C_SSE3: u32 = 1 << 0;
const D_FXSAVE: u32 = 1 << 24;

bitflags! {
    /// Capability bitmask consumed by SIMD dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct CpuCaps: u32 {
        const GENERIC = 0x0002;
        const MMX = 0x0010;
        const THREE_DNOW = 0x0020;
        const SSE = 0x0040;
        const SSE2 = 0x0080;
        const SSE3 = 0x0100;
        const ALTIVEC = 0x0200;
    }
}

#[derive(Debug, Clone)]
pub struct FeatureDetector<P = ProbeProvider, S = HostPlatform> {
    probe: P,
    platform: S,
}

impl FeatureDetector {
    /// Detector backed by the real processor.
    pub fn host() -> Self {
        Self::new(ProbeProvider::detect(), HostPlatform::detect())
    }
}

impl<P: LeafProbe, S: PlatformFeatures> FeatureDetector<P, S> {
    pub fn new(probe: P, platform: S) -> Self {
        Self { probe, platform }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Leaf 1, or `None` when leaf 0 says the processor stops at leaf 0.
    /// Leaf 1 is never queried in that case.
    fn feature_leaf(&self) -> Option<RawLeaf> {
        let max_leaf = self.probe.query(0).a;
        if max_leaf < 1 {
            debug!(max_leaf, "processor does not implement leaf 1");
            return None;
        }
        Some(self.probe.query(1))
    }

    pub fn has_sse3(&self) -> bool {
        self.feature_leaf()
            .is_some_and(|leaf| leaf.c & C_SSE3 == C_SSE3)
    }

    /// DAZ control needs FXSAVE (leaf 1 EDX bit 24).
    pub fn has_daz_support(&self) -> bool {
        self.feature_leaf()
            .is_some_and(|leaf| leaf.d & D_FXSAVE == D_FXSAVE)
    }

    pub fn has_mmx(&self) -> bool {
        self.platform.has_mmx()
    }

    pub fn has_3dnow(&self) -> bool {
        self.platform.has_3dnow()
    }

    pub fn has_sse(&self) -> bool {
        self.platform.has_sse()
    }

    pub fn has_sse2(&self) -> bool {
        self.platform.has_sse2()
    }

    pub fn has_altivec(&self) -> bool {
        self.platform.has_altivec()
    }

    /// Vendor string from leaf 0 (EBX, EDX, ECX), e.g. "GenuineIntel".
    pub fn vendor(&self) -> Option<String> {
        if !self.probe.is_available() {
            return None;
        }
        let leaf = self.probe.query(0);
        let mut bytes = Vec::with_capacity(12);
        for word in [leaf.b, leaf.d, leaf.c] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let vendor = String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string();
        if vendor.is_empty() {
            None
        } else {
            Some(vendor)
        }
    }

    pub fn processor_capabilities(&self) -> CpuCaps {
        let mut caps = CpuCaps::GENERIC;
        if self.has_mmx() {
            caps |= CpuCaps::MMX;
        }
        if self.has_3dnow() {
            caps |= CpuCaps::THREE_DNOW;
        }
        if self.has_sse() {
            caps |= CpuCaps::SSE;
        }
        if self.has_sse2() {
            caps |= CpuCaps::SSE2;
        }
        // Without the query instruction there is no SSE3 path to take.
        if self.probe.is_available() && self.has_sse3() {
            caps |= CpuCaps::SSE3;
        }
        if self.has_altivec() {
            caps |= CpuCaps::ALTIVEC;
        }
        caps
    }
}
