//! Instruction Leaf Probe
//! Issues a single CPUID query and hands back the four raw result registers.

use std::cell::RefCell;
use std::collections::BTreeMap;

/// Raw output of one leaf query (EAX, EBX, ECX, EDX).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawLeaf {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl RawLeaf {
    pub const fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }
}

pub trait LeafProbe {
    /// Whether the query instruction exists on this target at all.
    fn is_available(&self) -> bool;

    /// Query `leaf`. Unavailable probes return an all-zero leaf.
    fn query(&self, leaf: u32) -> RawLeaf;
}

/// Native CPUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuidProbe;

impl LeafProbe for CpuidProbe {
    #[cfg(target_arch = "x86_64")]
    fn is_available(&self) -> bool {
        true
    }

    #[cfg(target_arch = "x86")]
    fn is_available(&self) -> bool {
        std::arch::x86::has_cpuid()
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn is_available(&self) -> bool {
        false
    }

    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    fn query(&self, leaf: u32) -> RawLeaf {
        // SAFETY: CPUID is part of the x86_64 baseline.
        let r = unsafe { std::arch::x86_64::__cpuid(leaf) };
        RawLeaf::new(r.eax, r.ebx, r.ecx, r.edx)
    }

    #[cfg(target_arch = "x86")]
    #[allow(unused_unsafe)]
    fn query(&self, leaf: u32) -> RawLeaf {
        if !std::arch::x86::has_cpuid() {
            return RawLeaf::default();
        }
        // SAFETY: guarded by has_cpuid above.
        let r = unsafe { std::arch::x86::__cpuid(leaf) };
        RawLeaf::new(r.eax, r.ebx, r.ecx, r.edx)
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn query(&self, _leaf: u32) -> RawLeaf {
        RawLeaf::default()
    }
}

/// Probe strategy chosen for the build target.
#[derive(Debug, Clone, Copy)]
pub enum ProbeProvider {
    Native(CpuidProbe),
    Unavailable,
}

impl ProbeProvider {
    pub fn detect() -> Self {
        if CpuidProbe.is_available() {
            ProbeProvider::Native(CpuidProbe)
        } else {
            ProbeProvider::Unavailable
        }
    }
}

impl LeafProbe for ProbeProvider {
    fn is_available(&self) -> bool {
        match self {
            ProbeProvider::Native(probe) => probe.is_available(),
            ProbeProvider::Unavailable => false,
        }
    }

    fn query(&self, leaf: u32) -> RawLeaf {
        match self {
            ProbeProvider::Native(probe) => probe.query(leaf),
            ProbeProvider::Unavailable => RawLeaf::default(),
        }
    }
}

/// Table-driven probe. Leaves not in the table read as zero.
/// Every query is recorded so callers can check which leaves were touched.
#[derive(Debug, Default)]
pub struct FixedLeafProbe {
    leaves: BTreeMap<u32, RawLeaf>,
    queried: RefCell<Vec<u32>>,
}

impl FixedLeafProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leaf(mut self, leaf: u32, result: RawLeaf) -> Self {
        self.leaves.insert(leaf, result);
        self
    }

    /// Leaves queried so far, in call order.
    pub fn queried(&self) -> Vec<u32> {
        self.queried.borrow().clone()
    }
}

impl LeafProbe for FixedLeafProbe {
    fn is_available(&self) -> bool {
        true
    }

    fn query(&self, leaf: u32) -> RawLeaf {
        self.queried.borrow_mut().push(leaf);
        self.leaves.get(&leaf).copied().unwrap_or_default()
    }
}
