//! Floating-point control register access.
//!
//! The register is per-thread hardware state, so every mutation goes through
//! an explicit [`FpEnvironment`] handle. [`HostFpEnvironment`] talks to the
//! real MXCSR / x87 control word; [`SimulatedFpEnvironment`] keeps a software
//! copy for deterministic tests.
use std::marker::PhantomData;

/// MXCSR denormals-are-zero.
pub const MXCSR_DAZ: u32 = 1 << 6;
/// MXCSR flush-to-zero.
pub const MXCSR_FTZ: u32 = 1 << 15;
/// Power-on MXCSR: all exceptions masked, round-to-nearest, DAZ/FTZ off.
pub const MXCSR_DEFAULT: u32 = 0x1f80;

/// x87 precision-control field (bits 8-9).
pub const X87_PC_MASK: u16 = 0x0300;
/// 64-bit significand.
pub const X87_PC_64: u16 = 0x0300;
/// Power-on x87 control word.
pub const X87_CW_DEFAULT: u16 = 0x037f;

pub trait FpEnvironment {
    /// Current MXCSR, or `None` if this target has no such register.
    fn read_csr(&self) -> Option<u32>;

    fn write_csr(&mut self, value: u32);

    /// x87 control word, only where precision is software controlled.
    fn read_control_word(&self) -> Option<u16> {
        None
    }

    fn write_control_word(&mut self, _value: u16) {}
}

/// The executing thread's real registers. Not `Send`: the state it names
/// belongs to the thread that created it.
#[derive(Debug)]
pub struct HostFpEnvironment {
    _thread_bound: PhantomData<*const ()>,
}

impl HostFpEnvironment {
    pub fn current() -> Self {
        Self {
            _thread_bound: PhantomData,
        }
    }
}

impl FpEnvironment for HostFpEnvironment {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[allow(deprecated)]
    fn read_csr(&self) -> Option<u32> {
        #[cfg(target_arch = "x86")]
        use std::arch::x86::_mm_getcsr;
        #[cfg(target_arch = "x86_64")]
        use std::arch::x86_64::_mm_getcsr;

        // SAFETY: stmxcsr has no preconditions on SSE-capable targets.
        Some(unsafe { _mm_getcsr() })
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn read_csr(&self) -> Option<u32> {
        None
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[allow(deprecated)]
    fn write_csr(&mut self, value: u32) {
        #[cfg(target_arch = "x86")]
        use std::arch::x86::_mm_setcsr;
        #[cfg(target_arch = "x86_64")]
        use std::arch::x86_64::_mm_setcsr;

        // SAFETY: callers only flip DAZ/FTZ on a value read from the register.
        unsafe { _mm_setcsr(value) }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn write_csr(&mut self, _value: u32) {}

    #[cfg(all(target_arch = "x86", target_env = "msvc"))]
    fn read_control_word(&self) -> Option<u16> {
        let mut cw: u16 = 0;
        // SAFETY: fnstcw stores two bytes to a valid local.
        unsafe {
            std::arch::asm!(
                "fnstcw word ptr [{0}]",
                in(reg) &mut cw as *mut u16,
                options(nostack, preserves_flags)
            );
        }
        Some(cw)
    }

    #[cfg(all(target_arch = "x86", target_env = "msvc"))]
    fn write_control_word(&mut self, value: u16) {
        // SAFETY: fldcw reads two bytes from a valid local; fclex first so a
        // pending exception is not raised by the load.
        unsafe {
            std::arch::asm!(
                "fclex",
                "fldcw word ptr [{0}]",
                in(reg) &value as *const u16,
                options(nostack)
            );
        }
    }
}

/// Software register. Counts writes so tests can prove a call was a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedFpEnvironment {
    csr: Option<u32>,
    control_word: Option<u16>,
    csr_writes: usize,
}

impl Default for SimulatedFpEnvironment {
    fn default() -> Self {
        Self::with_csr(MXCSR_DEFAULT)
    }
}

impl SimulatedFpEnvironment {
    pub fn with_csr(csr: u32) -> Self {
        Self {
            csr: Some(csr),
            control_word: None,
            csr_writes: 0,
        }
    }

    /// A target with neither MXCSR nor an x87 control word.
    pub fn unavailable() -> Self {
        Self {
            csr: None,
            control_word: None,
            csr_writes: 0,
        }
    }

    pub fn with_control_word(mut self, cw: u16) -> Self {
        self.control_word = Some(cw);
        self
    }

    pub fn csr(&self) -> Option<u32> {
        self.csr
    }

    pub fn control_word(&self) -> Option<u16> {
        self.control_word
    }

    pub fn csr_writes(&self) -> usize {
        self.csr_writes
    }
}

impl FpEnvironment for SimulatedFpEnvironment {
    fn read_csr(&self) -> Option<u32> {
        self.csr
    }

    fn write_csr(&mut self, value: u32) {
        if self.csr.is_some() {
            self.csr = Some(value);
            self.csr_writes += 1;
        }
    }

    fn read_control_word(&self) -> Option<u16> {
        self.control_word
    }

    fn write_control_word(&mut self, value: u16) {
        if self.control_word.is_some() {
            self.control_word = Some(value);
        }
    }
}
