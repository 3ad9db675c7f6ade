//! FPU Environment Controller
//! Toggles denormal handling (DAZ/FTZ) and x87 precision through an
//! explicit environment handle.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cpu::features::FeatureDetector;
use crate::cpu::leaf::LeafProbe;
use crate::cpu::platform::PlatformFeatures;
use crate::fpu::register::{FpEnvironment, MXCSR_DAZ, MXCSR_FTZ, X87_PC_64, X87_PC_MASK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpMode {
    DenormalsAreZero,
    FlushToZero,
}

impl FpMode {
    pub fn bit(self) -> u32 {
        match self {
            FpMode::DenormalsAreZero => MXCSR_DAZ,
            FpMode::FlushToZero => MXCSR_FTZ,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FpMode::DenormalsAreZero => "Denormals-Are-Zero",
            FpMode::FlushToZero => "Flush-To-Zero",
        }
    }
}

/// What a setter did. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeChange {
    Enabled,
    Disabled,
    AlreadyEnabled,
    AlreadyDisabled,
    /// The CPU lacks the feature; register untouched.
    Unsupported,
    /// No register to touch on this target.
    Unavailable,
}

impl ModeChange {
    /// True if the register was written.
    pub fn wrote_register(self) -> bool {
        matches!(self, ModeChange::Enabled | ModeChange::Disabled)
    }
}

#[derive(Debug)]
pub struct FpuController<'a, P, S> {
    detector: &'a FeatureDetector<P, S>,
}

impl<'a, P: LeafProbe, S: PlatformFeatures> FpuController<'a, P, S> {
    pub fn new(detector: &'a FeatureDetector<P, S>) -> Self {
        Self { detector }
    }

    /// DAZ/FTZ control only exists alongside the query instruction.
    fn csr_available<E: FpEnvironment>(&self, env: &E) -> bool {
        self.detector.probe().is_available() && env.read_csr().is_some()
    }

    /// Denormals-are-zero. Requires FXSAVE support.
    pub fn set_daz<E: FpEnvironment>(&self, env: &mut E, enable: bool) -> ModeChange {
        if !self.csr_available(env) {
            return ModeChange::Unavailable;
        }
        if !self.detector.has_daz_support() {
            info!("this CPU doesn't support Denormals-Are-Zero");
            return ModeChange::Unsupported;
        }
        toggle_csr_flag(env, FpMode::DenormalsAreZero, enable)
    }

    pub fn set_ftz<E: FpEnvironment>(&self, env: &mut E, enable: bool) -> ModeChange {
        if !self.csr_available(env) {
            return ModeChange::Unavailable;
        }
        toggle_csr_flag(env, FpMode::FlushToZero, enable)
    }

    /// Forces 64-bit x87 intermediate precision where the control word is
    /// software controlled; `Unavailable` everywhere else.
    pub fn set_precision<E: FpEnvironment>(&self, env: &mut E) -> ModeChange {
        let Some(cw) = env.read_control_word() else {
            return ModeChange::Unavailable;
        };
        if cw & X87_PC_MASK == X87_PC_64 {
            info!("64-bit x87 precision is already enabled");
            return ModeChange::AlreadyEnabled;
        }
        info!(control_word = cw, "enabling 64-bit x87 precision");
        env.write_control_word((cw & !X87_PC_MASK) | X87_PC_64);
        ModeChange::Enabled
    }
}

fn toggle_csr_flag<E: FpEnvironment>(env: &mut E, mode: FpMode, enable: bool) -> ModeChange {
    let Some(mut csr) = env.read_csr() else {
        return ModeChange::Unavailable;
    };
    let flag = mode.bit();
    let is_set = csr & flag == flag;

    if enable && is_set {
        info!("{} mode is already enabled", mode.name());
        return ModeChange::AlreadyEnabled;
    }
    if !enable && !is_set {
        info!("{} mode is already disabled", mode.name());
        return ModeChange::AlreadyDisabled;
    }

    let change = if enable {
        info!(mxcsr = csr, "enabling {} mode", mode.name());
        csr |= flag;
        ModeChange::Enabled
    } else {
        info!(mxcsr = csr, "disabling {} mode", mode.name());
        csr &= !flag;
        ModeChange::Disabled
    };
    env.write_csr(csr);
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::leaf::{FixedLeafProbe, ProbeProvider, RawLeaf};
    use crate::cpu::platform::StaticPlatform;
    use crate::fpu::register::{SimulatedFpEnvironment, MXCSR_DEFAULT};

    const D_FXSAVE: u32 = 1 << 24;
    const C_SSE3: u32 = 1 << 0;

    fn detector(leaf0_a: u32, leaf1_d: u32) -> FeatureDetector<FixedLeafProbe, StaticPlatform> {
        let probe = FixedLeafProbe::new()
            .with_leaf(0, RawLeaf::new(leaf0_a, 0, 0, 0))
            .with_leaf(1, RawLeaf::new(0, 0, C_SSE3, leaf1_d));
        FeatureDetector::new(probe, StaticPlatform::default())
    }

    #[test]
    fn test_daz_sets_exactly_one_bit() {
        let det = detector(5, D_FXSAVE);
        let ctl = FpuController::new(&det);
        let mut env = SimulatedFpEnvironment::with_csr(MXCSR_DEFAULT);

        assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Enabled);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT | MXCSR_DAZ));

        // Second call changes nothing further.
        assert_eq!(ctl.set_daz(&mut env, true), ModeChange::AlreadyEnabled);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT | MXCSR_DAZ));
        assert_eq!(env.csr_writes(), 1);
    }

    #[test]
    fn test_daz_roundtrip_restores_register() {
        let det = detector(1, D_FXSAVE);
        let ctl = FpuController::new(&det);
        // Reserved and unrelated bits set, FTZ on.
        let initial = 0xffff_0000 | MXCSR_FTZ | 0x1f80 | 0x3f;
        let mut env = SimulatedFpEnvironment::with_csr(initial);

        assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Enabled);
        assert_eq!(ctl.set_daz(&mut env, false), ModeChange::Disabled);
        assert_eq!(env.csr(), Some(initial));
    }

    #[test]
    fn test_daz_unsupported_never_writes() {
        let det = detector(5, 0);
        let ctl = FpuController::new(&det);

        for initial in [MXCSR_DEFAULT, MXCSR_DEFAULT | MXCSR_DAZ] {
            let mut env = SimulatedFpEnvironment::with_csr(initial);
            assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Unsupported);
            assert_eq!(ctl.set_daz(&mut env, false), ModeChange::Unsupported);
            assert_eq!(env.csr(), Some(initial));
            assert_eq!(env.csr_writes(), 0);
        }
    }

    #[test]
    fn test_daz_max_leaf_zero_is_noop() {
        let det = detector(0, D_FXSAVE);
        let ctl = FpuController::new(&det);
        let mut env = SimulatedFpEnvironment::default();

        assert!(!det.has_sse3());
        assert!(!det.has_daz_support());
        assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Unsupported);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT));
    }

    #[test]
    fn test_ftz_has_no_support_precondition() {
        let det = detector(0, 0);
        let ctl = FpuController::new(&det);
        let mut env = SimulatedFpEnvironment::default();

        assert_eq!(ctl.set_ftz(&mut env, false), ModeChange::AlreadyDisabled);
        assert_eq!(ctl.set_ftz(&mut env, true), ModeChange::Enabled);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT | MXCSR_FTZ));
        assert_eq!(ctl.set_ftz(&mut env, false), ModeChange::Disabled);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT));
    }

    #[test]
    fn test_flags_do_not_disturb_each_other() {
        let det = detector(1, D_FXSAVE);
        let ctl = FpuController::new(&det);
        let mut env = SimulatedFpEnvironment::default();

        ctl.set_ftz(&mut env, true);
        ctl.set_daz(&mut env, true);
        ctl.set_ftz(&mut env, false);
        assert_eq!(env.csr(), Some(MXCSR_DEFAULT | MXCSR_DAZ));
    }

    #[test]
    fn test_unavailable_register_is_silent_noop() {
        let det = detector(1, D_FXSAVE);
        let ctl = FpuController::new(&det);
        let mut env = SimulatedFpEnvironment::unavailable();

        assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Unavailable);
        assert_eq!(ctl.set_ftz(&mut env, true), ModeChange::Unavailable);
        assert_eq!(ctl.set_precision(&mut env), ModeChange::Unavailable);
        assert_eq!(env.csr_writes(), 0);
    }

    #[test]
    fn test_no_query_instruction_is_silent_noop() {
        let det = FeatureDetector::new(ProbeProvider::Unavailable, StaticPlatform::default());
        let ctl = FpuController::new(&det);

        for initial in [MXCSR_DEFAULT, MXCSR_DEFAULT | MXCSR_DAZ | MXCSR_FTZ] {
            let mut env = SimulatedFpEnvironment::with_csr(initial);
            assert_eq!(ctl.set_daz(&mut env, true), ModeChange::Unavailable);
            assert_eq!(ctl.set_ftz(&mut env, true), ModeChange::Unavailable);
            assert_eq!(ctl.set_daz(&mut env, false), ModeChange::Unavailable);
            assert_eq!(ctl.set_ftz(&mut env, false), ModeChange::Unavailable);
            assert_eq!(env.csr(), Some(initial));
            assert_eq!(env.csr_writes(), 0);
        }
    }

    #[test]
    fn test_precision_sets_pc_field_only() {
        let det = detector(1, D_FXSAVE);
        let ctl = FpuController::new(&det);
        // 53-bit precision, everything else default.
        let mut env = SimulatedFpEnvironment::default().with_control_word(0x027f);

        assert_eq!(ctl.set_precision(&mut env), ModeChange::Enabled);
        assert_eq!(env.control_word(), Some(0x037f));
        assert_eq!(ctl.set_precision(&mut env), ModeChange::AlreadyEnabled);
        assert_eq!(env.csr_writes(), 0);
    }

    #[test]
    fn test_mode_change_wrote_register() {
        assert!(ModeChange::Enabled.wrote_register());
        assert!(ModeChange::Disabled.wrote_register());
        assert!(!ModeChange::AlreadyEnabled.wrote_register());
        assert!(!ModeChange::Unsupported.wrote_register());
    }
}
