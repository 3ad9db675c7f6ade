use serde::Serialize;

use crate::fpu::register::{FpEnvironment, MXCSR_DAZ, MXCSR_FTZ};
use crate::setup::config::FpuConfig;

/// Snapshot of the denormal flags on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FpuState {
    pub mxcsr: u32,
    pub daz_enabled: bool,
    pub ftz_enabled: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum EnvStatus {
    Configured,
    Drifted(String),
    Unavailable,
}

pub struct Diagnostics;

impl Diagnostics {
    pub fn fpu_state<E: FpEnvironment>(env: &E) -> Option<FpuState> {
        let mxcsr = env.read_csr()?;
        Some(FpuState {
            mxcsr,
            daz_enabled: mxcsr & MXCSR_DAZ == MXCSR_DAZ,
            ftz_enabled: mxcsr & MXCSR_FTZ == MXCSR_FTZ,
        })
    }

    /// Compare the live register against `config`.
    /// DAZ is only checked when `daz_supported`, since it can't be set otherwise.
    pub fn check_environment<E: FpEnvironment>(
        env: &E,
        config: &FpuConfig,
        daz_supported: bool,
    ) -> EnvStatus {
        let Some(state) = Self::fpu_state(env) else {
            return EnvStatus::Unavailable;
        };

        if state.ftz_enabled != config.flush_to_zero {
            return EnvStatus::Drifted(format!(
                "Flush-To-Zero is {}, expected {}",
                on_off(state.ftz_enabled),
                on_off(config.flush_to_zero)
            ));
        }
        if daz_supported && state.daz_enabled != config.denormals_are_zero {
            return EnvStatus::Drifted(format!(
                "Denormals-Are-Zero is {}, expected {}",
                on_off(state.daz_enabled),
                on_off(config.denormals_are_zero)
            ));
        }

        EnvStatus::Configured
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
