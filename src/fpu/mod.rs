pub mod register;
pub mod controller;

pub use controller::{FpMode, FpuController, ModeChange};
pub use register::{FpEnvironment, HostFpEnvironment, SimulatedFpEnvironment};
