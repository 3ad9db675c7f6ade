pub mod cpu;
pub mod fpu;
pub mod setup;
