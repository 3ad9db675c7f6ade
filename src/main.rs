use cpu_env::cpu::{CpuCaps, FeatureDetector};
use cpu_env::fpu::{FpuController, HostFpEnvironment};
use cpu_env::setup::diagnostics::Diagnostics;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== CPU Environment Demo ===");

    // 1. Detect
    println!("\n[1] Detecting processor capabilities...");
    let detector = FeatureDetector::host();
    let caps = detector.processor_capabilities();
    println!("    Vendor: {}", detector.vendor().unwrap_or_else(|| "unknown".to_string()));
    println!("    Capabilities: {:?}", caps);
    println!("    SSE3 path: {}", caps.contains(CpuCaps::SSE3));

    // 2. Configure this thread
    println!("\n[2] Configuring floating-point environment...");
    let controller = FpuController::new(&detector);
    let mut env = HostFpEnvironment::current();
    println!("    DAZ: {:?}", controller.set_daz(&mut env, true));
    println!("    FTZ: {:?}", controller.set_ftz(&mut env, true));
    println!("    Precision: {:?}", controller.set_precision(&mut env));

    // 3. Read back
    println!("\n[3] Reading back...");
    match Diagnostics::fpu_state(&env) {
        Some(state) => println!(
            "    MXCSR={:#06x} DAZ={} FTZ={}",
            state.mxcsr, state.daz_enabled, state.ftz_enabled
        ),
        None => println!("    No floating-point control register on this target."),
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
