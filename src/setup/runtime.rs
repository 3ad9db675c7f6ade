use tracing::{debug, info};

use crate::cpu::features::FeatureDetector;
use crate::fpu::register::HostFpEnvironment;
use crate::setup::config::{FpuConfig, FpuReport};

pub struct RuntimeConfig;

impl RuntimeConfig {
    /// Apply `config` to the calling thread's floating-point registers.
    pub fn configure_current_thread(config: &FpuConfig) -> FpuReport {
        let detector = FeatureDetector::host();
        let mut env = HostFpEnvironment::current();
        config.apply(&detector, &mut env)
    }

    /// Configure Rayon's global pool so every worker starts with `config`
    /// applied. The control register is per-thread, so setting it on the
    /// caller alone does not reach the workers.
    pub fn init_rayon_pool(
        config: FpuConfig,
        num_threads: Option<usize>,
    ) -> Result<(), rayon::ThreadPoolBuildError> {
        let mut builder = rayon::ThreadPoolBuilder::new().start_handler(move |thread_id| {
            let report = Self::configure_current_thread(&config);
            debug!(thread_id, ?report, "worker floating-point environment configured");
        });
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        builder.build_global()?;
        info!(threads = rayon::current_num_threads(), "rayon pool configured");
        Ok(())
    }

    /// Local pool variant, for callers that must not touch the global pool.
    pub fn build_rayon_pool(
        config: FpuConfig,
        num_threads: usize,
    ) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .start_handler(move |_| {
                Self::configure_current_thread(&config);
            })
            .build()
    }
}
