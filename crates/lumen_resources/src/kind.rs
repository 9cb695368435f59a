use std::path::Path;

use lumen_core::Result;
use lumen_core::rhi::Device;

/// Trait bundle describing one resource kind managed by
/// [`ResourceManager`](crate::ResourceManager).
///
/// `normalize_cpu` must be idempotent; the manager validates both before and
/// after normalizing.
pub trait ResourceKind: 'static {
    type Cpu: Send + 'static;
    type Gpu: Send + 'static;
    type Options: Clone + Default + Send + 'static;

    /// Short name used in logs and errors.
    const NAME: &'static str;

    fn validate_cpu(cpu: &Self::Cpu) -> Result<()>;

    fn normalize_cpu(cpu: Self::Cpu, options: &Self::Options) -> Result<Self::Cpu>;

    fn load_from_path(abs_path: &Path, options: &Self::Options) -> Result<Self::Cpu>;

    fn save_to_path(cpu: &Self::Cpu, abs_path: &Path) -> Result<()>;

    fn upload_to_gpu(device: &dyn Device, cpu: &Self::Cpu, options: &Self::Options) -> Result<Self::Gpu>;
}
