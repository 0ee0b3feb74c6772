/// Frame synchronization contract with the compute queue

use crate::error::Result;

/// Fences the material manager may wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceFlag {
    /// Compute work recorded for the previous frame is still executing
    ComputeInFlight,
    /// Graphics work of the current frame slot is still executing
    RenderInFlight,
}

/// Blocks the CPU until GPU work guarded by a fence completes
pub trait FrameSynchronizer: Send + Sync {
    /// Wait for `fence` of the current frame slot
    fn wait(&mut self, fence: FenceFlag) -> Result<()>;
}
