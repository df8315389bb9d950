use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::device::GraphicsDevice;

/// Shared, single-threaded reference to the active [`GraphicsDevice`].
///
/// Every resource wrapper keeps one so it can release its object on drop.
#[derive(Clone)]
pub struct GpuContext {
    device: Rc<dyn GraphicsDevice>,
}

impl GpuContext {
    pub fn new<D>(device: D) -> Self
    where
        D: GraphicsDevice + 'static,
    {
        Self { device: Rc::new(device) }
    }

    /// Wraps an already shared device, keeping the caller's typed reference usable.
    pub fn from_rc(device: Rc<dyn GraphicsDevice>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// True when both contexts drive the same device.
    pub fn same_device(&self, other: &GpuContext) -> bool {
        Rc::ptr_eq(&self.device, &other.device)
    }
}

impl Deref for GpuContext {
    type Target = dyn GraphicsDevice;

    fn deref(&self) -> &Self::Target {
        self.device.as_ref()
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("refs", &Rc::strong_count(&self.device))
            .finish()
    }
}
