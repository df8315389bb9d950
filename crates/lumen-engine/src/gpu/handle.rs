use std::fmt;

use super::context::GpuContext;
use super::types::{RawHandle, ResourceKind};

/// Exclusive owner of one GPU-side object.
///
/// The object is created exactly once (in [`create`](Self::create) or by the device
/// call that produced it) and released exactly once, when the handle is dropped.
/// The type is neither `Clone` nor `Copy`: moving it transfers ownership and the
/// moved-from binding can no longer be used or dropped.
pub struct ResourceHandle {
    ctx: GpuContext,
    kind: ResourceKind,
    raw: RawHandle,
}

impl ResourceHandle {
    /// Creates a new object of `kind` on the context's device.
    pub fn create(ctx: &GpuContext, kind: ResourceKind) -> Self {
        let raw = ctx.create(kind);
        Self::adopt(ctx, kind, raw)
    }

    /// Takes ownership of an object the device already created.
    pub(crate) fn adopt(ctx: &GpuContext, kind: ResourceKind, raw: RawHandle) -> Self {
        log::trace!("acquired {} #{raw}", kind.as_str());
        Self {
            ctx: ctx.clone(),
            kind,
            raw,
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        log::trace!("releasing {} #{}", self.kind.as_str(), self.raw);
        self.ctx.release(self.kind, self.raw);
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::HeadlessDevice;

    fn headless() -> (Rc<HeadlessDevice>, GpuContext) {
        let device = Rc::new(HeadlessDevice::new());
        let ctx = GpuContext::from_rc(device.clone());
        (device, ctx)
    }

    #[test]
    fn drop_releases_exactly_once() {
        let (device, ctx) = headless();
        {
            let _handle = ResourceHandle::create(&ctx, ResourceKind::Texture);
            assert_eq!(device.stats().live(ResourceKind::Texture), 1);
        }
        let stats = device.stats();
        assert_eq!(stats.created(ResourceKind::Texture), 1);
        assert_eq!(stats.released(ResourceKind::Texture), 1);
        assert_eq!(stats.invalid_releases, 0);
    }

    #[test]
    fn moves_transfer_ownership_without_extra_release() {
        let (device, ctx) = headless();

        let first = ResourceHandle::create(&ctx, ResourceKind::Buffer);
        let raw = first.raw();
        let moved = first;
        let mut holder = vec![moved];
        let back = holder.pop().expect("handle was pushed");
        assert_eq!(back.raw(), raw);
        assert_eq!(device.stats().released(ResourceKind::Buffer), 0);

        drop(back);
        let stats = device.stats();
        assert_eq!(stats.created(ResourceKind::Buffer), 1);
        assert_eq!(stats.released(ResourceKind::Buffer), 1);
        assert_eq!(stats.invalid_releases, 0);
    }

    #[test]
    fn creations_balance_releases_across_kinds() {
        let (device, ctx) = headless();
        let handles: Vec<_> = ResourceKind::ALL
            .iter()
            .flat_map(|kind| (0..3).map(|_| ResourceHandle::create(&ctx, *kind)))
            .collect();
        let (keep, dropped): (Vec<_>, Vec<_>) =
            handles.into_iter().enumerate().partition(|(i, _)| i % 2 == 0);
        drop(dropped);
        drop(keep);

        let stats = device.stats();
        for kind in ResourceKind::ALL {
            assert_eq!(stats.created(kind), 3, "{kind:?}");
            assert_eq!(stats.released(kind), 3, "{kind:?}");
            assert_eq!(stats.live(kind), 0, "{kind:?}");
        }
        assert_eq!(stats.invalid_releases, 0);
    }
}
