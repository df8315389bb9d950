use std::collections::BTreeMap;

use super::types::RawHandle;

/// Bind points of the handle state machine, shared by every device.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    pub array_buffer: Option<RawHandle>,
    pub element_buffer: Option<RawHandle>,
    pub vertex_array: Option<RawHandle>,
    pub active_slot: u32,
    pub texture_slots: BTreeMap<u32, RawHandle>,
    pub framebuffer: Option<RawHandle>,
    pub program: Option<RawHandle>,
}

impl Bindings {
    /// Texture bound to the active slot.
    pub fn texture(&self) -> Option<RawHandle> {
        self.texture_slots.get(&self.active_slot).copied()
    }

    pub fn bind_texture(&mut self, handle: Option<RawHandle>) {
        match handle {
            Some(h) => self.texture_slots.insert(self.active_slot, h),
            None => self.texture_slots.remove(&self.active_slot),
        };
    }

    /// Drops every binding to a released object.
    pub fn forget(&mut self, handle: RawHandle) {
        for slot in [
            &mut self.array_buffer,
            &mut self.element_buffer,
            &mut self.vertex_array,
            &mut self.framebuffer,
            &mut self.program,
        ] {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
        self.texture_slots.retain(|_, h| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn handle(id: u32) -> RawHandle {
        NonZeroU32::new(id).unwrap()
    }

    #[test]
    fn textures_bind_to_the_active_slot() {
        let mut b = Bindings::default();
        b.active_slot = 2;
        b.bind_texture(Some(handle(7)));
        assert_eq!(b.texture(), Some(handle(7)));
        b.active_slot = 0;
        assert_eq!(b.texture(), None);
    }

    #[test]
    fn forget_clears_every_bind_point() {
        let mut b = Bindings::default();
        b.program = Some(handle(3));
        b.texture_slots.insert(1, handle(3));
        b.texture_slots.insert(2, handle(4));
        b.forget(handle(3));
        assert_eq!(b.program, None);
        assert_eq!(b.texture_slots.len(), 1);
    }
}
