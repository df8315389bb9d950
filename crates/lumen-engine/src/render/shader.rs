use crate::gpu::{GpuContext, ResourceHandle, ResourceKind, ShaderError};

/// A linked vertex + fragment program.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ResourceHandle,
}

impl ShaderProgram {
    /// Compiles and links both stages. Entry points are `vs_main` and `fs_main`.
    pub fn new(ctx: &GpuContext, vertex: &str, fragment: &str) -> Result<Self, ShaderError> {
        let raw = ctx.create_program(vertex, fragment)?;
        Ok(Self {
            handle: ResourceHandle::adopt(ctx, ResourceKind::Program, raw),
        })
    }

    pub fn use_program(&self) {
        self.handle.context().use_program(Some(self.handle.raw()));
    }

    /// Sets an integer uniform; unknown names are ignored by the device.
    pub fn send_uniform_int(&self, name: &str, value: i32) {
        self.handle
            .context()
            .uniform_int(self.handle.raw(), name, value);
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{HeadlessDevice, ShaderStage};

    #[test]
    fn failed_compilation_creates_nothing() {
        let (device, ctx) = HeadlessDevice::with_context();
        let err = ShaderProgram::new(&ctx, "fn vs_main() {}", "").unwrap_err();

        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
        assert_eq!(device.stats().created(ResourceKind::Program), 0);
    }

    #[test]
    fn uniforms_are_kept_per_program() {
        let (device, ctx) = HeadlessDevice::with_context();
        let program = ShaderProgram::new(&ctx, "vs", "fs").unwrap();
        program.send_uniform_int("uniSceneBuffers.color", 1);

        assert_eq!(device.uniform(program.handle().raw(), "uniSceneBuffers.color"), Some(1));

        drop(program);
        assert_eq!(device.stats().live(ResourceKind::Program), 0);
    }
}
