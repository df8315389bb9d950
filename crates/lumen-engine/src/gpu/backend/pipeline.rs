//! Render pipelines built on demand from the state at draw time.
//!
//! WGSL bindings are static, so a texture bound to slot `n` is exposed at
//! `@group(0) @binding(2n)` with its sampler at `@binding(2n + 1)`.

use crate::gpu::types::{VertexAttribute, VertexFormat};

/// How a bound texture is declared in the bind group layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum SlotKind {
    Filtering,
    NonFiltering,
    Depth,
}

impl SlotKind {
    fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            SlotKind::Filtering => wgpu::TextureSampleType::Float { filterable: true },
            SlotKind::NonFiltering => wgpu::TextureSampleType::Float { filterable: false },
            SlotKind::Depth => wgpu::TextureSampleType::Depth,
        }
    }

    fn sampler_type(self) -> wgpu::SamplerBindingType {
        match self {
            SlotKind::Filtering => wgpu::SamplerBindingType::Filtering,
            SlotKind::NonFiltering | SlotKind::Depth => wgpu::SamplerBindingType::NonFiltering,
        }
    }
}

/// Everything a pipeline depends on besides the program's shader modules.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
    pub slots: Vec<(u32, SlotKind)>,
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
    pub depth_test: bool,
    pub face_culling: bool,
}

pub(super) fn texture_binding(slot: u32) -> u32 {
    slot * 2
}

pub(super) fn sampler_binding(slot: u32) -> u32 {
    slot * 2 + 1
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub(super) fn bind_group_layout(device: &wgpu::Device, slots: &[(u32, SlotKind)]) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
        .iter()
        .flat_map(|(slot, kind)| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: texture_binding(*slot),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: kind.sample_type(),
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: sampler_binding(*slot),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(kind.sampler_type()),
                    count: None,
                },
            ]
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("lumen texture bgl"),
        entries: &entries,
    })
}

pub(super) fn build(
    device: &wgpu::Device,
    key: &PipelineKey,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let bgl = (!key.slots.is_empty()).then(|| bind_group_layout(device, &key.slots));
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = bgl.iter().collect();

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("lumen pipeline layout"),
        bind_group_layouts: &bind_group_layouts,
        immediate_size: 0,
    });

    let attributes: Vec<wgpu::VertexAttribute> = key
        .attributes
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: vertex_format(a.format),
            offset: a.offset,
            shader_location: a.location,
        })
        .collect();

    let vertex_buffers = [wgpu::VertexBufferLayout {
        array_stride: key.stride,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color_formats
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: key.depth_test,
        depth_compare: if key.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen pipeline"),
        layout: Some(&pipeline_layout),

        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &vertex_buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.face_culling.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },

        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_map_to_interleaved_bindings() {
        assert_eq!((texture_binding(0), sampler_binding(0)), (0, 1));
        assert_eq!((texture_binding(2), sampler_binding(2)), (4, 5));
    }

    #[test]
    fn depth_slots_sample_without_filtering() {
        assert_eq!(SlotKind::Depth.sample_type(), wgpu::TextureSampleType::Depth);
        assert_eq!(
            SlotKind::Depth.sampler_type(),
            wgpu::SamplerBindingType::NonFiltering
        );
    }
}
