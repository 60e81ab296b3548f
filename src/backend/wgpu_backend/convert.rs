//! Backend types to wgpu

use crate::backend::traits::*;
use crate::backend::types::*;

impl From<TextureFormat> for wgpu::TextureFormat {
    fn from(format: TextureFormat) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => Self::Rgba16Float,
            TextureFormat::Depth32Float => Self::Depth32Float,
        }
    }
}

/// Surface formats the renderer can present to
impl TryFrom<wgpu::TextureFormat> for TextureFormat {
    type Error = wgpu::TextureFormat;

    fn try_from(format: wgpu::TextureFormat) -> Result<Self, Self::Error> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Ok(Self::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Ok(Self::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8Unorm => Ok(Self::Bgra8Unorm),
            wgpu::TextureFormat::Bgra8UnormSrgb => Ok(Self::Bgra8UnormSrgb),
            other => Err(other),
        }
    }
}

impl From<BufferUsage> for wgpu::BufferUsages {
    fn from(usage: BufferUsage) -> Self {
        [
            (BufferUsage::COPY_DST, Self::COPY_DST),
            (BufferUsage::INDEX, Self::INDEX),
            (BufferUsage::VERTEX, Self::VERTEX),
            (BufferUsage::UNIFORM, Self::UNIFORM),
        ]
        .into_iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(Self::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl From<TextureUsage> for wgpu::TextureUsages {
    fn from(usage: TextureUsage) -> Self {
        [
            (TextureUsage::COPY_SRC, Self::COPY_SRC),
            (TextureUsage::COPY_DST, Self::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, Self::TEXTURE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, Self::RENDER_ATTACHMENT),
        ]
        .into_iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(Self::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl From<ShaderStageFlags> for wgpu::ShaderStages {
    fn from(stages: ShaderStageFlags) -> Self {
        let mut result = Self::empty();
        if stages.contains(ShaderStageFlags::VERTEX) {
            result |= Self::VERTEX;
        }
        if stages.contains(ShaderStageFlags::FRAGMENT) {
            result |= Self::FRAGMENT;
        }
        result
    }
}

impl From<VertexFormat> for wgpu::VertexFormat {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32x2 => Self::Float32x2,
            VertexFormat::Float32x3 => Self::Float32x3,
        }
    }
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(func: CompareFunction) -> Self {
        match func {
            CompareFunction::Never => Self::Never,
            CompareFunction::Less => Self::Less,
            CompareFunction::Equal => Self::Equal,
            CompareFunction::LessEqual => Self::LessEqual,
            CompareFunction::Greater => Self::Greater,
            CompareFunction::NotEqual => Self::NotEqual,
            CompareFunction::GreaterEqual => Self::GreaterEqual,
            CompareFunction::Always => Self::Always,
        }
    }
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Nearest => Self::Nearest,
            FilterMode::Linear => Self::Linear,
        }
    }
}

impl From<AddressMode> for wgpu::AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::ClampToEdge => Self::ClampToEdge,
            AddressMode::Repeat => Self::Repeat,
        }
    }
}

impl From<IndexFormat> for wgpu::IndexFormat {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => Self::Uint16,
            IndexFormat::Uint32 => Self::Uint32,
        }
    }
}

impl From<&BindingType> for wgpu::BindingType {
    fn from(ty: &BindingType) -> Self {
        match *ty {
            BindingType::UniformBuffer => Self::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingType::Texture { sample_type } => Self::Texture {
                sample_type: match sample_type {
                    TextureSampleType::Float { filterable } => {
                        wgpu::TextureSampleType::Float { filterable }
                    }
                    TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            BindingType::Sampler { comparison: true } => {
                Self::Sampler(wgpu::SamplerBindingType::Comparison)
            }
            BindingType::Sampler { comparison: false } => {
                Self::Sampler(wgpu::SamplerBindingType::Filtering)
            }
        }
    }
}

impl From<&BindGroupLayoutEntry> for wgpu::BindGroupLayoutEntry {
    fn from(entry: &BindGroupLayoutEntry) -> Self {
        Self {
            binding: entry.binding,
            visibility: entry.visibility.into(),
            ty: (&entry.ty).into(),
            count: None,
        }
    }
}

pub(super) fn primitive_state(front_face: FrontFace, cull_mode: CullMode) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: match front_face {
            FrontFace::Ccw => wgpu::FrontFace::Ccw,
            FrontFace::Cw => wgpu::FrontFace::Cw,
        },
        cull_mode: match cull_mode {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        ..Default::default()
    }
}

pub(super) fn color_ops(op: &LoadOp) -> wgpu::Operations<wgpu::Color> {
    let load = match op {
        LoadOp::Clear([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
            r: *r as f64,
            g: *g as f64,
            b: *b as f64,
            a: *a as f64,
        }),
        LoadOp::Load => wgpu::LoadOp::Load,
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}

pub(super) fn depth_ops(attachment: &DepthStencilAttachment) -> wgpu::Operations<f32> {
    let load = match attachment.depth_load_op {
        LoadOp::Clear(_) => wgpu::LoadOp::Clear(attachment.depth_clear_value),
        LoadOp::Load => wgpu::LoadOp::Load,
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}
