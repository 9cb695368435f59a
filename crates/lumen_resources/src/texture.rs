use std::path::Path;

use lumen_core::errors::{LumenError, Result};
use lumen_core::rhi::{Device, Extent2D, Format, Image, ImageDesc, ImageUsage, Sampler, SamplerDesc};

use crate::handle::Handle;
use crate::image_io;
use crate::kind::ResourceKind;

/// 8-bit image with 1 to 4 interleaved channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * usize::from(self.channels)
    }

    /// Solid RGBA8 image.
    #[must_use]
    pub fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            channels: 4,
            pixels: rgba.repeat(width as usize * height as usize),
        }
    }

    fn into_rgba8(self) -> Self {
        if self.channels == 4 {
            let len = self.expected_len();
            let mut pixels = self.pixels;
            pixels.truncate(len);
            return Self { pixels, ..self };
        }
        let texels = self.width as usize * self.height as usize;
        let stride = usize::from(self.channels);
        let mut rgba = Vec::with_capacity(texels * 4);
        for texel in self.pixels.chunks_exact(stride).take(texels) {
            let pixel = match texel {
                [l] => [*l, *l, *l, 255],
                [r, g] => [*r, *g, 0, 255],
                [r, g, b] => [*r, *g, *b, 255],
                _ => [0, 0, 0, 255],
            };
            rgba.extend_from_slice(&pixel);
        }
        Self {
            width: self.width,
            height: self.height,
            channels: 4,
            pixels: rgba,
        }
    }
}

/// GPU form of a texture: a sampled image and its sampler.
#[derive(Debug)]
pub struct TextureGpu {
    pub image: Image,
    pub sampler: Sampler,
}

#[derive(Clone, Debug)]
pub struct TextureOptions {
    /// Sample the texture as sRGB-encoded color.
    pub use_srgb: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self { use_srgb: true }
    }
}

/// Resource kind for [`ImageData`]; stored as RGBA8 after normalization.
pub struct TextureKind;

pub type TextureHandle = Handle<TextureKind>;

impl ResourceKind for TextureKind {
    type Cpu = ImageData;
    type Gpu = TextureGpu;
    type Options = TextureOptions;

    const NAME: &'static str = "texture";

    fn validate_cpu(cpu: &ImageData) -> Result<()> {
        if cpu.width == 0 || cpu.height == 0 {
            return Err(LumenError::invalid_argument(format!(
                "texture size {}x{} must be non-zero",
                cpu.width, cpu.height
            )));
        }
        if !(1..=4).contains(&cpu.channels) {
            return Err(LumenError::invalid_argument(format!(
                "texture channel count {} must be within 1..=4",
                cpu.channels
            )));
        }
        if cpu.pixels.len() < cpu.expected_len() {
            return Err(LumenError::invalid_argument(format!(
                "texture has {} bytes, expected at least {}",
                cpu.pixels.len(),
                cpu.expected_len()
            )));
        }
        Ok(())
    }

    fn normalize_cpu(cpu: ImageData, _options: &TextureOptions) -> Result<ImageData> {
        Ok(cpu.into_rgba8())
    }

    fn load_from_path(abs_path: &Path, _options: &TextureOptions) -> Result<ImageData> {
        image_io::load_image(abs_path)
    }

    fn save_to_path(cpu: &ImageData, abs_path: &Path) -> Result<()> {
        image_io::save_image(cpu, abs_path)
    }

    fn upload_to_gpu(device: &dyn Device, cpu: &ImageData, options: &TextureOptions) -> Result<TextureGpu> {
        let format = if options.use_srgb {
            Format::Rgba8Srgb
        } else {
            Format::Rgba8Unorm
        };
        let image = device.create_image(&ImageDesc {
            label: "texture".into(),
            extent: Extent2D::new(cpu.width, cpu.height),
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
        })?;
        device.write_image(image.id(), &cpu.pixels)?;
        let sampler = device.create_sampler(&SamplerDesc {
            label: "texture.sampler".into(),
        })?;
        Ok(TextureGpu { image, sampler })
    }
}
