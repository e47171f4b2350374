//! Background plane sources and the texture they are streamed into.

use std::path::Path;

use log::{debug, info, warn};

use crate::error::{SceneError, SceneResult};

/// Largest edge a still image keeps; wgpu's default 2D texture limit.
pub const MAX_STILL_DIMENSION: u32 = 8192;

/// One RGBA8 image from a background source.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Bumped whenever the pixels change; equal generations need no re-upload.
    pub generation: u64,
}

impl Frame {
    fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

fn check_texture_size(width: u32, height: u32, max_dimension: u32) -> SceneResult<()> {
    if width > max_dimension || height > max_dimension {
        return Err(SceneError::MalformedParameter(format!(
            "background frame {}x{} exceeds the device texture limit of {}",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// Scales `image` down so neither edge exceeds `max_dimension`, keeping its aspect.
fn fit_within(image: image::RgbaImage, max_dimension: u32) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    warn!(
        "Background image {}x{} is larger than {}, scaling to {}x{}",
        width, height, max_dimension, new_width, new_height
    );
    image::imageops::resize(&image, new_width, new_height, image::imageops::FilterType::Triangle)
}

/// A source of background frames, polled once per rendered frame.
pub trait FrameSource {
    fn is_ready(&mut self, now: f64) -> bool;

    /// Fails with [`SceneError::ResourceNotReady`] when called before the
    /// source is ready.
    fn current_frame(&mut self, now: f64) -> SceneResult<&Frame>;

    fn describe(&self) -> String;
}

pub struct StillImageFeed {
    frame: Frame,
    name: String,
}

impl StillImageFeed {
    pub fn open(path: &Path) -> SceneResult<Self> {
        let image = image::open(path)?.to_rgba8();
        info!(
            "Loaded background image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Self::from_rgba(image, path.display().to_string())
    }

    pub fn from_rgba(image: image::RgbaImage, name: String) -> SceneResult<Self> {
        let image = fit_within(image, MAX_STILL_DIMENSION);
        let frame = Frame {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
            generation: 1,
        };
        if !frame.is_consistent() {
            return Err(SceneError::Config(format!("background image {} is empty", name)));
        }
        Ok(Self { frame, name })
    }
}

impl FrameSource for StillImageFeed {
    fn is_ready(&mut self, _now: f64) -> bool {
        true
    }

    fn current_frame(&mut self, _now: f64) -> SceneResult<&Frame> {
        Ok(&self.frame)
    }

    fn describe(&self) -> String {
        format!("image {}", self.name)
    }
}

/// Procedural moving checkerboard standing in for a live camera feed.
///
/// Like a camera it needs a moment before the first frame is available, and
/// it only produces a new frame at its own rate.
pub struct TestPatternFeed {
    width: u32,
    height: u32,
    cell: u32,
    rate: f64,
    warmup: f64,
    started: Option<f64>,
    frame: Frame,
}

impl TestPatternFeed {
    pub const DEFAULT_WARMUP: f64 = 0.5;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            cell: 32,
            rate: 30.0,
            warmup: Self::DEFAULT_WARMUP,
            started: None,
            frame: Frame {
                width: 0,
                height: 0,
                rgba: Vec::new(),
                generation: 0,
            },
        }
    }

    pub fn with_warmup(mut self, warmup: f64) -> Self {
        self.warmup = warmup.max(0.0);
        self
    }

    fn tick(&self, now: f64) -> u64 {
        let start = self.started.unwrap_or(now);
        ((now - start).max(0.0) * self.rate) as u64
    }

    fn render(&mut self, tick: u64) {
        let (w, h, cell) = (self.width, self.height, self.cell);
        let shift = (tick % (cell as u64 * 2)) as u32;

        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let light = ((x + shift) / cell + y / cell) % 2 == 0;
                let level = if light { 200 } else { 40 };
                let blue = (255 * y / h) as u8;
                rgba.extend_from_slice(&[level, level, blue, 255]);
            }
        }

        self.frame = Frame {
            width: w,
            height: h,
            rgba,
            generation: tick + 1,
        };
    }
}

impl FrameSource for TestPatternFeed {
    fn is_ready(&mut self, now: f64) -> bool {
        let start = *self.started.get_or_insert(now);
        now - start >= self.warmup
    }

    fn current_frame(&mut self, now: f64) -> SceneResult<&Frame> {
        if !self.is_ready(now) {
            return Err(SceneError::ResourceNotReady("test pattern feed"));
        }

        let tick = self.tick(now);
        if self.frame.generation != tick + 1 {
            self.render(tick);
        }
        Ok(&self.frame)
    }

    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}

/// GPU side of the background plane. Starts as a 1x1 placeholder so the
/// texture bind group is always valid.
pub struct BackgroundTexture {
    texture: wgpu::Texture,
    sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
    size: (u32, u32),
    uploaded: Option<u64>,
}

impl BackgroundTexture {
    pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Background Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Background Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture = Self::create_texture(device, 1, 1);
        Self::write(queue, &texture, 1, 1, &[0, 0, 0, 255]);
        let bind_group = Self::create_bind_group(device, layout, &texture, &sampler);

        Self {
            texture,
            sampler,
            bind_group,
            size: (1, 1),
            uploaded: None,
        }
    }

    fn create_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Background Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        texture: &wgpu::Texture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Background Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn write(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, rgba: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Uploads `frame` unless it is the one already on the GPU. The texture is
    /// re-created when the frame size changes.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        frame: &Frame,
    ) -> SceneResult<()> {
        if !frame.is_consistent() {
            return Err(SceneError::MalformedParameter(format!(
                "background frame {}x{} carries {} bytes",
                frame.width,
                frame.height,
                frame.rgba.len()
            )));
        }
        check_texture_size(
            frame.width,
            frame.height,
            device.limits().max_texture_dimension_2d,
        )?;
        if self.uploaded == Some(frame.generation) && self.size == (frame.width, frame.height) {
            return Ok(());
        }

        if self.size != (frame.width, frame.height) {
            debug!(
                "Re-creating background texture: {}x{} -> {}x{}",
                self.size.0, self.size.1, frame.width, frame.height
            );
            self.texture = Self::create_texture(device, frame.width, frame.height);
            self.bind_group = Self::create_bind_group(device, layout, &self.texture, &self.sampler);
            self.size = (frame.width, frame.height);
        }

        Self::write(queue, &self.texture, frame.width, frame.height, &frame.rgba);
        self.uploaded = Some(frame.generation);
        Ok(())
    }
}
