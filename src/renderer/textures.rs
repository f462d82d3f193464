use std::collections::HashMap;
use std::sync::Arc;

/// Side length of the solid-magenta placeholder substituted for pages that
/// fail to decode.
pub const PLACEHOLDER_SIZE: u32 = 4;

pub struct PageTexture {
    pub view: Arc<wgpu::TextureView>,
    pub size: (u32, u32),
    pub placeholder: bool,
}

/// Atlas page to GPU texture cache. Pages are decoded and uploaded on first
/// use; a decode failure substitutes the magenta placeholder so broken pages
/// are visible in the output rather than silently blank.
#[derive(Default)]
pub struct TextureStore {
    cache: HashMap<Arc<str>, PageTexture>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the page's texture view, loading it on first use.
    pub fn page_view(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        page: &Arc<str>,
    ) -> Arc<wgpu::TextureView> {
        if let Some(entry) = self.cache.get(page) {
            return Arc::clone(&entry.view);
        }
        let (rgba, width, height, placeholder) = match load_rgba(page.as_ref()) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                (image.into_raw(), width, height, false)
            }
            Err(err) => {
                eprintln!("[textures] failed to load page '{page}': {err:#}; using placeholder");
                (magenta_pixels(PLACEHOLDER_SIZE), PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, true)
            }
        };
        let view = Arc::new(upload(device, queue, &rgba, width, height));
        self.cache.insert(
            Arc::clone(page),
            PageTexture { view: Arc::clone(&view), size: (width, height), placeholder },
        );
        view
    }

    pub fn page_size(&self, page: &str) -> Option<(u32, u32)> {
        self.cache.get(page).map(|entry| entry.size)
    }

    pub fn is_placeholder(&self, page: &str) -> Option<bool> {
        self.cache.get(page).map(|entry| entry.placeholder)
    }
}

fn load_rgba(path: &str) -> anyhow::Result<image::RgbaImage> {
    let bytes = std::fs::read(path)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

fn magenta_pixels(side: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((side * side * 4) as usize);
    for _ in 0..side * side {
        data.extend_from_slice(&[255, 0, 255, 255]);
    }
    data
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Atlas Page Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: super::TARGET_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
