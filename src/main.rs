use anyhow::{Context, Result};
use marionette::cli::CliOptions;
use marionette::config::StageConfig;
use marionette::renderer::{GpuContext, StageRenderer, TARGET_FORMAT};
use marionette::Compositor;

fn main() {
    let options = match CliOptions::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<()> {
    let config = StageConfig::load_or_default(options.config.as_deref().unwrap_or("assets/stage.json"));
    let width = options.width.unwrap_or(800);
    let height = options.height.unwrap_or(600);
    let frames = options.frames.unwrap_or(120).max(1);

    let gpu = GpuContext::new_headless_blocking()?;
    let mut renderer = StageRenderer::new(&gpu, config.premultiplied_output);
    let mut compositor = Compositor::new(&config);
    eprintln!("[compositor] {} unit(s) loaded", compositor.registry().len());

    let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Stage Target"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    for _ in 0..frames {
        compositor.synchronize();
        compositor.render(&mut renderer, &view, (width, height))?;
    }

    if let Some(out) = options.out {
        let pixels = read_back(&gpu, &target, width, height)?;
        image::save_buffer(&out, &pixels, width, height, image::ExtendedColorType::Rgba8)
            .with_context(|| format!("failed to write {out}"))?;
        eprintln!("[capture] wrote {out}");
    }
    Ok(())
}

/// Copies the target back to the CPU, dropping the per-row padding wgpu
/// requires for texture-to-buffer copies.
fn read_back(gpu: &GpuContext, texture: &wgpu::Texture, width: u32, height: u32) -> Result<Vec<u8>> {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Capture Buffer"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Capture Encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());
    receiver.recv().context("map callback dropped")?.context("buffer map failed")?;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        pixels.extend_from_slice(&data[start..start + unpadded as usize]);
    }
    drop(data);
    buffer.unmap();
    Ok(pixels)
}
