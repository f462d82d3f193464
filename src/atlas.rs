use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Deserialize)]
struct AtlasFile {
    image: String,
    width: u32,
    height: u32,
    regions: HashMap<String, Rect>,
}

#[derive(Debug, Clone)]
pub struct AtlasRegion {
    pub rect: Rect,
    /// `[u0, v0, u1, v1]` in page space, v increasing downward.
    pub uv: [f32; 4],
}

/// One texture page plus its named regions. Pages map 1:1 to atlas files;
/// `page` doubles as the GPU texture cache key.
pub struct TextureAtlas {
    pub page: Arc<str>,
    pub width: u32,
    pub height: u32,
    regions: HashMap<Arc<str>, AtlasRegion>,
}

impl TextureAtlas {
    pub fn load(json_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(json_path)
            .with_context(|| format!("failed to read atlas file {}", json_path.display()))?;
        let file: AtlasFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse atlas file {}", json_path.display()))?;
        if file.width == 0 || file.height == 0 {
            bail!("atlas {} declares a zero-sized page", json_path.display());
        }
        let image_path = resolve_image_path(json_path, &file.image);
        let mut regions = HashMap::new();
        for (name, rect) in file.regions {
            let uv = [
                rect.x as f32 / file.width as f32,
                rect.y as f32 / file.height as f32,
                (rect.x + rect.w) as f32 / file.width as f32,
                (rect.y + rect.h) as f32 / file.height as f32,
            ];
            regions.insert(Arc::<str>::from(name), AtlasRegion { rect, uv });
        }
        Ok(Self {
            page: Arc::from(image_path.to_string_lossy().into_owned()),
            width: file.width,
            height: file.height,
            regions,
        })
    }

    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.get(name)
    }

    pub fn region_uv(&self, name: &str) -> Option<[f32; 4]> {
        self.regions.get(name).map(|region| region.uv)
    }

    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.regions.keys().map(|name| name.as_ref().to_string()).collect();
        names.sort();
        names
    }
}

fn resolve_image_path(json_path: &Path, image: &str) -> PathBuf {
    let image_path = Path::new(image);
    if image_path.is_absolute() {
        return image_path.to_path_buf();
    }
    match json_path.parent() {
        Some(parent) => parent.join(image_path),
        None => image_path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn region_uvs_are_normalized_to_page_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("atlas.json");
        let mut file = std::fs::File::create(&json_path).expect("create atlas");
        write!(
            file,
            r#"{{"image": "page.png", "width": 128, "height": 64,
                "regions": {{"head": {{"x": 32, "y": 16, "w": 32, "h": 16}}}}}}"#
        )
        .expect("write atlas");
        let atlas = TextureAtlas::load(&json_path).expect("load atlas");
        let uv = atlas.region_uv("head").expect("head region");
        assert_eq!(uv, [0.25, 0.25, 0.5, 0.5]);
        assert!(atlas.region_uv("missing").is_none());
        assert!(atlas.page.as_ref().ends_with("page.png"));
    }

    #[test]
    fn zero_sized_page_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("atlas.json");
        std::fs::write(&json_path, r#"{"image": "p.png", "width": 0, "height": 64, "regions": {}}"#)
            .expect("write atlas");
        assert!(TextureAtlas::load(&json_path).is_err());
    }
}
