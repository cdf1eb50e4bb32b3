use crate::capability::TextureSource;
use crate::texture::decode_rgba;
use image::RgbaImage;
use kiln_asset::{AssetResolver, AssetUrl};
use kiln_core::Result;

/// Loads material textures through an [`AssetResolver`]: relative paths
/// under the pipeline directory and `sha256:` URLs from the content store.
pub struct ResolverTextureSource {
    resolver: AssetResolver,
}

impl ResolverTextureSource {
    pub fn new(resolver: AssetResolver) -> Self {
        Self { resolver }
    }
}

impl TextureSource for ResolverTextureSource {
    fn load(&self, url: &AssetUrl) -> Result<Option<RgbaImage>> {
        match self.resolver.resolve(url).into_bytes()? {
            Some(bytes) => decode_rgba(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::TextureCompressor;
    use crate::texture::PngTextureEncoder;
    use image::Rgba;
    use kiln_asset::ResolutionStrategy;
    use std::fs;

    #[test]
    fn test_load_relative_png() {
        let dir = std::env::temp_dir().join(format!("kiln_textures_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("tex")).unwrap();
        let png = PngTextureEncoder
            .compress(&RgbaImage::from_pixel(2, 3, Rgba([5, 6, 7, 255])))
            .unwrap();
        fs::write(dir.join("tex/a.png"), png).unwrap();

        let strict = ResolverTextureSource::new(AssetResolver::new(&dir, ResolutionStrategy::Strict));
        let img = strict.load(&AssetUrl::new("tex/a.png")).unwrap().unwrap();
        assert_eq!(img.dimensions(), (2, 3));
        assert!(strict.load(&AssetUrl::new("tex/missing.png")).is_err());

        let lenient = ResolverTextureSource::new(AssetResolver::new(&dir, ResolutionStrategy::Placeholder));
        assert!(lenient.load(&AssetUrl::new("tex/missing.png")).unwrap().is_none());

        fs::write(dir.join("tex/broken.png"), b"not an image").unwrap();
        assert!(lenient.load(&AssetUrl::new("tex/broken.png")).is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
