use kornia_image::{Image, allocator::CpuAllocator};

/// Square RGB image with raw 0-255 samples, as handed to the model.
pub type NormalizedImage = Image<u8, 3, CpuAllocator>;

/// Trait for pretrained multimodal models the engine can drive.
///
/// Implementors map an image and a prompt to generated text. The engine owns
/// the model on a single worker thread, so `generate` is never called
/// concurrently and the model does not need to be `Sync`.
pub trait GenerationModel {
    /// The error type that can be returned during generation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Generates text for `prompt` conditioned on `image`.
    fn generate(&mut self, image: &NormalizedImage, prompt: &str) -> Result<String, Self::Error>;
}
