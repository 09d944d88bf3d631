pub mod mime;
pub mod sanitize;
pub mod vision;

pub use mime::detect_image_mime;
pub use sanitize::{sanitize_text, DEFAULT_PLACEHOLDER};
pub use vision::{VisionAnalyzer, VisionProvider, DEFAULT_OPENAI_MODEL, DEFAULT_GEMINI_MODEL};
