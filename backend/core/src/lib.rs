pub mod error;
pub mod traits;
pub mod types;

pub use error::{AnalysisError, BatchError, ErrorKind, SequencingError, WriteError};
pub use traits::{ImageAnalyzer, ReportSink};
pub use types::{
    is_supported_image, AnalysisOutcome, Extraction, ImageItem, OrderedReport, ResultMap,
    SequenceMode, SequencedItem, TokenUsage, SUPPORTED_IMAGE_EXTENSIONS,
};
