use haven_core::genai::GenFuture;
use haven_core::{GenError, GenerationRequest, TextGenerator};

/// Generator used with `--mock` or when no API key is configured. Every
/// call fails fast, so series come from the baseline and text features
/// from their static fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

impl TextGenerator for OfflineGenerator {
    fn id(&self) -> &'static str {
        "offline"
    }

    fn generate<'a>(&'a self, _request: GenerationRequest) -> GenFuture<'a> {
        Box::pin(async {
            Err(GenError::Transport(String::from(
                "offline mode: generation service disabled",
            )))
        })
    }
}
