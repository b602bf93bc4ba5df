pub mod command;
pub mod types;

use crate::error::Result;

pub use types::{EngineDiag, EngineKind, TranslateOutput, TranslateRequest};

/// Translates one chunk. Calls share no state; a failed call affects only its chunk.
pub trait Engine {
    fn doctor(&self) -> Result<EngineDiag>;
    fn translate_chunk(&self, req: &TranslateRequest) -> Result<TranslateOutput>;
}
