// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::config::RelayConfig;

/// System instruction sent with every extraction call
pub const SYSTEM_INSTRUCTION: &str = "You are an advanced OCR assistant. Your task is to extract the text from the provided file (image or PDF document) precisely.
- Preserve the original formatting as far as possible, including line breaks, paragraphs and indentation.
- When processing a multi-page PDF, clearly mark the start of each new page with a marker such as '--- Page [page number] ---' on its own line before that page's content. Start with page 1.
- Reply *only* with the extracted text and the page markers. Do not add introductory or closing remarks such as 'Here is the text...' or 'The document analysis is complete.'";

/// Per-call generation settings shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub system_instruction: String,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            temperature: 0.3,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            temperature: config.temperature,
            ..Self::default()
        }
    }
}
