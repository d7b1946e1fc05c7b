// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Allow-listed model selection

use thiserror::Error;
use tracing::warn;

use crate::config::{ModelPolicy, RelayConfig};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("Invalid model selection '{requested}'. Allowed: {}", allowed.join(", "))]
    NotAllowed {
        requested: String,
        allowed: Vec<String>,
    },
}

/// Resolves the client's `model_name` against the allow-list
#[derive(Debug, Clone)]
pub struct ModelSelector {
    allowed: Vec<String>,
    default_model: String,
    policy: ModelPolicy,
}

impl ModelSelector {
    /// Build a selector, adding the default to the allow-list if it is missing
    pub fn new<I, S>(allowed: I, default_model: &str, policy: ModelPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut models: Vec<String> = Vec::new();
        for model in allowed {
            let model = model.into().trim().to_string();
            if !model.is_empty() && !models.contains(&model) {
                models.push(model);
            }
        }

        let default_model = default_model.trim().to_string();
        if !models.contains(&default_model) {
            warn!(
                "Default model '{}' missing from the allow-list; adding it",
                default_model
            );
            models.insert(0, default_model.clone());
        }

        Self {
            allowed: models,
            default_model,
            policy,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.allowed_models.iter().map(String::as_str),
            &config.default_model,
            config.model_policy,
        )
    }

    /// Pick the model for one request
    ///
    /// A missing or blank name always yields the default. Anything else must be
    /// on the allow-list, or the configured policy decides.
    pub fn select(&self, requested: Option<&str>) -> Result<String, SelectionError> {
        let requested = match requested.map(str::trim) {
            None | Some("") => return Ok(self.default_model.clone()),
            Some(name) => name,
        };

        if self.is_allowed(requested) {
            return Ok(requested.to_string());
        }

        match self.policy {
            ModelPolicy::Strict => Err(SelectionError::NotAllowed {
                requested: requested.to_string(),
                allowed: self.allowed.clone(),
            }),
            ModelPolicy::Fallback => {
                warn!(
                    "Model '{}' is not allowed, falling back to '{}'",
                    requested, self.default_model
                );
                Ok(self.default_model.clone())
            }
        }
    }

    pub fn is_allowed(&self, model: &str) -> bool {
        self.allowed.iter().any(|m| m == model)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn policy(&self) -> ModelPolicy {
        self.policy
    }
}
