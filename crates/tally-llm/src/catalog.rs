//! Catalog - the static model list served by the models endpoint
//!
//! Display data for clients choosing a model. Independent of the pricing
//! table: a cataloged model may be unpriced (it then costs zero) and a
//! priced model may be absent here.

use serde::Serialize;

/// One selectable model
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    /// Full model identifier, provider prefix included
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Provider slug
    pub provider: &'static str,
}

/// A provider family and its models
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFamily {
    /// Display label for the family
    pub label: &'static str,
    /// Models offered under this family
    pub models: Vec<ModelEntry>,
}

/// The static model catalog
#[must_use]
pub fn model_catalog() -> Vec<ProviderFamily> {
    vec![
        ProviderFamily {
            label: "OpenAI",
            models: vec![
                ModelEntry {
                    id: "gpt-4o",
                    name: "GPT-4o",
                    provider: "openai",
                },
                ModelEntry {
                    id: "gpt-4o-mini",
                    name: "GPT-4o Mini",
                    provider: "openai",
                },
                ModelEntry {
                    id: "gpt-4-turbo",
                    name: "GPT-4 Turbo",
                    provider: "openai",
                },
                ModelEntry {
                    id: "gpt-4",
                    name: "GPT-4",
                    provider: "openai",
                },
                ModelEntry {
                    id: "gpt-3.5-turbo",
                    name: "GPT-3.5 Turbo",
                    provider: "openai",
                },
            ],
        },
        ProviderFamily {
            label: "Anthropic",
            models: vec![
                ModelEntry {
                    id: "claude-3-5-sonnet-20241022",
                    name: "Claude 3.5 Sonnet",
                    provider: "anthropic",
                },
                ModelEntry {
                    id: "claude-3-5-haiku-20241022",
                    name: "Claude 3.5 Haiku",
                    provider: "anthropic",
                },
                ModelEntry {
                    id: "claude-3-opus-20240229",
                    name: "Claude 3 Opus",
                    provider: "anthropic",
                },
            ],
        },
        ProviderFamily {
            label: "Google Gemini",
            models: vec![
                ModelEntry {
                    id: "gemini/gemini-2.0-flash-exp",
                    name: "Gemini 2.0 Flash",
                    provider: "google",
                },
                ModelEntry {
                    id: "gemini/gemini-1.5-pro",
                    name: "Gemini 1.5 Pro",
                    provider: "google",
                },
                ModelEntry {
                    id: "gemini/gemini-1.5-flash",
                    name: "Gemini 1.5 Flash",
                    provider: "google",
                },
            ],
        },
        ProviderFamily {
            label: "Groq",
            models: vec![
                ModelEntry {
                    id: "groq/llama-3.3-70b-versatile",
                    name: "Llama 3.3 70B",
                    provider: "groq",
                },
                ModelEntry {
                    id: "groq/llama-3.1-70b-versatile",
                    name: "Llama 3.1 70B",
                    provider: "groq",
                },
                ModelEntry {
                    id: "groq/llama-3.1-8b-instant",
                    name: "Llama 3.1 8B",
                    provider: "groq",
                },
                ModelEntry {
                    id: "groq/mixtral-8x7b-32768",
                    name: "Mixtral 8x7B",
                    provider: "groq",
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_all_families() {
        let catalog = model_catalog();
        let labels: Vec<&str> = catalog.iter().map(|f| f.label).collect();
        assert_eq!(labels, vec!["OpenAI", "Anthropic", "Google Gemini", "Groq"]);
        assert!(catalog.iter().all(|f| !f.models.is_empty()));
    }

    #[test]
    fn test_namespaced_ids_match_their_family() {
        let catalog = model_catalog();
        for family in &catalog {
            for model in &family.models {
                match family.label {
                    "Google Gemini" => assert!(model.id.starts_with("gemini/")),
                    "Groq" => assert!(model.id.starts_with("groq/")),
                    _ => assert!(!model.id.contains('/')),
                }
            }
        }
    }
}
