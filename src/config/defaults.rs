//! Per-provider defaults.

use crate::llm::ProviderKind;

/// Model used when neither stage names one.
pub fn default_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Anthropic => "claude-haiku-4-5",
        ProviderKind::OpenAI => "gpt-4o-mini",
        ProviderKind::Cerebras => "llama-3.3-70b",
        ProviderKind::Groq => "llama-3.3-70b-versatile",
        ProviderKind::OpenRouter => "openai/gpt-4o-mini",
        ProviderKind::Ollama => "llama3.2",
    }
}

/// Environment variable holding the provider's API key (empty for Ollama).
pub fn default_api_key_env(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::OpenAI => "OPENAI_API_KEY",
        ProviderKind::Cerebras => "CEREBRAS_API_KEY",
        ProviderKind::Groq => "GROQ_API_KEY",
        ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        ProviderKind::Ollama => "",
    }
}
