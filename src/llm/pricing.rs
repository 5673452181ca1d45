//! Static per-model pricing used for advisory cost estimates.
//!
//! Prices are USD per million tokens, matched by model-name substring in
//! table order (more specific names first). Unknown models fall back to each
//! vendor's baseline tier; free or local services always cost zero.

use super::ProviderKind;

/// Input/output price per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price {
    pub input: f64,
    pub output: f64,
}

impl Price {
    pub const FREE: Price = Price::new(0.0, 0.0);

    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input / 1_000_000.0)
            + (output_tokens as f64 * self.output / 1_000_000.0)
    }
}

const ANTHROPIC: &[(&str, Price)] = &[
    ("haiku", Price::new(0.80, 4.00)),
    ("sonnet", Price::new(3.00, 15.00)),
    ("opus", Price::new(15.00, 75.00)),
];
const ANTHROPIC_BASELINE: Price = Price::new(0.80, 4.00);

const OPENAI: &[(&str, Price)] = &[
    ("gpt-4o-mini", Price::new(0.150, 0.600)),
    ("gpt-4o", Price::new(2.50, 10.00)),
    ("gpt-4-turbo", Price::new(10.00, 30.00)),
    ("gpt-3.5-turbo", Price::new(0.50, 1.50)),
];
const OPENAI_BASELINE: Price = Price::new(0.150, 0.600);

const GROQ: &[(&str, Price)] = &[
    ("llama-3.3-70b", Price::new(0.59, 0.79)),
    ("llama-3.1-8b", Price::new(0.05, 0.08)),
];
const GROQ_BASELINE: Price = Price::new(0.59, 0.79);

fn lookup(table: &[(&str, Price)], model: &str, baseline: Price) -> Price {
    table
        .iter()
        .find(|(needle, _)| model.contains(needle))
        .map(|(_, price)| *price)
        .unwrap_or(baseline)
}

/// Price tier for `model` on `provider`.
pub fn price_for(provider: ProviderKind, model: &str) -> Price {
    let model = model.to_lowercase();
    match provider {
        ProviderKind::Anthropic => lookup(ANTHROPIC, &model, ANTHROPIC_BASELINE),
        ProviderKind::OpenAI => lookup(OPENAI, &model, OPENAI_BASELINE),
        ProviderKind::Groq => lookup(GROQ, &model, GROQ_BASELINE),
        // OpenRouter ids are "<vendor>/<model>"; only vendors we have tables for are priced.
        ProviderKind::OpenRouter => match model.split_once('/') {
            Some(("anthropic", rest)) => lookup(ANTHROPIC, rest, ANTHROPIC_BASELINE),
            Some(("openai", rest)) => lookup(OPENAI, rest, OPENAI_BASELINE),
            _ => Price::FREE,
        },
        ProviderKind::Cerebras | ProviderKind::Ollama => Price::FREE,
    }
}

/// Estimated USD cost of a call.
pub fn estimate_cost(
    provider: ProviderKind,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> f64 {
    price_for(provider, model).cost(input_tokens, output_tokens)
}
