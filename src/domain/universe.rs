//! Scan universe: symbol list parsing and exclusions.

use std::collections::HashSet;

pub const DEFAULT_SYMBOLS: [&str; 16] = [
    "BTC-USD", "ETH-USD", "SOL-USD", "BNB-USD", "XRP-USD", "ADA-USD", "DOGE-USD", "AVAX-USD",
    "LINK-USD", "DOT-USD", "TRX-USD", "XLM-USD", "LTC-USD", "BCH-USD", "ATOM-USD", "NEAR-USD",
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Parse a comma-separated symbol list, uppercased, rejecting duplicates.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if seen.contains(&symbol) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        seen.insert(symbol.clone());
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Lenient variant for optional exclude lists: empty input is an empty list.
pub fn parse_optional_symbols(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Drop excluded symbols from the universe, preserving order.
pub fn apply_exclusions(symbols: Vec<String>, exclude: &[String]) -> Vec<String> {
    if exclude.is_empty() {
        return symbols;
    }
    let excluded: HashSet<String> = exclude.iter().map(|s| s.to_uppercase()).collect();
    symbols
        .into_iter()
        .filter(|s| !excluded.contains(&s.to_uppercase()))
        .collect()
}
