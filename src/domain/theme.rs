//! Symbol-to-theme classification for crypto assets.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Theme {
    Major,
    L1,
    L2,
    DeFi,
    Infra,
    Meme,
    Other,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Theme::Major => "Major",
            Theme::L1 => "L1",
            Theme::L2 => "L2",
            Theme::DeFi => "DeFi",
            Theme::Infra => "Infra",
            Theme::Meme => "Meme",
            Theme::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Classify a symbol to a broad crypto theme.
///
/// Accepts `BTC-USD`, `BTC/KRW`, `BTCUSDT`, or a bare base asset.
pub fn classify_symbol_theme(symbol: &str) -> Theme {
    let s = symbol.trim().to_uppercase();
    if s.is_empty() {
        return Theme::Other;
    }

    let base = if let Some((base, _)) = s.split_once('-') {
        base.to_string()
    } else if let Some((base, _)) = s.split_once('/') {
        base.to_string()
    } else if let Some(stripped) = s.strip_suffix("USDT") {
        stripped.to_string()
    } else if let Some(stripped) = s.strip_suffix("KRW") {
        stripped.to_string()
    } else {
        s
    };

    match base.as_str() {
        "BTC" | "ETH" | "BNB" | "XRP" => Theme::Major,
        "SOL" | "ADA" | "AVAX" | "DOT" | "ATOM" | "NEAR" => Theme::L1,
        "MATIC" => Theme::L2,
        "UNI" | "AAVE" | "MKR" | "SNX" | "CRV" => Theme::DeFi,
        "LINK" => Theme::Infra,
        "DOGE" | "SHIB" | "PEPE" => Theme::Meme,
        _ => Theme::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_majors() {
        assert_eq!(classify_symbol_theme("BTC-USD"), Theme::Major);
        assert_eq!(classify_symbol_theme("ETHUSDT"), Theme::Major);
        assert_eq!(classify_symbol_theme("XRP/KRW"), Theme::Major);
    }

    #[test]
    fn classifies_l1_and_meme() {
        assert_eq!(classify_symbol_theme("SOL-USD"), Theme::L1);
        assert_eq!(classify_symbol_theme("doge-usd"), Theme::Meme);
    }

    #[test]
    fn unknown_is_other() {
        assert_eq!(classify_symbol_theme("FOO-USD"), Theme::Other);
        assert_eq!(classify_symbol_theme(""), Theme::Other);
    }

    #[test]
    fn bare_base_asset() {
        assert_eq!(classify_symbol_theme("LINK"), Theme::Infra);
    }
}
