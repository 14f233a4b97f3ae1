//! Token addresses mentioned in post text, and where to trade them.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    // Loose base58 run so vanity mints still match.
    static ref SOLANA_PATTERN: Regex =
        Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b").expect("solana pattern compiles");
    static ref EVM_PATTERN: Regex =
        Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("evm pattern compiles");
}

/// DEX used when the config does not name one.
pub const DEFAULT_DEX: &str = "GMGN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Solana,
    Evm,
}

impl Chain {
    /// Badge text drawn next to the post.
    pub fn tag(self) -> &'static str {
        match self {
            Chain::Solana => "SOL",
            Chain::Evm => "EVM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoAddress {
    pub address: String,
    pub chain: Chain,
    /// Byte range within the scanned text.
    pub range: Range<usize>,
}

impl CryptoAddress {
    pub fn trading_url(&self, dex: &str) -> Option<Url> {
        trading_url(&self.address, self.chain, dex)
    }
}

/// Solana matches come first, then EVM, each in text order. An address
/// repeated in the text is reported once.
pub fn extract_addresses(text: &str) -> Vec<CryptoAddress> {
    let patterns: [(&Regex, Chain); 2] = [
        (&*SOLANA_PATTERN, Chain::Solana),
        (&*EVM_PATTERN, Chain::Evm),
    ];

    let mut found: Vec<CryptoAddress> = Vec::new();
    for (pattern, chain) in patterns {
        for m in pattern.find_iter(text) {
            if found.iter().any(|a| a.address == m.as_str()) {
                continue;
            }
            found.push(CryptoAddress {
                address: m.as_str().to_string(),
                chain,
                range: m.range(),
            });
        }
    }
    found
}

/// Trading page for a token. `None` for an unknown DEX or a blank address.
pub fn trading_url(address: &str, chain: Chain, dex: &str) -> Option<Url> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }

    let network = match chain {
        Chain::Solana => "sol",
        Chain::Evm => "eth",
    };
    match dex.trim().to_ascii_lowercase().as_str() {
        "gmgn" => Url::parse(&format!("https://gmgn.ai/{}/token/{}", network, address)).ok(),
        _ => None,
    }
}
