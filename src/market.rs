use crate::rng::RandomSource;
use crate::types::TradingPair;

/// Half-width of the per-tick price drift (±0.06%).
pub const PRICE_DRIFT: f64 = 0.0006;
/// Half-width of the per-tick 24h-change adjustment, in percentage points.
pub const CHANGE_DRIFT: f64 = 0.03;

pub struct MarketModel {
    pairs: Vec<TradingPair>,
}

impl MarketModel {
    pub fn new(pairs: Vec<TradingPair>) -> Self {
        let mut unique: Vec<TradingPair> = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if unique.iter().any(|p| p.symbol == pair.symbol) {
                log::warn!("ignoring duplicate pair {}", pair.symbol);
                continue;
            }
            unique.push(pair);
        }
        Self { pairs: unique }
    }

    pub fn with_default_pairs() -> Self {
        Self::new(default_pairs())
    }

    pub fn pairs(&self) -> &[TradingPair] {
        &self.pairs
    }

    pub fn get(&self, symbol: &str) -> Option<&TradingPair> {
        self.pairs.iter().find(|p| p.symbol == symbol)
    }

    /// Advance every pair by one bounded random-walk step.
    pub fn tick(&mut self, rng: &mut dyn RandomSource) {
        for pair in &mut self.pairs {
            let factor = 1.0 + (rng.next_unit() * 2.0 * PRICE_DRIFT - PRICE_DRIFT);
            pair.price *= factor;

            let delta = rng.next_unit() * 2.0 * CHANGE_DRIFT - CHANGE_DRIFT;
            pair.change_24h = round2(pair.change_24h + delta);
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pair(symbol: &str, name: &str, price: f64, change_24h: f64, is_meme: bool) -> TradingPair {
    TradingPair {
        symbol: symbol.to_string(),
        name: name.to_string(),
        price,
        change_24h,
        is_meme,
    }
}

pub fn default_pairs() -> Vec<TradingPair> {
    vec![
        pair("BTC/USDT", "Bitcoin", 64200.50, 2.5, false),
        pair("ETH/USDT", "Ethereum", 3450.20, -1.2, false),
        pair("SOL/USDT", "Solana", 145.80, 5.4, false),
        pair("PEPE/USDT", "Pepe", 0.0000085, 12.8, true),
        pair("DOGE/USDT", "Dogecoin", 0.165, 3.2, true),
        pair("SHIB/USDT", "Shiba Inu", 0.000025, -2.1, true),
        pair("WIF/USDT", "Dogwifhat", 3.42, 15.6, true),
        pair("BNB/USDT", "Binance Coin", 580.10, 0.8, false),
    ]
}
