use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Commodities quoted on the board, with their mock reference prices (INR/quintal).
pub const COMMODITIES: &[(&str, i64)] = &[
    ("Soybean", 4250),
    ("Mustard Seed", 5800),
    ("Groundnut", 6500),
    ("Sunflower Seed", 5200),
    ("Castor Seed", 6700),
    ("Cotton Seed", 2850),
    ("Kusum Seed", 7200),
    ("Linseed", 5500),
    ("Neem Seed", 2300),
    ("Nigar Seed", 9000),
    ("Peanut Kernel", 6500),
    ("Pongam Seed", 3500),
    ("Rapeseed", 5900),
    ("Sal Seed", 1200),
    ("Sesame Seed", 12500),
];

#[derive(Debug, Clone, Copy)]
pub struct ContractSpec {
    pub symbol: &'static str,
    pub expiry: &'static str,
    pub base_price: i64,
    /// Illiquid contracts quote no best bid / best ask.
    pub liquid: bool,
    pub base_open_interest: u64,
}

const fn contract(
    symbol: &'static str,
    expiry: &'static str,
    base_price: i64,
    liquid: bool,
    base_open_interest: u64,
) -> ContractSpec {
    ContractSpec {
        symbol,
        expiry,
        base_price,
        liquid,
        base_open_interest,
    }
}

pub const CONTRACTS: &[ContractSpec] = &[
    contract("Soybean", "Nov25", 4250, true, 48_210),
    contract("Soybean", "Dec25", 4230, true, 21_940),
    contract("Mustard Seed", "Nov25", 5800, true, 36_505),
    contract("Mustard Seed", "May26", 5854, false, 4_120),
    contract("Groundnut", "Nov25", 6532, true, 12_875),
    contract("Rapeseed", "Dec25", 5980, true, 9_330),
    contract("Cotton Seed", "Dec25", 2860, true, 27_600),
    contract("Castor Seed", "Nov25", 6750, true, 15_410),
    contract("Sunflower Seed", "Dec25", 5200, false, 2_045),
    contract("Sesame Seed", "Dec25", 12500, false, 1_310),
];

static REFERENCE_PRICES: Lazy<HashMap<String, Decimal>> = Lazy::new(|| {
    COMMODITIES
        .iter()
        .map(|(name, price)| (name.to_lowercase(), Decimal::from(*price)))
        .collect()
});

/// Case-insensitive lookup of a commodity's reference price.
pub fn reference_price(commodity: &str) -> Option<Decimal> {
    REFERENCE_PRICES.get(&commodity.trim().to_lowercase()).copied()
}

/// Canonical spelling of a commodity name, if it is one we quote.
pub fn canonical_name(commodity: &str) -> Option<&'static str> {
    let wanted = commodity.trim();
    COMMODITIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn contract_keys_are_unique() {
        let keys: HashSet<_> = CONTRACTS.iter().map(|c| (c.symbol, c.expiry)).collect();
        assert_eq!(keys.len(), CONTRACTS.len());
    }

    #[test]
    fn every_contract_symbol_is_a_known_commodity() {
        for c in CONTRACTS {
            assert!(canonical_name(c.symbol).is_some(), "{} missing", c.symbol);
        }
    }

    #[test]
    fn reference_price_ignores_case() {
        assert_eq!(reference_price("soybean"), Some(Decimal::from(4250)));
        assert_eq!(reference_price(" Sesame SEED "), Some(Decimal::from(12500)));
        assert_eq!(reference_price("wheat"), None);
    }
}
