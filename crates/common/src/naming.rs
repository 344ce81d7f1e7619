//! Naming rules for raw rates, formula context keys and calculated results.
//!
//! ```text
//! PF1_USDTRY  --context_key(Bid)-->  Pf1UsdTryBid
//! EURUSD      --result_name-->       EURTRY   (base rate USDTRY)
//! ```

/// Which side of a quote a context key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSide {
    Bid,
    Ask,
}

impl QuoteSide {
    pub fn suffix(&self) -> &'static str {
        match self {
            QuoteSide::Bid => "Bid",
            QuoteSide::Ask => "Ask",
        }
    }
}

/// Platform prefix of a raw rate name (`PF1` for `PF1_USDTRY`)
pub fn platform_prefix(raw_name: &str) -> Option<&str> {
    match raw_name.split_once('_') {
        Some((prefix, instrument)) if !prefix.is_empty() && !instrument.is_empty() => Some(prefix),
        _ => None,
    }
}

/// Instrument part of a rate name (`USDTRY` for `PF1_USDTRY`, unchanged for bare names)
pub fn instrument_of(raw_name: &str) -> &str {
    match raw_name.split_once('_') {
        Some((prefix, instrument)) if !prefix.is_empty() && !instrument.is_empty() => instrument,
        _ => raw_name,
    }
}

/// `PF1` -> `Pf1`
pub fn camel_token(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Camel-cased instrument: six-letter currency pairs split into two
/// currency codes (`USDTRY` -> `UsdTry`), anything else capitalized as one token.
pub fn camel_instrument(instrument: &str) -> String {
    if instrument.len() == 6 && instrument.chars().all(|c| c.is_ascii_alphabetic()) {
        let (base, quote) = instrument.split_at(3);
        format!("{}{}", camel_token(base), camel_token(quote))
    } else {
        camel_token(instrument)
    }
}

/// Formula context key for one side of a raw rate.
///
/// Returns `None` for names without a platform prefix.
pub fn context_key(raw_name: &str, side: QuoteSide) -> Option<String> {
    let prefix = platform_prefix(raw_name)?;
    Some(format!(
        "{}{}{}",
        camel_token(prefix),
        camel_instrument(instrument_of(raw_name)),
        side.suffix()
    ))
}

/// Name a calculated target is published under.
///
/// With base rate `USDTRY`, a target quoted against the base's first currency
/// (`EURUSD`) is expressed against its second (`EURTRY`). Every other name,
/// including the base itself, passes through unchanged.
pub fn result_name(target: &str, base_rate: &str) -> String {
    if base_rate.len() != 6 || target == base_rate || !base_rate.is_ascii() {
        return target.to_string();
    }
    let (base_ccy, local_ccy) = base_rate.split_at(3);
    match target.strip_suffix(base_ccy) {
        Some(ccy) if !ccy.is_empty() => format!("{}{}", ccy, local_ccy),
        _ => target.to_string(),
    }
}
