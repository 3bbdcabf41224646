/// Which market a ticker belongs to, for routing research sources.
///
/// KRX tickers are six-digit codes, optionally carrying a Yahoo-style
/// `.KS` (KOSPI) or `.KQ` (KOSDAQ) suffix. Everything else is treated as
/// a global symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLocale {
    Krx,
    Global,
}

impl SymbolLocale {
    pub fn classify(symbol: &str) -> Self {
        if has_six_digit_run(symbol) || has_krx_suffix(symbol) {
            SymbolLocale::Krx
        } else {
            SymbolLocale::Global
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, SymbolLocale::Krx)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolLocale::Krx => "krx",
            SymbolLocale::Global => "global",
        }
    }
}

fn has_six_digit_run(symbol: &str) -> bool {
    let mut run = 0usize;
    for b in symbol.bytes() {
        if b.is_ascii_digit() {
            run += 1;
            if run >= 6 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn has_krx_suffix(symbol: &str) -> bool {
    let upper = symbol.to_ascii_uppercase();
    upper.ends_with(".KS") || upper.ends_with(".KQ")
}

/// Digits-only short code, the form the Naver endpoints expect
/// (e.g. "005930.KS" -> "005930").
pub fn krx_code(symbol: &str) -> String {
    symbol.chars().filter(char::is_ascii_digit).collect()
}
