use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("Unknown unit symbol '{symbol}' in '{expression}'")]
    UnknownSymbol { expression: String, symbol: String },

    #[error("Malformed unit expression '{0}'")]
    Malformed(String),

    #[error("Units are not convertible: {from} -> {to}")]
    NotConvertible { from: String, to: String },
}
