//! A small physical-unit algebra covering the UDUNITS expressions used by
//! Frost elements and their CF counterparts (`degC`, `m/s`, `W m-2`, `hPa`, ...).

use crate::units::error::UnitError;

/// Exponents of length, mass, time and temperature.
type Dimension = [i32; 4];

const DIMENSIONLESS: Dimension = [0, 0, 0, 0];
const LENGTH: Dimension = [1, 0, 0, 0];
const MASS: Dimension = [0, 1, 0, 0];
const TIME: Dimension = [0, 0, 1, 0];
const TEMPERATURE: Dimension = [0, 0, 0, 1];
const PRESSURE: Dimension = [-1, 1, -2, 0];
const FORCE: Dimension = [1, 1, -2, 0];
const ENERGY: Dimension = [2, 1, -2, 0];
const POWER: Dimension = [2, 1, -3, 0];
const FREQUENCY: Dimension = [0, 0, -1, 0];
const VELOCITY: Dimension = [1, 0, -1, 0];
const VOLUME: Dimension = [3, 0, 0, 0];

const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("M", 1e6),
    ("G", 1e9),
];

#[derive(Debug, Clone, Copy)]
struct Definition {
    scale: f64,
    offset: f64,
    dimension: Dimension,
    prefixable: bool,
}

const fn unit(scale: f64, dimension: Dimension, prefixable: bool) -> Definition {
    Definition {
        scale,
        offset: 0.0,
        dimension,
        prefixable,
    }
}

/// Scale and offset are relative to SI base units (m, kg, s, K).
fn lookup(symbol: &str) -> Option<Definition> {
    let def = match symbol {
        "m" | "meter" | "metre" | "meters" | "metres" => unit(1.0, LENGTH, true),
        "g" | "gram" | "grams" => unit(1e-3, MASS, true),
        "t" | "tonne" => unit(1e3, MASS, false),
        "s" | "sec" | "second" | "seconds" => unit(1.0, TIME, true),
        "min" | "minute" | "minutes" => unit(60.0, TIME, false),
        "h" | "hr" | "hour" | "hours" => unit(3600.0, TIME, false),
        "d" | "day" | "days" => unit(86_400.0, TIME, false),
        "K" | "kelvin" => unit(1.0, TEMPERATURE, true),
        "Pa" | "pascal" => unit(1.0, PRESSURE, true),
        "bar" => unit(1e5, PRESSURE, true),
        "atm" => unit(101_325.0, PRESSURE, false),
        "N" | "newton" => unit(1.0, FORCE, true),
        "J" | "joule" => unit(1.0, ENERGY, true),
        "W" | "watt" => unit(1.0, POWER, true),
        "Hz" | "hertz" => unit(1.0, FREQUENCY, true),
        "l" | "L" | "liter" | "litre" => unit(1e-3, VOLUME, true),
        "knot" | "knots" | "kt" | "kn" => unit(1852.0 / 3600.0, VELOCITY, false),
        "1" => unit(1.0, DIMENSIONLESS, false),
        "percent" | "%" => unit(1e-2, DIMENSIONLESS, false),
        "ppm" => unit(1e-6, DIMENSIONLESS, false),
        "rad" | "radian" | "radians" => unit(1.0, DIMENSIONLESS, false),
        "degree" | "degrees" | "deg" | "degree_north" | "degrees_north" | "degree_east"
        | "degrees_east" | "°" => unit(std::f64::consts::PI / 180.0, DIMENSIONLESS, false),
        "degC" | "deg_C" | "celsius" | "Celsius" | "degree_Celsius" | "°C" => Definition {
            scale: 1.0,
            offset: 273.15,
            dimension: TEMPERATURE,
            prefixable: false,
        },
        "degF" | "deg_F" | "fahrenheit" | "Fahrenheit" | "degree_Fahrenheit" | "°F" => {
            Definition {
                scale: 5.0 / 9.0,
                offset: 459.67 * 5.0 / 9.0,
                dimension: TEMPERATURE,
                prefixable: false,
            }
        }
        _ => return None,
    };
    Some(def)
}

fn resolve_symbol(symbol: &str) -> Option<Definition> {
    if let Some(def) = lookup(symbol) {
        return Some(def);
    }
    PREFIXES.iter().find_map(|(prefix, factor)| {
        let rest = symbol.strip_prefix(prefix)?;
        let def = lookup(rest).filter(|def| def.prefixable)?;
        Some(Definition {
            scale: def.scale * factor,
            ..def
        })
    })
}

/// A parsed unit: `si_value = value * scale + offset`, in base dimension `dimension`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    scale: f64,
    offset: f64,
    dimension: Dimension,
}

impl Unit {
    pub fn parse(expression: &str) -> Result<Unit, UnitError> {
        let malformed = || UnitError::Malformed(expression.to_string());
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(malformed());
        }

        let mut parts = trimmed.split('/');
        let numerator = parts.next().unwrap_or_default();
        if numerator.trim().is_empty() {
            return Err(malformed());
        }

        let mut product = Product::default();
        product.push_terms(expression, numerator, 1)?;
        for denominator in parts {
            if denominator.trim().is_empty() {
                return Err(malformed());
            }
            product.push_terms(expression, denominator, -1)?;
        }
        product.into_unit().ok_or_else(malformed)
    }

    pub fn is_convertible_to(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Returns `(scale, offset)` such that `target = value * scale + offset`,
    /// or `None` when the dimensions differ.
    pub fn conversion_to(&self, target: &Unit) -> Option<(f64, f64)> {
        if !self.is_convertible_to(target) {
            return None;
        }
        Some((
            self.scale / target.scale,
            (self.offset - target.offset) / target.scale,
        ))
    }
}

struct Product {
    factor: f64,
    terms: Vec<(Definition, i32)>,
    has_numeric_factor: bool,
}

impl Default for Product {
    fn default() -> Self {
        Product {
            factor: 1.0,
            terms: Vec::new(),
            has_numeric_factor: false,
        }
    }
}

impl Product {
    fn push_terms(&mut self, expression: &str, text: &str, sign: i32) -> Result<(), UnitError> {
        for token in text.split(|c: char| c.is_whitespace() || c == '*' || c == '·') {
            if token.is_empty() {
                continue;
            }
            if let Ok(number) = token.parse::<f64>() {
                if token != "1" {
                    self.has_numeric_factor = true;
                }
                self.factor *= number.powi(sign);
                continue;
            }
            for sub_token in token.split('.').filter(|t| !t.is_empty()) {
                let (symbol, exponent) = split_exponent(expression, sub_token)?;
                let def = resolve_symbol(symbol).ok_or_else(|| UnitError::UnknownSymbol {
                    expression: expression.to_string(),
                    symbol: symbol.to_string(),
                })?;
                let exponent = exponent
                    .checked_mul(sign)
                    .ok_or_else(|| UnitError::Malformed(expression.to_string()))?;
                self.terms.push((def, exponent));
            }
        }
        Ok(())
    }

    /// `None` when an exponent runs out of range.
    fn into_unit(self) -> Option<Unit> {
        let mut scale = self.factor;
        let mut dimension = DIMENSIONLESS;
        for (def, exponent) in &self.terms {
            scale *= def.scale.powi(*exponent);
            for (d, base) in dimension.iter_mut().zip(def.dimension) {
                *d = d.checked_add(base.checked_mul(*exponent)?)?;
            }
        }
        // Offsets only make sense for a lone unit such as `degC`.
        let offset = match self.terms.as_slice() {
            [(def, 1)] if !self.has_numeric_factor => def.offset,
            _ => 0.0,
        };
        Some(Unit {
            scale,
            offset,
            dimension,
        })
    }
}

/// Splits `m2`, `s-1`, `m^2` or `m**2` into symbol and exponent.
fn split_exponent<'a>(expression: &str, token: &'a str) -> Result<(&'a str, i32), UnitError> {
    let malformed = || UnitError::Malformed(expression.to_string());
    if let Some((symbol, exponent)) = token.split_once("**").or_else(|| token.split_once('^')) {
        let exponent = exponent.parse::<i32>().map_err(|_| malformed())?;
        return Ok((symbol, exponent));
    }

    let symbol = token.trim_end_matches(|c: char| c.is_ascii_digit());
    if symbol.len() == token.len() {
        return Ok((token, 1));
    }
    let digits = &token[symbol.len()..];
    let (symbol, negative) = match symbol.strip_suffix('-') {
        Some(s) => (s, true),
        None => (symbol.strip_suffix('+').unwrap_or(symbol), false),
    };
    if symbol.is_empty() {
        return Err(malformed());
    }
    let exponent = digits.parse::<i32>().map_err(|_| malformed())?;
    Ok((symbol, if negative { -exponent } else { exponent }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: f64, from: &str, to: &str) -> f64 {
        let (scale, offset) = Unit::parse(from)
            .unwrap()
            .conversion_to(&Unit::parse(to).unwrap())
            .unwrap();
        value * scale + offset
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9 * expected.abs().max(1.0),
            "{} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_temperature_conversions() {
        assert_close(convert(5.0, "degC", "K"), 278.15);
        assert_close(convert(273.15, "K", "degC"), 0.0);
        assert_close(convert(32.0, "degF", "degC"), 0.0);
        assert_close(convert(212.0, "degF", "K"), 373.15);
    }

    #[test]
    fn test_prefixed_units() {
        assert_close(convert(1013.25, "hPa", "Pa"), 101_325.0);
        assert_close(convert(12.0, "mm", "m"), 0.012);
        assert_close(convert(1.0, "km", "m"), 1000.0);
        assert_close(convert(1000.0, "mbar", "hPa"), 1000.0);
        assert_close(convert(1.0, "kg", "g"), 1000.0);
    }

    #[test]
    fn test_compound_units() {
        assert_close(convert(3.0, "m/s", "m s-1"), 3.0);
        assert_close(convert(36.0, "km/h", "m/s"), 10.0);
        assert_close(convert(10.0, "knots", "m s-1"), 5.144_444_444_444_445);
        assert_close(convert(250.0, "W/m2", "W m-2"), 250.0);
        assert_close(convert(1.0, "W m^-2", "W m**-2"), 1.0);
        assert_close(convert(1.0, "kg.m-2", "kg m-2"), 1.0);
        assert_close(convert(1.0, "J/s", "W"), 1.0);
    }

    #[test]
    fn test_dimensionless_units() {
        assert_close(convert(85.0, "percent", "1"), 0.85);
        assert_close(convert(0.5, "1", "%"), 50.0);
        assert_close(convert(180.0, "degrees", "rad"), std::f64::consts::PI);
    }

    #[test]
    fn test_numeric_factor() {
        assert_close(convert(2.0, "0.1 mm", "mm"), 0.2);
    }

    #[test]
    fn test_offset_ignored_in_products() {
        // A temperature difference per time has no offset.
        assert_close(convert(1.0, "degC/s", "K/s"), 1.0);
    }

    #[test]
    fn test_incompatible_dimensions() {
        let mm = Unit::parse("mm").unwrap();
        let kg_m2 = Unit::parse("kg m-2").unwrap();
        assert!(!mm.is_convertible_to(&kg_m2));
        assert!(mm.conversion_to(&kg_m2).is_none());
        let celsius = Unit::parse("degC").unwrap();
        assert!(!celsius.is_convertible_to(&Unit::parse("m/s").unwrap()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Unit::parse("octas"),
            Err(UnitError::UnknownSymbol { .. })
        ));
        assert!(matches!(Unit::parse(""), Err(UnitError::Malformed(_))));
        assert!(matches!(Unit::parse("/s"), Err(UnitError::Malformed(_))));
        assert!(matches!(Unit::parse("m/"), Err(UnitError::Malformed(_))));
        assert!(matches!(Unit::parse("m^x"), Err(UnitError::Malformed(_))));
    }

    #[test]
    fn test_large_exponents() {
        let m200 = Unit::parse("m200").unwrap();
        assert_eq!(m200, Unit::parse("m100 m100").unwrap());
        assert!(!m200.is_convertible_to(&Unit::parse("m-56").unwrap()));
        assert_close(convert(1.0, "m200/m199", "m"), 1.0);

        assert!(matches!(
            Unit::parse("m^2147483647 m"),
            Err(UnitError::Malformed(_))
        ));
        assert!(matches!(
            Unit::parse("1/m^-2147483648"),
            Err(UnitError::Malformed(_))
        ));
    }
}
