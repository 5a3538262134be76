//! Physical units for calibration data.
//!
//! Calibration products arrive with their units written as text (`keV`,
//! `cm^2`, `ct/ph`, `ph/(keV s cm^2)`), so the unit attached to an array is a
//! runtime value rather than a type parameter. A [`Unit`] is a product of
//! named atoms raised to integer powers. Each atom knows its scale relative to
//! SI and its dimension, and the scales for length, mass, time, energy and
//! angle atoms are taken from the `uom` unit definitions so there is a single
//! source of truth for conversion factors.
//!
//! Scalar parameters that select a calibration variant (off-axis angle, strip
//! pitch, flight time) are strongly typed with `uom` directly; the extension
//! traits at the bottom of this module give them the constructors used across
//! the crate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;
use uom::si::angle::{degree, minute as arcminute, radian, second as arcsecond};
use uom::si::energy::{electronvolt, erg, joule, kiloelectronvolt, megaelectronvolt};
use uom::si::f64::{Angle, Energy, Length, Mass, Time};
use uom::si::length::{centimeter, meter, micrometer, millimeter, nanometer};
use uom::si::mass::{gram, kilogram};
use uom::si::time::{hour, millisecond, minute, second};

/// Errors raised by unit parsing and unit-checked arithmetic
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Malformed unit expression '{0}'")]
    Malformed(String),

    #[error("Cannot convert {from} to {to}")]
    Incompatible { from: String, to: String },

    #[error("Operation requires identical units, got {left} and {right}")]
    NotIdentical { left: String, right: String },

    #[error("Arrays of shape {left:?} and {right:?} do not broadcast")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
}

const N_DIMS: usize = 7;

/// Exponents over (length, mass, time, angle, photon, count, digital number)
pub type Dimensions = [i32; N_DIMS];

const NONE: Dimensions = [0, 0, 0, 0, 0, 0, 0];
const LENGTH: Dimensions = [1, 0, 0, 0, 0, 0, 0];
const MASS: Dimensions = [0, 1, 0, 0, 0, 0, 0];
const TIME: Dimensions = [0, 0, 1, 0, 0, 0, 0];
const ENERGY: Dimensions = [2, 1, -2, 0, 0, 0, 0];
const ANGLE: Dimensions = [0, 0, 0, 1, 0, 0, 0];
const PHOTON: Dimensions = [0, 0, 0, 0, 1, 0, 0];
const COUNT: Dimensions = [0, 0, 0, 0, 0, 1, 0];
const DIGITAL_NUMBER: Dimensions = [0, 0, 0, 0, 0, 0, 1];

#[derive(Debug, Clone, Copy)]
struct AtomDef {
    scale: f64,
    dims: Dimensions,
}

static ATOMS: Lazy<HashMap<&'static str, AtomDef>> = Lazy::new(|| {
    let length = |l: Length| AtomDef {
        scale: l.get::<meter>(),
        dims: LENGTH,
    };
    let energy = |e: Energy| AtomDef {
        scale: e.get::<joule>(),
        dims: ENERGY,
    };
    let time = |t: Time| AtomDef {
        scale: t.get::<second>(),
        dims: TIME,
    };
    let angle = |a: Angle| AtomDef {
        scale: a.get::<radian>(),
        dims: ANGLE,
    };
    let mass = |m: Mass| AtomDef {
        scale: m.get::<kilogram>(),
        dims: MASS,
    };
    let unit = |dims| AtomDef { scale: 1.0, dims };

    let mut atoms = HashMap::new();
    atoms.insert("m", length(Length::new::<meter>(1.0)));
    atoms.insert("cm", length(Length::new::<centimeter>(1.0)));
    atoms.insert("mm", length(Length::new::<millimeter>(1.0)));
    atoms.insert("um", length(Length::new::<micrometer>(1.0)));
    atoms.insert("nm", length(Length::new::<nanometer>(1.0)));
    atoms.insert("g", mass(Mass::new::<gram>(1.0)));
    atoms.insert("kg", mass(Mass::new::<kilogram>(1.0)));
    atoms.insert("s", time(Time::new::<second>(1.0)));
    atoms.insert("ms", time(Time::new::<millisecond>(1.0)));
    atoms.insert("min", time(Time::new::<minute>(1.0)));
    atoms.insert("h", time(Time::new::<hour>(1.0)));
    atoms.insert("J", energy(Energy::new::<joule>(1.0)));
    atoms.insert("erg", energy(Energy::new::<erg>(1.0)));
    atoms.insert("eV", energy(Energy::new::<electronvolt>(1.0)));
    atoms.insert("keV", energy(Energy::new::<kiloelectronvolt>(1.0)));
    atoms.insert("MeV", energy(Energy::new::<megaelectronvolt>(1.0)));
    atoms.insert("rad", angle(Angle::new::<radian>(1.0)));
    atoms.insert("deg", angle(Angle::new::<degree>(1.0)));
    atoms.insert("arcmin", angle(Angle::new::<arcminute>(1.0)));
    atoms.insert("arcsec", angle(Angle::new::<arcsecond>(1.0)));
    atoms.insert("ph", unit(PHOTON));
    atoms.insert("ct", unit(COUNT));
    atoms.insert("DN", unit(DIGITAL_NUMBER));
    atoms
});

/// Canonical spelling for alternative symbols found in calibration files
fn canonical_symbol(symbol: &str) -> &str {
    match symbol {
        "photon" | "photons" => "ph",
        "count" | "counts" | "cts" => "ct",
        "dn" | "adu" | "ADU" => "DN",
        "sec" => "s",
        "micron" | "µm" => "um",
        "hr" => "h",
        "arcminute" => "arcmin",
        "arcsecond" => "arcsec",
        "degree" => "deg",
        other => other,
    }
}

/// A runtime physical unit: named atoms with integer exponents.
///
/// Two units are *identical* when their atoms and exponents match, and
/// *convertible* when they share the same dimensions (keV and eV are
/// convertible, keV and cm² never are).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Unit {
    terms: BTreeMap<String, i32>,
}

impl Unit {
    /// The unit of pure numbers (transmissions, quantum efficiencies)
    pub fn dimensionless() -> Self {
        Self::default()
    }

    pub fn kev() -> Self {
        Self::atom("keV")
    }

    pub fn square_centimeter() -> Self {
        Self::atom("cm").powi(2)
    }

    pub fn arcmin() -> Self {
        Self::atom("arcmin")
    }

    pub fn second() -> Self {
        Self::atom("s")
    }

    /// Counts per incident photon, the unit of a redistribution matrix
    pub fn counts_per_photon() -> Self {
        Self::atom("ct").divide(&Self::atom("ph"))
    }

    fn atom(symbol: &'static str) -> Self {
        debug_assert!(ATOMS.contains_key(symbol), "unregistered atom {symbol}");
        let mut terms = BTreeMap::new();
        terms.insert(symbol.to_string(), 1);
        Self { terms }
    }

    /// Parse a unit expression.
    ///
    /// Factors are separated by whitespace or `*`; everything after a single
    /// `/` is in the denominator; parentheses only group. Exponents are
    /// written `cm^2`, `s^-1` or `cm2`. The empty string, `1` and
    /// `dimensionless` all parse to the dimensionless unit.
    pub fn parse(expr: &str) -> Result<Self, UnitError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() || trimmed == "1" || trimmed == "dimensionless" {
            return Ok(Self::dimensionless());
        }

        let (numerator, denominator) = match trimmed.split_once('/') {
            Some((num, den)) => (num, Some(den)),
            None => (trimmed, None),
        };
        if denominator.is_some_and(|den| den.contains('/')) {
            return Err(UnitError::Malformed(expr.to_string()));
        }

        let mut unit = Self::dimensionless();
        for (part, sign) in [(Some(numerator), 1), (denominator, -1)] {
            let Some(part) = part else { continue };
            let factors = part
                .split(|c: char| c.is_whitespace() || matches!(c, '*' | '(' | ')'))
                .filter(|f| !f.is_empty());
            for factor in factors {
                let (symbol, exponent) = split_factor(factor, expr)?;
                if symbol.is_empty() || symbol == "1" {
                    continue;
                }
                let symbol = canonical_symbol(symbol);
                if !ATOMS.contains_key(symbol) {
                    return Err(UnitError::UnknownSymbol(symbol.to_string()));
                }
                unit.push(symbol, sign * exponent);
            }
        }
        Ok(unit)
    }

    fn push(&mut self, symbol: &str, exponent: i32) {
        let entry = self.terms.entry(symbol.to_string()).or_insert(0);
        *entry += exponent;
        if *entry == 0 {
            self.terms.remove(symbol);
        }
    }

    /// Unit of a product of two quantities
    pub fn multiply(&self, other: &Unit) -> Unit {
        let mut out = self.clone();
        for (symbol, exponent) in &other.terms {
            out.push(symbol, *exponent);
        }
        out
    }

    /// Unit of a quotient of two quantities
    pub fn divide(&self, other: &Unit) -> Unit {
        self.multiply(&other.powi(-1))
    }

    /// Unit raised to an integer power, e.g. `cm.powi(2)` is cm^2
    pub fn powi(&self, power: i32) -> Unit {
        let mut out = Unit::dimensionless();
        for (symbol, exponent) in &self.terms {
            out.push(symbol, exponent * power);
        }
        out
    }

    /// True when the unit has no atoms at all
    pub fn is_dimensionless(&self) -> bool {
        self.terms.is_empty()
    }

    /// Scale of this unit relative to the SI-coherent unit of its dimension
    pub fn scale(&self) -> f64 {
        self.terms
            .iter()
            .filter_map(|(symbol, exponent)| ATOMS.get(symbol.as_str()).map(|a| (a, exponent)))
            .map(|(atom, exponent)| atom.scale.powi(*exponent))
            .product()
    }

    /// Exponents of the SI base dimensions, ignoring scale
    pub fn dimensions(&self) -> Dimensions {
        let mut dims = NONE;
        for (symbol, exponent) in &self.terms {
            if let Some(atom) = ATOMS.get(symbol.as_str()) {
                for (d, a) in dims.iter_mut().zip(atom.dims) {
                    *d += a * exponent;
                }
            }
        }
        dims
    }

    /// True when both units measure the same kind of quantity
    pub fn is_convertible(&self, other: &Unit) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Factor `f` such that a value `v` in `self` equals `v * f` in `target`
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_convertible(target) {
            return Err(UnitError::Incompatible {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        Ok(self.scale() / target.scale())
    }
}

fn split_factor<'a>(factor: &'a str, expr: &str) -> Result<(&'a str, i32), UnitError> {
    let malformed = || UnitError::Malformed(expr.to_string());
    if let Some((symbol, exponent)) = factor.split_once('^') {
        let exponent = exponent.parse::<i32>().map_err(|_| malformed())?;
        return Ok((symbol, exponent));
    }
    // Trailing digits are an exponent: "cm2" is cm^2
    let digits_at = factor
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    match digits_at {
        Some(0) | None => Ok((factor, 1)),
        Some(i) => {
            let exponent = factor[i..].parse::<i32>().map_err(|_| malformed())?;
            Ok((&factor[..i], exponent))
        }
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Eq for Unit {}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "dimensionless");
        }
        let render = |symbol: &str, exponent: i32| {
            if exponent == 1 {
                symbol.to_string()
            } else {
                format!("{symbol}^{exponent}")
            }
        };
        let numerator: Vec<String> = self
            .terms
            .iter()
            .filter(|(_, e)| **e > 0)
            .map(|(s, e)| render(s, *e))
            .collect();
        let denominator: Vec<String> = self
            .terms
            .iter()
            .filter(|(_, e)| **e < 0)
            .map(|(s, e)| render(s, -*e))
            .collect();

        if numerator.is_empty() {
            write!(f, "1")?;
        } else {
            write!(f, "{}", numerator.join(" "))?;
        }
        match denominator.len() {
            0 => Ok(()),
            1 => write!(f, "/{}", denominator[0]),
            _ => write!(f, "/({})", denominator.join(" ")),
        }
    }
}

impl std::str::FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Unit::parse(&value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        if unit.is_dimensionless() {
            String::new()
        } else {
            unit.to_string()
        }
    }
}

/// Extension trait for angles used to select off-axis calibration variants
pub trait AngleExt {
    /// Create angle from arc-minutes
    fn from_arcmin(arcmin: f64) -> Self;

    /// Get angle in arc-minutes
    fn as_arcmin(&self) -> f64;

    /// Create angle from arc-seconds
    fn from_arcsec(arcsec: f64) -> Self;
}

/// Extension trait for detector strip pitches
pub trait LengthExt {
    /// Create length from micrometers
    fn from_micrometers(um: f64) -> Self;

    /// Get length in micrometers
    fn as_micrometers(&self) -> f64;
}

/// Extension trait for flight times
pub trait TimeExt {
    /// Create time from seconds
    fn from_seconds(s: f64) -> Self;

    /// Get time in seconds
    fn as_seconds(&self) -> f64;
}

impl AngleExt for Angle {
    fn from_arcmin(arcmin: f64) -> Self {
        Angle::new::<arcminute>(arcmin)
    }

    fn as_arcmin(&self) -> f64 {
        self.get::<arcminute>()
    }

    fn from_arcsec(arcsec: f64) -> Self {
        Angle::new::<arcsecond>(arcsec)
    }
}

impl LengthExt for Length {
    fn from_micrometers(um: f64) -> Self {
        Length::new::<micrometer>(um)
    }

    fn as_micrometers(&self) -> f64 {
        self.get::<micrometer>()
    }
}

impl TimeExt for Time {
    fn from_seconds(s: f64) -> Self {
        Time::new::<second>(s)
    }

    fn as_seconds(&self) -> f64 {
        self.get::<second>()
    }
}
