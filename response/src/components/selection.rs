//! Picking one member of a calibrated parameter family.
//!
//! Optic effective areas and collimator ratios are tabulated against off-axis
//! angle, atmospheric transmission against flight time, and CdTe matrices
//! against detector region. A request is matched to the calibrated members
//! here and the outcome is kept as a [`SelectedParameter`] so the product can
//! report exactly which member was used and how far it was from the request.

use serde::{Deserialize, Serialize};
use uom::si::f64::{Angle, Length, Time};

use super::LoadError;
use crate::units::{AngleExt, LengthExt, TimeExt, Unit};

/// Off-axis angles closer than this to zero (arcmin) count as on-axis
pub const ON_AXIS_TOLERANCE_ARCMIN: f64 = 1e-9;

/// Strip pitch for each CdTe detector region, in micrometers
pub const REGION_PITCH_UM: [f64; 3] = [60.0, 80.0, 100.0];

/// Requested off-axis pointing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AngleSelection {
    /// The member nearest zero; always valid
    #[default]
    OnAxis,
    At(Angle),
}

impl AngleSelection {
    pub fn arcmin(value: f64) -> Self {
        AngleSelection::At(Angle::from_arcmin(value))
    }
}

/// Requested CdTe detector region
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RegionSelection {
    /// The lowest region in the file
    #[default]
    Default,
    Region(u8),
    /// Strip pitch, mapped onto a region
    Pitch(Length),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Requested {
    Default,
    Value(f64),
    Range(f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Chosen {
    /// A single calibrated member and its distance from the request
    Member { value: f64, distance: f64 },
    /// Members averaged over a requested range
    Average {
        first: f64,
        last: f64,
        members: usize,
    },
}

/// Record of a parameter-family selection, in the family's parameter unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedParameter {
    pub name: String,
    pub unit: Unit,
    pub requested: Requested,
    pub chosen: Chosen,
}

/// Index of the member nearest `target`; ties go to the lower value
pub fn nearest(members: &[f64], target: f64) -> Option<usize> {
    members
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (**a - target).abs();
            let db = (**b - target).abs();
            da.total_cmp(&db).then(a.total_cmp(b))
        })
        .map(|(i, _)| i)
}

fn span(members: &[f64]) -> (f64, f64) {
    members
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn empty_family(name: &str) -> LoadError {
    LoadError::malformed(name, "parameter family has no members")
}

fn out_of_range(name: &str, requested: String, members: &[f64], unit: &Unit) -> LoadError {
    let (lo, hi) = span(members);
    LoadError::ParameterOutOfRange {
        parameter: name.to_string(),
        requested,
        available: format!("[{lo}, {hi}] {unit}"),
    }
}

/// Choose the member matching an off-axis request.
///
/// `members` are parameter values in `unit`, which must be an angle unit.
pub fn select_angle(
    name: &str,
    members: &[f64],
    unit: &Unit,
    selection: AngleSelection,
) -> Result<(usize, SelectedParameter), LoadError> {
    let (target, requested) = match selection {
        AngleSelection::OnAxis => (0.0, Requested::Default),
        AngleSelection::At(angle) => {
            let factor = Unit::arcmin()
                .conversion_factor(unit)
                .map_err(|e| LoadError::from_unit(name, e))?;
            let value = angle.as_arcmin() * factor;
            let slack = ON_AXIS_TOLERANCE_ARCMIN * factor;
            let (lo, hi) = span(members);
            if value < lo - slack || value > hi + slack {
                return Err(out_of_range(name, format!("{value} {unit}"), members, unit));
            }
            (value, Requested::Value(value))
        }
    };

    let index = nearest(members, target).ok_or_else(|| empty_family(name))?;
    let chosen = members[index];
    Ok((
        index,
        SelectedParameter {
            name: name.to_string(),
            unit: unit.clone(),
            requested,
            chosen: Chosen::Member {
                value: chosen,
                distance: (chosen - target).abs(),
            },
        },
    ))
}

/// Map a region request onto one of the regions present in a matrix file
pub fn select_region(
    available: &[u8],
    selection: RegionSelection,
) -> Result<(u8, SelectedParameter), LoadError> {
    let name = "region";
    let as_f64: Vec<f64> = available.iter().map(|r| f64::from(*r)).collect();
    let (region, requested) = match selection {
        RegionSelection::Default => {
            let lowest = available.iter().min().copied().ok_or_else(|| empty_family(name))?;
            (lowest, Requested::Default)
        }
        RegionSelection::Region(region) => (region, Requested::Value(f64::from(region))),
        RegionSelection::Pitch(pitch) => {
            let um = pitch.as_micrometers();
            let region = REGION_PITCH_UM
                .iter()
                .position(|p| (p - um).abs() < 1e-6)
                .ok_or_else(|| LoadError::ParameterOutOfRange {
                    parameter: "pitch".to_string(),
                    requested: format!("{um} um"),
                    available: format!("{REGION_PITCH_UM:?} um"),
                })?;
            (region as u8, Requested::Value(f64::from(region as u8)))
        }
    };

    if !available.contains(&region) {
        return Err(out_of_range(
            name,
            region.to_string(),
            &as_f64,
            &Unit::dimensionless(),
        ));
    }
    Ok((
        region,
        SelectedParameter {
            name: name.to_string(),
            unit: Unit::dimensionless(),
            requested,
            chosen: Chosen::Member {
                value: f64::from(region),
                distance: 0.0,
            },
        },
    ))
}

/// Choose the members covering a flight-time range.
///
/// Members inside `[start, end]` are returned for averaging. When the range
/// sits inside the calibrated span but between two members, the member
/// nearest the range centre is used instead.
pub fn select_time_range(
    name: &str,
    members: &[f64],
    unit: &Unit,
    range: (Time, Time),
) -> Result<(Vec<usize>, SelectedParameter), LoadError> {
    let factor = Unit::second()
        .conversion_factor(unit)
        .map_err(|e| LoadError::from_unit(name, e))?;
    let start = range.0.as_seconds() * factor;
    let end = range.1.as_seconds() * factor;
    let requested = Requested::Range(start, end);
    let describe = || format!("[{start}, {end}] {unit}");

    if members.is_empty() {
        return Err(empty_family(name));
    }
    let (lo, hi) = span(members);
    if end < start || start > hi || end < lo {
        return Err(out_of_range(name, describe(), members, unit));
    }

    let inside: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, t)| (start..=end).contains(*t))
        .map(|(i, _)| i)
        .collect();

    if inside.is_empty() {
        let centre = 0.5 * (start + end);
        let index = nearest(members, centre).ok_or_else(|| empty_family(name))?;
        let value = members[index];
        return Ok((
            vec![index],
            SelectedParameter {
                name: name.to_string(),
                unit: unit.clone(),
                requested,
                chosen: Chosen::Member {
                    value,
                    distance: (value - centre).abs(),
                },
            },
        ));
    }

    let (first, last) = span(&inside.iter().map(|i| members[*i]).collect::<Vec<_>>());
    let count = inside.len();
    Ok((
        inside,
        SelectedParameter {
            name: name.to_string(),
            unit: unit.clone(),
            requested,
            chosen: Chosen::Average {
                first,
                last,
                members: count,
            },
        },
    ))
}
