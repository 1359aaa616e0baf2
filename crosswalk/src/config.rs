// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// One row of the membership table: how many postal codes of a dissemination
/// area (DA) fall into a forward sortation area (FSA).
///
/// The table must be pre-aggregated: a (DA, FSA) pair appears at most once.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct MembershipRecord {
    pub da_id: String,
    pub fsa_id: String,
    pub postal_code_count: u64,
}

impl MembershipRecord {
    pub fn new(da_id: &str, fsa_id: &str, postal_code_count: u64) -> MembershipRecord {
        MembershipRecord {
            da_id: da_id.to_string(),
            fsa_id: fsa_id.to_string(),
            postal_code_count,
        }
    }
}

/// A DA-level measure, for example the population of one age group.
#[derive(PartialEq, Debug, Clone)]
pub struct MeasureRecord {
    pub da_id: String,
    pub attribute: String,
    pub value: f64,
}

impl MeasureRecord {
    pub fn new(da_id: &str, attribute: &str, value: f64) -> MeasureRecord {
        MeasureRecord {
            da_id: da_id.to_string(),
            attribute: attribute.to_string(),
            value,
        }
    }
}

// ******** Output data structures *********

/// The fraction of a DA assigned to one FSA.
///
/// Invariant: `0 < weight <= 1`, and the weights of one DA sum to 1.
#[derive(PartialEq, Debug, Clone)]
pub struct CrosswalkWeight {
    pub da_id: String,
    pub fsa_id: String,
    pub weight: f64,
}

/// A measure redistributed and summed at the FSA level.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregatedMeasure {
    pub fsa_id: String,
    pub attribute: String,
    pub value: f64,
}

/// The part of an FSA total held by one attribute.
#[derive(PartialEq, Debug, Clone)]
pub struct FsaShare {
    pub fsa_id: String,
    pub attribute: String,
    pub value: f64,
    /// Between 0 and 1. Zero when the FSA total is zero.
    pub share: f64,
}

/// The number of DAs of an FSA that have one value (the category) of an
/// attribute, for categorical measures such as deprivation quintiles.
///
/// Each DA is counted in its dominant FSA only.
#[derive(PartialEq, Debug, Clone)]
pub struct DaCount {
    pub fsa_id: String,
    pub attribute: String,
    pub category: String,
    pub da_count: u64,
    /// The DAs of the FSA that have a value for the attribute.
    pub total_das: u64,
    pub proportion: f64,
}

/// How many DAs each FSA receives.
#[derive(PartialEq, Debug, Clone)]
pub struct DaCountStats {
    pub fsa_count: usize,
    pub mean: f64,
    pub median: f64,
}

/// Errors that abort a run. Each one carries the key that triggered it so that
/// the source data can be corrected.
#[derive(PartialEq, Debug, Clone)]
pub enum CrosswalkError {
    /// The DA has no postal code at all in the membership table.
    InconsistentMembership { da_id: String },
    /// The same (DA, FSA) pair was listed more than once.
    DuplicateKey { da_id: String, fsa_id: String },
    /// The weights of a DA do not sum to 1.
    Normalization { da_id: String, sum: f64 },
    /// A precomputed weight is not in (0, 1].
    InvalidWeight {
        da_id: String,
        fsa_id: String,
        weight: f64,
    },
    /// A measure refers to a DA that is not in the crosswalk.
    UnmappedDa { da_id: String },
    /// A measure value is negative or not a number.
    InvalidValue {
        da_id: String,
        attribute: String,
        value: f64,
    },
    InvalidPostalCode { postal_code: String },
    /// The redistributed total of an attribute differs from its input total.
    Conservation {
        attribute: String,
        expected: f64,
        actual: f64,
    },
}

impl Error for CrosswalkError {}

impl Display for CrosswalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrosswalkError::InconsistentMembership { da_id } => {
                write!(f, "DA {} has no postal code in the membership table", da_id)
            }
            CrosswalkError::DuplicateKey { da_id, fsa_id } => write!(
                f,
                "DA {} / FSA {} appears more than once in the membership table",
                da_id, fsa_id
            ),
            CrosswalkError::Normalization { da_id, sum } => {
                write!(f, "weights of DA {} sum to {} instead of 1", da_id, sum)
            }
            CrosswalkError::InvalidWeight {
                da_id,
                fsa_id,
                weight,
            } => write!(
                f,
                "weight {} of DA {} / FSA {} is not in (0, 1]",
                weight, da_id, fsa_id
            ),
            CrosswalkError::UnmappedDa { da_id } => {
                write!(f, "DA {} has measures but is absent from the crosswalk", da_id)
            }
            CrosswalkError::InvalidValue {
                da_id,
                attribute,
                value,
            } => write!(
                f,
                "invalid value {} for attribute {} of DA {}",
                value, attribute, da_id
            ),
            CrosswalkError::InvalidPostalCode { postal_code } => {
                write!(f, "invalid postal code {:?}", postal_code)
            }
            CrosswalkError::Conservation {
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "attribute {} totals {} after redistribution, expected {}",
                attribute, actual, expected
            ),
        }
    }
}

// ********* Configuration **********

/// Tolerance on the sum of the weights of a DA.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// How the measures of a DA are assigned to FSAs.
///
/// - Proportional splits the value of a DA across all its FSAs according to
/// the crosswalk weights.
///
/// - Dominant assigns the full value to the FSA with the largest weight. Ties
/// go to the smallest FSA id.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AllocationMode {
    Proportional,
    Dominant,
}

impl AllocationMode {
    pub fn name(&self) -> &'static str {
        match self {
            AllocationMode::Proportional => "proportional",
            AllocationMode::Dominant => "dominant",
        }
    }
}

impl Default for AllocationMode {
    fn default() -> Self {
        AllocationMode::Proportional
    }
}
