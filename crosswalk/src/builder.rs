pub use crate::config::*;
use crate::{build_crosswalk, count_postal_codes, fsa_of_postal_code, Crosswalk};

/// A builder for collecting the membership data of a crosswalk.
///
/// The rows can be added either as pre-aggregated counts or as raw
/// (DA, postal code) pairs from a reference table such as the PCCF.
///
/// ```
/// pub use fsa_crosswalk::builder::Builder;
/// # use fsa_crosswalk::CrosswalkError;
///
/// let mut builder = Builder::new();
/// builder.add_membership("35190009", "L4C", 30)?;
/// builder.add_postal_code("35190010", "L4E 2B1")?;
///
/// let crosswalk = builder.build()?;
/// assert_eq!(crosswalk.da_count(), 2);
///
/// # Ok::<(), CrosswalkError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    pub(crate) _records: Vec<MembershipRecord>,
    pub(crate) _postal_codes: Vec<(String, String)>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _records: Vec::new(),
            _postal_codes: Vec::new(),
        }
    }

    /// Adds a pre-aggregated count of postal codes.
    ///
    /// The same (DA, FSA) pair must not be added twice, either directly or
    /// through [`Builder::add_postal_code`]. This is checked when building.
    pub fn add_membership(
        &mut self,
        da_id: &str,
        fsa_id: &str,
        postal_code_count: u64,
    ) -> Result<(), CrosswalkError> {
        self.add_record(&MembershipRecord::new(da_id, fsa_id, postal_code_count))
    }

    pub fn add_record(&mut self, record: &MembershipRecord) -> Result<(), CrosswalkError> {
        self._records.push(record.clone());
        Ok(())
    }

    /// Adds one postal code of a DA. The postal code is validated immediately.
    pub fn add_postal_code(&mut self, da_id: &str, postal_code: &str) -> Result<(), CrosswalkError> {
        fsa_of_postal_code(postal_code)?;
        self._postal_codes
            .push((da_id.to_string(), postal_code.to_string()));
        Ok(())
    }

    pub fn build(&self) -> Result<Crosswalk, CrosswalkError> {
        let mut records = self._records.clone();
        records.extend(count_postal_codes(&self._postal_codes)?);
        build_crosswalk(&records)
    }
}
