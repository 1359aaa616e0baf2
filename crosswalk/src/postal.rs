// Postal codes and forward sortation areas.

use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::*;

fn normalize(postal_code: &str) -> String {
    postal_code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// The forward sortation area of a Canadian postal code: its first three
/// characters, in the letter-digit-letter form.
///
/// Spaces and case are ignored: `"l4c 1a2"` gives `"L4C"`.
pub fn fsa_of_postal_code(postal_code: &str) -> Result<String, CrosswalkError> {
    let normalized = normalize(postal_code);
    let head: Vec<char> = normalized.chars().take(3).collect();
    match head.as_slice() {
        [a, d, b]
            if a.is_ascii_alphabetic() && d.is_ascii_digit() && b.is_ascii_alphabetic() =>
        {
            Ok(head.iter().collect())
        }
        _ => Err(CrosswalkError::InvalidPostalCode {
            postal_code: postal_code.to_string(),
        }),
    }
}

/// Counts the distinct postal codes of each (DA, FSA) pair.
///
/// Arguments:
/// * `pairs` the (DA id, postal code) rows of the reference table. A postal code
/// listed twice for the same DA is counted once.
///
/// The records are returned sorted by DA id and FSA id, ready to be passed to
/// [`crate::build_crosswalk`].
pub fn count_postal_codes(
    pairs: &[(String, String)],
) -> Result<Vec<MembershipRecord>, CrosswalkError> {
    let mut seen: BTreeMap<(&str, String), BTreeSet<String>> = BTreeMap::new();
    for (da_id, postal_code) in pairs.iter() {
        let fsa_id = fsa_of_postal_code(postal_code)?;
        seen.entry((da_id.as_str(), fsa_id))
            .or_default()
            .insert(normalize(postal_code));
    }
    debug!(
        "count_postal_codes: {:?} rows, {:?} (DA, FSA) pairs",
        pairs.len(),
        seen.len()
    );
    Ok(seen
        .into_iter()
        .map(|((da_id, fsa_id), codes)| MembershipRecord {
            da_id: da_id.to_string(),
            fsa_id,
            postal_code_count: codes.len() as u64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsa_from_postal_code() {
        assert_eq!(fsa_of_postal_code("L4C 1A2"), Ok("L4C".to_string()));
        assert_eq!(fsa_of_postal_code(" l1g3t5 "), Ok("L1G".to_string()));
        assert_eq!(fsa_of_postal_code("M5V"), Ok("M5V".to_string()));
    }

    #[test]
    fn malformed_postal_codes() {
        for pc in ["", "L4", "4LC 1A2", "LLC 1A2", "L44 1A2"] {
            assert_eq!(
                fsa_of_postal_code(pc),
                Err(CrosswalkError::InvalidPostalCode {
                    postal_code: pc.to_string()
                })
            );
        }
    }

    #[test]
    fn counts_distinct_codes() {
        let pairs: Vec<(String, String)> = [
            ("D1", "L4C 1A2"),
            ("D1", "l4c1a2"),
            ("D1", "L4C 1A3"),
            ("D1", "L4E 2B1"),
            ("D2", "L4E 2B1"),
        ]
        .iter()
        .map(|(da, pc)| (da.to_string(), pc.to_string()))
        .collect();

        let res = count_postal_codes(&pairs).unwrap();
        assert_eq!(
            res,
            vec![
                MembershipRecord::new("D1", "L4C", 2),
                MembershipRecord::new("D1", "L4E", 1),
                MembershipRecord::new("D2", "L4E", 1),
            ]
        );
    }

    #[test]
    fn invalid_code_aborts_counting() {
        let pairs = vec![
            ("D1".to_string(), "L4C 1A2".to_string()),
            ("D1".to_string(), "???".to_string()),
        ];
        assert!(count_postal_codes(&pairs).is_err());
    }
}
