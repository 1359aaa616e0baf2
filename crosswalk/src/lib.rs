mod config;
mod postal;

pub mod builder;
pub mod manual;

use log::{debug, info};

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ops::Range,
};

pub use crate::config::*;
pub use crate::postal::{count_postal_codes, fsa_of_postal_code};

// **** Crosswalk table ****

/// The normalized DA x FSA weight table.
///
/// A crosswalk is derived from the membership data and never modified. Any
/// update requires building it again from the source data.
#[derive(PartialEq, Debug, Clone)]
pub struct Crosswalk {
    // Sorted by (da_id, fsa_id). Never contains a weight outside of (0, 1].
    weights: Vec<CrosswalkWeight>,
    // The rows of each DA in `weights`. Ranges are never empty.
    index: BTreeMap<String, Range<usize>>,
}

impl Crosswalk {
    fn from_sorted(weights: Vec<CrosswalkWeight>) -> Crosswalk {
        let mut index: BTreeMap<String, Range<usize>> = BTreeMap::new();
        let mut start = 0;
        for idx in 1..=weights.len() {
            if idx == weights.len() || weights[idx].da_id != weights[start].da_id {
                index.insert(weights[start].da_id.clone(), start..idx);
                start = idx;
            }
        }
        Crosswalk { weights, index }
    }

    /// Builds a crosswalk from a table of precomputed weights.
    ///
    /// The weights are checked the same way as the output of [`build_crosswalk`],
    /// with the given tolerance on the sum of the weights of each DA. Published
    /// proportion tables are usually rounded and need a looser tolerance than
    /// [`WEIGHT_SUM_TOLERANCE`].
    pub fn from_weights(
        weights: &[CrosswalkWeight],
        tolerance: f64,
    ) -> Result<Crosswalk, CrosswalkError> {
        let mut sorted: Vec<CrosswalkWeight> = weights.to_vec();
        sorted.sort_by(|a, b| (&a.da_id, &a.fsa_id).cmp(&(&b.da_id, &b.fsa_id)));

        for pair in sorted.windows(2) {
            if pair[0].da_id == pair[1].da_id && pair[0].fsa_id == pair[1].fsa_id {
                return Err(CrosswalkError::DuplicateKey {
                    da_id: pair[0].da_id.clone(),
                    fsa_id: pair[0].fsa_id.clone(),
                });
            }
        }

        let crosswalk = Crosswalk::from_sorted(sorted);
        for (da_id, rows) in crosswalk.index.iter() {
            let mut sum = 0.0;
            for w in crosswalk.weights[rows.clone()].iter() {
                if !(w.weight > 0.0 && w.weight <= 1.0) {
                    return Err(CrosswalkError::InvalidWeight {
                        da_id: w.da_id.clone(),
                        fsa_id: w.fsa_id.clone(),
                        weight: w.weight,
                    });
                }
                sum += w.weight;
            }
            check_weight_sum(da_id, sum, tolerance)?;
        }
        info!(
            "Crosswalk::from_weights: loaded {:?} weights for {:?} DAs",
            crosswalk.len(),
            crosswalk.da_count()
        );
        Ok(crosswalk)
    }

    /// All the rows, sorted by DA id then FSA id.
    pub fn weights(&self) -> &[CrosswalkWeight] {
        &self.weights
    }

    /// The rows of one DA, sorted by FSA id.
    pub fn weights_for(&self, da_id: &str) -> Option<&[CrosswalkWeight]> {
        self.index
            .get(da_id)
            .map(|rows| &self.weights[rows.clone()])
    }

    /// The FSA that receives the largest part of the DA. Ties go to the
    /// smallest FSA id.
    pub fn dominant_fsa(&self, da_id: &str) -> Option<&CrosswalkWeight> {
        self.weights_for(da_id).and_then(dominant_of)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn da_count(&self) -> usize {
        self.index.len()
    }

    /// The distinct FSA ids, sorted.
    pub fn fsa_ids(&self) -> Vec<&str> {
        let mut res: Vec<&str> = self.weights.iter().map(|w| w.fsa_id.as_str()).collect();
        res.sort_unstable();
        res.dedup();
        res
    }

    /// A SHA-256 digest of the content of the table.
    ///
    /// Two crosswalks built from the same membership data have the same
    /// fingerprint, whatever the order of the input rows.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        for w in self.weights.iter() {
            canonical.push_str(&format!("{}\t{}\t{}\n", w.da_id, w.fsa_id, w.weight));
        }
        sha256::digest(canonical)
    }
}

fn dominant_of(rows: &[CrosswalkWeight]) -> Option<&CrosswalkWeight> {
    let mut best: Option<&CrosswalkWeight> = None;
    // Rows are sorted by FSA id: only a strictly larger weight replaces the current one.
    for w in rows.iter() {
        match best {
            Some(b) if b.weight >= w.weight => {}
            _ => {
                best = Some(w);
            }
        }
    }
    best
}

fn check_weight_sum(da_id: &str, sum: f64, tolerance: f64) -> Result<(), CrosswalkError> {
    if (sum - 1.0).abs() < tolerance {
        Ok(())
    } else {
        Err(CrosswalkError::Normalization {
            da_id: da_id.to_string(),
            sum,
        })
    }
}

// **** Crosswalk construction ****

/// Builds the crosswalk from the membership table.
///
/// Each DA is split across its FSAs in proportion to the number of postal
/// codes it has in each of them.
///
/// Arguments:
/// * `membership` the pre-aggregated membership table. A (DA, FSA) pair may only
/// appear once.
pub fn build_crosswalk(membership: &[MembershipRecord]) -> Result<Crosswalk, CrosswalkError> {
    info!(
        "build_crosswalk: processing {:?} membership records",
        membership.len()
    );

    // DA id -> FSA id -> postal code count
    let mut groups: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    for r in membership.iter() {
        let fsas = groups.entry(r.da_id.as_str()).or_default();
        if fsas
            .insert(r.fsa_id.as_str(), r.postal_code_count)
            .is_some()
        {
            return Err(CrosswalkError::DuplicateKey {
                da_id: r.da_id.clone(),
                fsa_id: r.fsa_id.clone(),
            });
        }
    }
    debug!("build_crosswalk: {:?} distinct DAs", groups.len());

    let mut weights: Vec<CrosswalkWeight> = Vec::new();
    for (da_id, fsas) in groups.iter() {
        // Summed in u128: large counts must not wrap around.
        let total: u128 = fsas.values().map(|c| *c as u128).sum();
        if total == 0 {
            return Err(CrosswalkError::InconsistentMembership {
                da_id: da_id.to_string(),
            });
        }

        let mut sum = 0.0;
        for (fsa_id, count) in fsas.iter() {
            if *count == 0 {
                debug!(
                    "build_crosswalk: DA {}: skipping FSA {} with no postal code",
                    da_id, fsa_id
                );
                continue;
            }
            let weight = *count as f64 / total as f64;
            sum += weight;
            weights.push(CrosswalkWeight {
                da_id: da_id.to_string(),
                fsa_id: fsa_id.to_string(),
                weight,
            });
        }
        check_weight_sum(da_id, sum, WEIGHT_SUM_TOLERANCE)?;
    }

    let crosswalk = Crosswalk::from_sorted(weights);
    info!(
        "build_crosswalk: {:?} weights over {:?} DAs and {:?} FSAs",
        crosswalk.len(),
        crosswalk.da_count(),
        crosswalk.fsa_ids().len()
    );
    Ok(crosswalk)
}

// **** Aggregation ****

/// Redistributes the DA measures onto the FSAs, proportionally to the weights
/// of the crosswalk.
///
/// The output is sorted by FSA id, then by attribute.
pub fn aggregate(
    crosswalk: &Crosswalk,
    measures: &[MeasureRecord],
) -> Result<Vec<AggregatedMeasure>, CrosswalkError> {
    aggregate_with(crosswalk, measures, AllocationMode::Proportional)
}

/// Redistributes the DA measures onto the FSAs with the given allocation mode.
///
/// The first invalid record aborts the aggregation: no partial output is
/// returned.
pub fn aggregate_with(
    crosswalk: &Crosswalk,
    measures: &[MeasureRecord],
    mode: AllocationMode,
) -> Result<Vec<AggregatedMeasure>, CrosswalkError> {
    info!(
        "aggregate_with: processing {:?} measures with {} allocation",
        measures.len(),
        mode.name()
    );

    // (FSA id, attribute) -> value
    let mut tally: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for m in measures.iter() {
        if !m.value.is_finite() || m.value < 0.0 {
            return Err(CrosswalkError::InvalidValue {
                da_id: m.da_id.clone(),
                attribute: m.attribute.clone(),
                value: m.value,
            });
        }
        let rows = crosswalk
            .weights_for(&m.da_id)
            .ok_or_else(|| CrosswalkError::UnmappedDa {
                da_id: m.da_id.clone(),
            })?;

        match mode {
            AllocationMode::Proportional => {
                for w in rows.iter() {
                    let e = tally
                        .entry((w.fsa_id.as_str(), m.attribute.as_str()))
                        .or_insert(0.0);
                    *e += m.value * w.weight;
                }
            }
            AllocationMode::Dominant => {
                // Rows of a DA are never empty.
                if let Some(w) = dominant_of(rows) {
                    let e = tally
                        .entry((w.fsa_id.as_str(), m.attribute.as_str()))
                        .or_insert(0.0);
                    *e += m.value;
                }
            }
        }
    }

    debug!("aggregate_with: {:?} (FSA, attribute) cells", tally.len());
    Ok(tally
        .into_iter()
        .map(|((fsa_id, attribute), value)| AggregatedMeasure {
            fsa_id: fsa_id.to_string(),
            attribute: attribute.to_string(),
            value,
        })
        .collect())
}

// **** Checks and summaries ****

/// The total of each attribute over all the DAs, sorted by attribute.
pub fn measure_totals(measures: &[MeasureRecord]) -> BTreeMap<String, f64> {
    let mut res: BTreeMap<String, f64> = BTreeMap::new();
    for m in measures.iter() {
        *res.entry(m.attribute.clone()).or_insert(0.0) += m.value;
    }
    res
}

/// The total of each attribute over all the FSAs, sorted by attribute.
pub fn aggregated_totals(aggregated: &[AggregatedMeasure]) -> BTreeMap<String, f64> {
    let mut res: BTreeMap<String, f64> = BTreeMap::new();
    for a in aggregated.iter() {
        *res.entry(a.attribute.clone()).or_insert(0.0) += a.value;
    }
    res
}

/// Checks that the redistribution neither created nor lost any amount.
///
/// The tolerance is relative to the input total of each attribute, with a floor
/// of 1.
pub fn check_conservation(
    measures: &[MeasureRecord],
    aggregated: &[AggregatedMeasure],
    tolerance: f64,
) -> Result<(), CrosswalkError> {
    let expected_totals = measure_totals(measures);
    let actual_totals = aggregated_totals(aggregated);

    let mut attributes: Vec<&String> = expected_totals.keys().collect();
    attributes.extend(actual_totals.keys());
    attributes.sort();
    attributes.dedup();

    for attribute in attributes {
        let expected = expected_totals.get(attribute).cloned().unwrap_or(0.0);
        let actual = actual_totals.get(attribute).cloned().unwrap_or(0.0);
        debug!(
            "check_conservation: {}: expected {:?} actual {:?}",
            attribute, expected, actual
        );
        if (actual - expected).abs() > tolerance * expected.abs().max(1.0) {
            return Err(CrosswalkError::Conservation {
                attribute: attribute.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// For each FSA, the share of each attribute in the total of the FSA.
///
/// The output follows the order of the input.
pub fn fsa_shares(aggregated: &[AggregatedMeasure]) -> Vec<FsaShare> {
    let mut fsa_totals: HashMap<&str, f64> = HashMap::new();
    for a in aggregated.iter() {
        *fsa_totals.entry(a.fsa_id.as_str()).or_insert(0.0) += a.value;
    }
    aggregated
        .iter()
        .map(|a| {
            let total = fsa_totals.get(a.fsa_id.as_str()).cloned().unwrap_or(0.0);
            FsaShare {
                fsa_id: a.fsa_id.clone(),
                attribute: a.attribute.clone(),
                value: a.value,
                share: if total > 0.0 { a.value / total } else { 0.0 },
            }
        })
        .collect()
}

// **** DA counts ****

/// The number of DAs of each FSA, each DA being assigned to its dominant FSA.
pub fn da_counts_per_fsa(crosswalk: &Crosswalk) -> BTreeMap<String, u64> {
    let mut res: BTreeMap<String, u64> = BTreeMap::new();
    for rows in crosswalk.index.values() {
        if let Some(w) = dominant_of(&crosswalk.weights[rows.clone()]) {
            *res.entry(w.fsa_id.clone()).or_insert(0) += 1;
        }
    }
    res
}

pub fn da_count_stats(counts: &BTreeMap<String, u64>) -> DaCountStats {
    let mut values: Vec<u64> = counts.values().cloned().collect();
    values.sort_unstable();
    let n = values.len();
    if n == 0 {
        return DaCountStats {
            fsa_count: 0,
            mean: 0.0,
            median: 0.0,
        };
    }
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
    };
    DaCountStats {
        fsa_count: n,
        mean,
        median,
    }
}

/// The distinct DAs of the measures that are absent from the crosswalk, sorted.
pub fn unmapped_das(crosswalk: &Crosswalk, measures: &[MeasureRecord]) -> Vec<String> {
    let res: BTreeSet<&str> = measures
        .iter()
        .filter(|m| crosswalk.weights_for(&m.da_id).is_none())
        .map(|m| m.da_id.as_str())
        .collect();
    res.into_iter().map(|s| s.to_string()).collect()
}

/// Counts the DAs of each FSA by category of a categorical measure.
///
/// The value of a measure is its category: a DA in the third quintile of
/// material deprivation is the record `(da, "material_deprivation", 3)`. Each
/// DA goes entirely to its dominant FSA. The proportions of the categories of
/// one (FSA, attribute) pair sum to 1.
///
/// The output is sorted by FSA id, attribute and category.
pub fn count_das_by_category(
    crosswalk: &Crosswalk,
    measures: &[MeasureRecord],
) -> Result<Vec<DaCount>, CrosswalkError> {
    // (FSA id, attribute) -> category -> DA ids
    let mut groups: BTreeMap<(&str, &str), BTreeMap<String, BTreeSet<&str>>> = BTreeMap::new();
    for m in measures.iter() {
        if !m.value.is_finite() {
            return Err(CrosswalkError::InvalidValue {
                da_id: m.da_id.clone(),
                attribute: m.attribute.clone(),
                value: m.value,
            });
        }
        let w = crosswalk
            .dominant_fsa(&m.da_id)
            .ok_or_else(|| CrosswalkError::UnmappedDa {
                da_id: m.da_id.clone(),
            })?;
        groups
            .entry((w.fsa_id.as_str(), m.attribute.as_str()))
            .or_default()
            .entry(format!("{}", m.value))
            .or_default()
            .insert(m.da_id.as_str());
    }

    let mut res: Vec<DaCount> = Vec::new();
    for ((fsa_id, attribute), categories) in groups.iter() {
        let total_das: u64 = categories.values().map(|das| das.len() as u64).sum();
        for (category, das) in categories.iter() {
            let da_count = das.len() as u64;
            res.push(DaCount {
                fsa_id: fsa_id.to_string(),
                attribute: attribute.to_string(),
                category: category.clone(),
                da_count,
                total_das,
                proportion: da_count as f64 / total_das as f64,
            });
        }
    }
    debug!("count_das_by_category: {:?} rows", res.len());
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn weight_of(cw: &Crosswalk, da_id: &str, fsa_id: &str) -> Option<f64> {
        cw.weights_for(da_id)
            .and_then(|rows| rows.iter().find(|w| w.fsa_id == fsa_id))
            .map(|w| w.weight)
    }

    fn sample_membership() -> Vec<MembershipRecord> {
        vec![
            MembershipRecord::new("D1", "F1", 30),
            MembershipRecord::new("D1", "F2", 70),
            MembershipRecord::new("D3", "F2", 5),
            MembershipRecord::new("D4", "F1", 1),
            MembershipRecord::new("D4", "F2", 1),
            MembershipRecord::new("D4", "F3", 1),
        ]
    }

    #[test]
    fn weights_of_each_da_sum_to_one() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        assert_eq!(cw.da_count(), 3);
        for da_id in ["D1", "D3", "D4"] {
            let sum: f64 = cw.weights_for(da_id).unwrap().iter().map(|w| w.weight).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{} sums to {}", da_id, sum);
        }
    }

    #[test]
    fn split_da() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        assert!((weight_of(&cw, "D1", "F1").unwrap() - 0.3).abs() < 1e-12);
        assert!((weight_of(&cw, "D1", "F2").unwrap() - 0.7).abs() < 1e-12);

        let measures = vec![MeasureRecord::new("D1", "pop", 100.0)];
        let res = aggregate(&cw, &measures).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].fsa_id, "F1");
        assert_eq!(res[0].attribute, "pop");
        assert!((res[0].value - 30.0).abs() < 1e-9);
        assert_eq!(res[1].fsa_id, "F2");
        assert!((res[1].value - 70.0).abs() < 1e-9);
    }

    #[test]
    fn single_fsa_da() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        assert_eq!(weight_of(&cw, "D3", "F2"), Some(1.0));

        let measures = vec![MeasureRecord::new("D3", "age_0_4_male", 42.5)];
        let res = aggregate(&cw, &measures).unwrap();
        assert_eq!(
            res,
            vec![AggregatedMeasure {
                fsa_id: "F2".to_string(),
                attribute: "age_0_4_male".to_string(),
                value: 42.5,
            }]
        );
    }

    #[test]
    fn build_is_idempotent_and_order_independent() {
        init();
        let membership = sample_membership();
        let mut reversed = membership.clone();
        reversed.reverse();

        let cw1 = build_crosswalk(&membership).unwrap();
        let cw2 = build_crosswalk(&membership).unwrap();
        let cw3 = build_crosswalk(&reversed).unwrap();
        assert_eq!(cw1, cw2);
        assert_eq!(cw1.weights(), cw3.weights());
        assert_eq!(cw1.fingerprint(), cw3.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let cw1 = build_crosswalk(&sample_membership()).unwrap();
        let mut membership = sample_membership();
        membership[0].postal_code_count = 31;
        let cw2 = build_crosswalk(&membership).unwrap();
        assert_ne!(cw1.fingerprint(), cw2.fingerprint());
    }

    #[test]
    fn zero_count_da() {
        init();
        let membership = vec![
            MembershipRecord::new("D1", "F1", 3),
            MembershipRecord::new("D2", "F1", 0),
            MembershipRecord::new("D2", "F2", 0),
        ];
        assert_eq!(
            build_crosswalk(&membership),
            Err(CrosswalkError::InconsistentMembership {
                da_id: "D2".to_string()
            })
        );
    }

    #[test]
    fn zero_count_row_in_populated_da_is_skipped() {
        let membership = vec![
            MembershipRecord::new("D1", "F1", 4),
            MembershipRecord::new("D1", "F2", 0),
        ];
        let cw = build_crosswalk(&membership).unwrap();
        assert_eq!(cw.len(), 1);
        assert_eq!(weight_of(&cw, "D1", "F1"), Some(1.0));
        assert_eq!(weight_of(&cw, "D1", "F2"), None);
    }

    #[test]
    fn duplicate_pair() {
        let membership = vec![
            MembershipRecord::new("D1", "F1", 3),
            MembershipRecord::new("D1", "F2", 1),
            MembershipRecord::new("D1", "F1", 2),
        ];
        assert_eq!(
            build_crosswalk(&membership),
            Err(CrosswalkError::DuplicateKey {
                da_id: "D1".to_string(),
                fsa_id: "F1".to_string()
            })
        );
    }

    #[test]
    fn unmapped_da() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let measures = vec![
            MeasureRecord::new("D1", "pop", 10.0),
            MeasureRecord::new("D9", "pop", 5.0),
        ];
        assert_eq!(
            aggregate(&cw, &measures),
            Err(CrosswalkError::UnmappedDa {
                da_id: "D9".to_string()
            })
        );
    }

    #[test]
    fn negative_and_nan_values() {
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let res = aggregate(&cw, &[MeasureRecord::new("D1", "pop", -1.0)]);
        assert!(matches!(
            res,
            Err(CrosswalkError::InvalidValue { ref da_id, .. }) if da_id == "D1"
        ));
        let res = aggregate(&cw, &[MeasureRecord::new("D3", "pop", f64::NAN)]);
        assert!(matches!(res, Err(CrosswalkError::InvalidValue { .. })));
    }

    #[test]
    fn conservation_of_totals() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let measures = vec![
            MeasureRecord::new("D1", "pop", 100.0),
            MeasureRecord::new("D3", "pop", 7.0),
            MeasureRecord::new("D4", "pop", 10.0),
            MeasureRecord::new("D4", "households", 4.0),
            MeasureRecord::new("D1", "households", 33.0),
        ];
        let res = aggregate(&cw, &measures).unwrap();

        let totals = aggregated_totals(&res);
        assert!((totals["pop"] - 117.0).abs() < 1e-9);
        assert!((totals["households"] - 37.0).abs() < 1e-9);
        check_conservation(&measures, &res, 1e-9).unwrap();

        let mut tampered = res.clone();
        tampered[0].value += 1.0;
        assert!(matches!(
            check_conservation(&measures, &tampered, 1e-9),
            Err(CrosswalkError::Conservation { .. })
        ));
    }

    #[test]
    fn output_is_sorted_by_fsa_then_attribute() {
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let measures = vec![
            MeasureRecord::new("D4", "pop", 3.0),
            MeasureRecord::new("D4", "b", 3.0),
            MeasureRecord::new("D1", "a", 10.0),
        ];
        let res = aggregate(&cw, &measures).unwrap();
        let keys: Vec<(String, String)> = res
            .iter()
            .map(|a| (a.fsa_id.clone(), a.attribute.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 8);
    }

    #[test]
    fn dominant_allocation() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        assert_eq!(cw.dominant_fsa("D1").map(|w| w.fsa_id.as_str()), Some("F2"));
        // Three-way tie: the smallest FSA id wins.
        assert_eq!(cw.dominant_fsa("D4").map(|w| w.fsa_id.as_str()), Some("F1"));

        let measures = vec![
            MeasureRecord::new("D1", "pop", 100.0),
            MeasureRecord::new("D4", "pop", 9.0),
        ];
        let res = aggregate_with(&cw, &measures, AllocationMode::Dominant).unwrap();
        assert_eq!(
            res,
            vec![
                AggregatedMeasure {
                    fsa_id: "F1".to_string(),
                    attribute: "pop".to_string(),
                    value: 9.0,
                },
                AggregatedMeasure {
                    fsa_id: "F2".to_string(),
                    attribute: "pop".to_string(),
                    value: 100.0,
                },
            ]
        );
    }

    #[test]
    fn precomputed_weights() {
        let weights = vec![
            CrosswalkWeight {
                da_id: "D1".to_string(),
                fsa_id: "F2".to_string(),
                weight: 0.6667,
            },
            CrosswalkWeight {
                da_id: "D1".to_string(),
                fsa_id: "F1".to_string(),
                weight: 0.3333,
            },
        ];
        let cw = Crosswalk::from_weights(&weights, 1e-3).unwrap();
        assert_eq!(cw.weights()[0].fsa_id, "F1");
        assert!(matches!(
            Crosswalk::from_weights(&weights[..1], 1e-3),
            Err(CrosswalkError::Normalization { .. })
        ));

        let mut duplicated = weights.clone();
        duplicated.push(weights[0].clone());
        assert!(matches!(
            Crosswalk::from_weights(&duplicated, 1e-3),
            Err(CrosswalkError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn shares_per_fsa() {
        let aggregated = vec![
            AggregatedMeasure {
                fsa_id: "F1".to_string(),
                attribute: "q1".to_string(),
                value: 25.0,
            },
            AggregatedMeasure {
                fsa_id: "F1".to_string(),
                attribute: "q2".to_string(),
                value: 75.0,
            },
            AggregatedMeasure {
                fsa_id: "F2".to_string(),
                attribute: "q1".to_string(),
                value: 0.0,
            },
        ];
        let shares = fsa_shares(&aggregated);
        assert_eq!(shares.len(), 3);
        assert!((shares[0].share - 0.25).abs() < 1e-12);
        assert!((shares[1].share - 0.75).abs() < 1e-12);
        assert_eq!(shares[2].share, 0.0);
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let membership = vec![
            MembershipRecord::new("D1", "F1", u64::MAX),
            MembershipRecord::new("D1", "F2", 1),
        ];
        let cw = build_crosswalk(&membership).unwrap();
        assert_eq!(weight_of(&cw, "D1", "F1"), Some(1.0));
        let small = weight_of(&cw, "D1", "F2").unwrap();
        assert!(small > 0.0 && small < 1e-18);
    }

    #[test]
    fn first_invalid_da_is_reported() {
        let weights: Vec<CrosswalkWeight> = ["D7", "D3", "D5"]
            .iter()
            .map(|da_id| CrosswalkWeight {
                da_id: da_id.to_string(),
                fsa_id: "F1".to_string(),
                weight: 0.5,
            })
            .collect();
        for _ in 0..10 {
            assert_eq!(
                Crosswalk::from_weights(&weights, 1e-9),
                Err(CrosswalkError::Normalization {
                    da_id: "D3".to_string(),
                    sum: 0.5
                })
            );
        }
    }

    #[test]
    fn das_per_fsa() {
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let counts = da_counts_per_fsa(&cw);
        // D1 -> F2, D3 -> F2, D4 -> F1 (tie)
        assert_eq!(counts.get("F1"), Some(&1));
        assert_eq!(counts.get("F2"), Some(&2));
        assert_eq!(counts.get("F3"), None);

        let stats = da_count_stats(&counts);
        assert_eq!(stats.fsa_count, 2);
        assert!((stats.mean - 1.5).abs() < 1e-12);
        assert!((stats.median - 1.5).abs() < 1e-12);

        let empty = da_count_stats(&BTreeMap::new());
        assert_eq!(empty.fsa_count, 0);
        assert_eq!(empty.median, 0.0);
    }

    #[test]
    fn unmapped_das_are_listed_once() {
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let measures = vec![
            MeasureRecord::new("D9", "pop", 1.0),
            MeasureRecord::new("D1", "pop", 1.0),
            MeasureRecord::new("D8", "pop", 1.0),
            MeasureRecord::new("D9", "households", 1.0),
        ];
        assert_eq!(
            unmapped_das(&cw, &measures),
            vec!["D8".to_string(), "D9".to_string()]
        );
    }

    #[test]
    fn das_by_category() {
        init();
        let cw = build_crosswalk(&sample_membership()).unwrap();
        let measures = vec![
            MeasureRecord::new("D1", "deprivation", 3.0),
            MeasureRecord::new("D3", "deprivation", 5.0),
            MeasureRecord::new("D4", "deprivation", 3.0),
        ];
        let res = count_das_by_category(&cw, &measures).unwrap();
        assert_eq!(
            res,
            vec![
                DaCount {
                    fsa_id: "F1".to_string(),
                    attribute: "deprivation".to_string(),
                    category: "3".to_string(),
                    da_count: 1,
                    total_das: 1,
                    proportion: 1.0,
                },
                DaCount {
                    fsa_id: "F2".to_string(),
                    attribute: "deprivation".to_string(),
                    category: "3".to_string(),
                    da_count: 1,
                    total_das: 2,
                    proportion: 0.5,
                },
                DaCount {
                    fsa_id: "F2".to_string(),
                    attribute: "deprivation".to_string(),
                    category: "5".to_string(),
                    da_count: 1,
                    total_das: 2,
                    proportion: 0.5,
                },
            ]
        );

        let res = count_das_by_category(&cw, &[MeasureRecord::new("D9", "deprivation", 1.0)]);
        assert!(matches!(res, Err(CrosswalkError::UnmappedDa { .. })));
    }

    #[test]
    fn empty_inputs() {
        let cw = build_crosswalk(&[]).unwrap();
        assert!(cw.is_empty());
        assert_eq!(aggregate(&cw, &[]).unwrap(), vec![]);
    }
}
