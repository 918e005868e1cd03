//! Weighted selection of the next operation kind.

use crate::{Error, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// The kinds of operations a workload can issue. The operation itself (keys, fields, values) is
/// generated by the workload once the kind is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Update,
    Insert,
    Scan,
    ReadModifyWrite,
    MultiRead,
    MultiUpdate,
    ScanWrite,
    Complex,
}

impl OperationKind {
    /// The name under which the operation's latency and status are reported.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Read => "READ",
            OperationKind::Update => "UPDATE",
            OperationKind::Insert => "INSERT",
            OperationKind::Scan => "SCAN",
            OperationKind::ReadModifyWrite => "READ-MODIFY-WRITE",
            OperationKind::MultiRead => "MULTIREAD",
            OperationKind::MultiUpdate => "MULTIUPDATE",
            OperationKind::ScanWrite => "SCANWRITE",
            OperationKind::Complex => "COMPLEX",
        }
    }
}

/// Relative weights of each operation kind. They do not need to sum to anything in particular.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Proportions {
    pub read: f64,
    pub update: f64,
    pub insert: f64,
    pub scan: f64,
    pub read_modify_write: f64,
    pub multi_read: f64,
    pub multi_update: f64,
    pub scan_write: f64,
    pub complex: f64,
}

impl Proportions {
    fn entries(&self) -> [(OperationKind, f64); 9] {
        [
            (OperationKind::Read, self.read),
            (OperationKind::Update, self.update),
            (OperationKind::Insert, self.insert),
            (OperationKind::Scan, self.scan),
            (OperationKind::ReadModifyWrite, self.read_modify_write),
            (OperationKind::MultiRead, self.multi_read),
            (OperationKind::MultiUpdate, self.multi_update),
            (OperationKind::ScanWrite, self.scan_write),
            (OperationKind::Complex, self.complex),
        ]
    }
}

/// Chooses operation kinds with probability proportional to their weights. Kinds with zero
/// weight are never chosen.
#[derive(Debug)]
pub struct OperationChooser {
    kinds: Vec<OperationKind>,
    dist: Option<WeightedIndex<f64>>,
}

impl OperationChooser {
    pub fn new(proportions: &Proportions) -> Result<Self> {
        let mut kinds = Vec::new();
        let mut weights = Vec::new();
        for (kind, weight) in proportions.entries() {
            if !(weight >= 0.0) || weight.is_infinite() {
                return Err(Error::invalid(
                    "operation proportion",
                    format!("{} has weight {}", kind.name(), weight),
                ));
            }
            if weight > 0.0 {
                kinds.push(kind);
                weights.push(weight);
            }
        }
        let dist = match weights.is_empty() {
            true => None,
            false => Some(
                WeightedIndex::new(&weights)
                    .map_err(|e| Error::invalid("operation proportion", e))?,
            ),
        };
        Ok(Self { kinds, dist })
    }

    /// Draw the next operation kind, or `None` if no kind has a positive weight.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<OperationKind> {
        self.dist.as_ref().map(|d| self.kinds[d.sample(rng)])
    }

    /// Whether `kind` can ever be chosen.
    pub fn contains(&self, kind: OperationKind) -> bool {
        self.kinds.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    #[test]
    fn one_type_only() {
        let mut rng = rand::rng();
        let chooser = OperationChooser::new(&Proportions {
            scan: 0.3,
            ..Default::default()
        })
        .unwrap();
        for _ in 0..100 {
            assert_eq!(chooser.choose(&mut rng), Some(OperationKind::Scan));
        }
        assert!(chooser.contains(OperationKind::Scan));
        assert!(!chooser.contains(OperationKind::Read));
    }

    #[test]
    fn nothing_to_choose() {
        let mut rng = rand::rng();
        let chooser = OperationChooser::new(&Proportions::default()).unwrap();
        assert_eq!(chooser.choose(&mut rng), None);
    }

    #[test]
    fn invalid_weights() {
        let p = Proportions {
            read: -0.1,
            ..Default::default()
        };
        assert!(OperationChooser::new(&p).is_err());
        let p = Proportions {
            update: f64::NAN,
            ..Default::default()
        };
        assert!(OperationChooser::new(&p).is_err());
    }

    #[test]
    fn weighted_mix() {
        let mut rng = rand::rng();
        let chooser = OperationChooser::new(&Proportions {
            read: 0.5,
            update: 0.25,
            multi_update: 0.25,
            ..Default::default()
        })
        .unwrap();
        let mut counts: HashMap<OperationKind, u64> = HashMap::new();
        for _ in 0..1_000_000 {
            *counts.entry(chooser.choose(&mut rng).unwrap()).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 3);
        let read = counts[&OperationKind::Read];
        let update = counts[&OperationKind::Update];
        let multi = counts[&OperationKind::MultiUpdate];
        assert!(read > 490_000 && read < 510_000);
        assert!(update > 240_000 && update < 260_000);
        assert!(multi > 240_000 && multi < 260_000);
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let mut rng = rand::rng();
        let chooser = OperationChooser::new(&Proportions {
            read: 5.0,
            insert: 95.0,
            ..Default::default()
        })
        .unwrap();
        let inserts = (0..100_000)
            .filter(|_| chooser.choose(&mut rng) == Some(OperationKind::Insert))
            .count();
        assert!(inserts > 94_000 && inserts < 96_000);
    }
}
