//! Stratified, seeded train/test split.

use super::ClassifierError;
use crate::models::damage_record::DamageLevel;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Sample indices of each side of the split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `labels` into train/test index sets keeping class proportions.
///
/// `n_test = ceil(test_size * n)`. Every class needs at least two members and
/// both sides must hold at least one sample per class.
pub fn stratified_split(
    labels: &[DamageLevel],
    test_size: f64,
    seed: u64,
) -> Result<Split, ClassifierError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ClassifierError::InvalidTestSize(test_size));
    }

    let n = labels.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    let groups: Vec<(DamageLevel, Vec<usize>)> = DamageLevel::ALL
        .iter()
        .map(|level| {
            let idx = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| *l == level)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            (*level, idx)
        })
        .filter(|(_, idx)| !idx.is_empty())
        .collect();

    if let Some((level, _)) = groups.iter().find(|(_, idx)| idx.len() < 2) {
        return Err(ClassifierError::ClassTooSmall(*level));
    }
    let n_classes = groups.len();
    if n_test < n_classes || n_train < n_classes {
        return Err(ClassifierError::SplitTooSmall {
            train: n_train,
            test: n_test,
            classes: n_classes,
        });
    }

    let quotas = allocate(&groups, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(n_train),
        test: Vec::with_capacity(n_test),
    };
    for ((_, idx), quota) in groups.iter().zip(quotas) {
        let mut shuffled = idx.clone();
        shuffled.shuffle(&mut rng);
        split.test.extend_from_slice(&shuffled[..quota]);
        split.train.extend_from_slice(&shuffled[quota..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Largest-remainder allocation of `n_test` across classes, leaving every
/// class at least one training sample.
fn allocate(groups: &[(DamageLevel, Vec<usize>)], n: usize, n_test: usize) -> Vec<usize> {
    let exact: Vec<f64> = groups
        .iter()
        .map(|(_, idx)| idx.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = groups
        .iter()
        .zip(&exact)
        .map(|((_, idx), q)| (q.floor() as usize).min(idx.len() - 1))
        .collect();

    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(quotas.iter().sum());
    while remaining > 0 {
        let mut progressed = false;
        for &i in &order {
            if remaining == 0 {
                break;
            }
            if quotas[i] + 1 < groups[i].1.len() {
                quotas[i] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;
    use DamageLevel::*;

    fn labels(ringan: usize, sedang: usize, berat: usize) -> Vec<DamageLevel> {
        let mut v = vec![Ringan; ringan];
        v.extend(vec![Sedang; sedang]);
        v.extend(vec![Berat; berat]);
        v
    }

    #[test]
    fn keeps_class_proportions() {
        let y = labels(10, 6, 4);
        let split = stratified_split(&y, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.train.len(), 16);

        let count = |set: &[usize], level: DamageLevel| set.iter().filter(|&&i| y[i] == level).count();
        assert_eq!(count(&split.test, Ringan), 2);
        assert_eq!(count(&split.test, Sedang), 1);
        assert_eq!(count(&split.test, Berat), 1);
    }

    #[test]
    fn covers_every_sample_exactly_once() {
        let y = labels(7, 5, 3);
        let split = stratified_split(&y, 0.3, 42).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
    }

    #[test]
    fn is_deterministic_for_a_seed() {
        let y = labels(8, 8, 8);
        assert_eq!(
            stratified_split(&y, 0.25, 42).unwrap(),
            stratified_split(&y, 0.25, 42).unwrap()
        );
    }

    #[test]
    fn rejects_singleton_classes() {
        let y = labels(9, 1, 0);
        assert_eq!(
            stratified_split(&y, 0.2, 42).unwrap_err(),
            ClassifierError::ClassTooSmall(Sedang)
        );
    }

    #[test]
    fn rejects_test_set_smaller_than_class_count() {
        let y = labels(4, 4, 4);
        assert!(matches!(
            stratified_split(&y, 0.1, 42),
            Err(ClassifierError::SplitTooSmall { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_test_size() {
        let y = labels(5, 5, 5);
        assert!(stratified_split(&y, 0.0, 42).is_err());
        assert!(stratified_split(&y, 1.0, 42).is_err());
    }
}
