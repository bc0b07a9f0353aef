//! Stratified train/test split and stratified k-fold assignment over row indices.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn shuffled_classes(labels: &[bool], rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let (mut pos, mut neg): (Vec<usize>, Vec<usize>) = (0..labels.len()).partition(|&i| labels[i]);
    pos.shuffle(rng);
    neg.shuffle(rng);
    (pos, neg)
}

/// Hold out `test_fraction` of each class. Both sides keep at least one row of a class that has
/// two or more rows.
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let (pos, neg) = shuffled_classes(labels, &mut rng);

    let held_out = |n: usize| -> usize {
        if n < 2 {
            return 0;
        }
        ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1)
    };
    let (tp, tn) = (held_out(pos.len()), held_out(neg.len()));

    let mut test: Vec<usize> = pos[..tp].iter().chain(&neg[..tn]).copied().collect();
    let mut train: Vec<usize> = pos[tp..].iter().chain(&neg[tn..]).copied().collect();
    test.shuffle(&mut rng);
    train.shuffle(&mut rng);
    Split { train, test }
}

/// `k` folds over positions `0..labels.len()`, each class dealt round-robin so every fold keeps
/// the overall class ratio. Returns (train, validation) position lists per fold.
pub fn stratified_kfold(labels: &[bool], k: usize, seed: u64) -> Vec<Split> {
    let k = k.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let (pos, neg) = shuffled_classes(labels, &mut rng);

    let mut fold_of = vec![0usize; labels.len()];
    for (j, &i) in pos.iter().chain(&neg).enumerate() {
        fold_of[i] = j % k;
    }

    (0..k)
        .map(|f| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == f);
            Split { train, test }
        })
        .collect()
}
