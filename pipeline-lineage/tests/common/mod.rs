// Test Adapters
// Small data-processing modules and seeded datasets for the pipeline scenarios

#![allow(dead_code)]

use pipeline_lineage::{init_args, Applicable, Fittable, ModuleError, OutputStore, Predictable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;

/// Payload flowing between stages
#[derive(Clone)]
pub enum Data {
    Features(Vec<Vec<f64>>),
    Labels(Vec<f64>),
    Score(f64),
    Importances(Vec<f64>),
    Model(Arc<dyn Predictable<Data>>),
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Features(rows) => write!(f, "Features({} rows)", rows.len()),
            Self::Labels(labels) => write!(f, "Labels({})", labels.len()),
            Self::Score(score) => write!(f, "Score({})", score),
            Self::Importances(values) => write!(f, "Importances({:?})", values),
            Self::Model(_) => write!(f, "Model"),
        }
    }
}

impl Data {
    pub fn features(&self) -> Result<&[Vec<f64>], ModuleError> {
        match self {
            Self::Features(rows) => Ok(rows),
            other => Err(ModuleError::new(format!("expected features, got {:?}", other))),
        }
    }

    pub fn labels(&self) -> Result<&[f64], ModuleError> {
        match self {
            Self::Labels(labels) => Ok(labels),
            other => Err(ModuleError::new(format!("expected labels, got {:?}", other))),
        }
    }

    pub fn model(&self) -> Result<&Arc<dyn Predictable<Data>>, ModuleError> {
        match self {
            Self::Model(model) => Ok(model),
            other => Err(ModuleError::new(format!("expected a model, got {:?}", other))),
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(score) => Some(*score),
            _ => None,
        }
    }

    fn rows(&self) -> Result<usize, ModuleError> {
        match self {
            Self::Features(rows) => Ok(rows.len()),
            Self::Labels(labels) => Ok(labels.len()),
            other => Err(ModuleError::new(format!("cannot resample {:?}", other))),
        }
    }

    fn select(&self, indices: &[usize]) -> Result<Data, ModuleError> {
        match self {
            Self::Features(rows) => Ok(Self::Features(
                indices.iter().map(|&i| rows[i].clone()).collect(),
            )),
            Self::Labels(labels) => Ok(Self::Labels(indices.iter().map(|&i| labels[i]).collect())),
            other => Err(ModuleError::new(format!("cannot resample {:?}", other))),
        }
    }
}

pub fn arg<'a>(inputs: &[&'a Data], position: usize) -> Result<&'a Data, ModuleError> {
    inputs
        .get(position)
        .copied()
        .ok_or_else(|| ModuleError::new(format!("missing input {}", position)))
}

/// The four seeded stores of a train/test split
pub struct Split {
    pub x_train: Vec<Vec<f64>>,
    pub x_test: Vec<Vec<f64>>,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

impl Split {
    pub fn into_stores(self) -> [OutputStore<Data>; 4] {
        let stores = init_args(
            vec![
                Data::Features(self.x_train),
                Data::Features(self.x_test),
                Data::Labels(self.y_train),
                Data::Labels(self.y_test),
            ],
            &["X_train", "X_test", "y_train", "y_test"],
        )
        .unwrap();
        match stores.try_into() {
            Ok(stores) => stores,
            Err(stores) => panic!("expected four stores, got {:?}", stores),
        }
    }
}

/// Shuffle rows with `seed` and hold out a quarter of them for testing
pub fn train_test_split(x: Vec<Vec<f64>>, y: Vec<f64>, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_test = (x.len() + 3) / 4;
    let (test, train) = indices.split_at(n_test);
    Split {
        x_train: train.iter().map(|&i| x[i].clone()).collect(),
        x_test: test.iter().map(|&i| x[i].clone()).collect(),
        y_train: train.iter().map(|&i| y[i]).collect(),
        y_test: test.iter().map(|&i| y[i]).collect(),
    }
}

/// Balanced two-class data whose first three features separate the classes
pub fn make_classification(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels: Vec<f64> = (0..n_samples).map(|i| (i % 2) as f64).collect();
    labels.shuffle(&mut rng);

    let rows: Vec<Vec<f64>> = labels
        .iter()
        .map(|&label| {
            let sign = if label > 0.5 { 1.0 } else { -1.0 };
            (0..n_features)
                .map(|j| {
                    let noise: f64 = rng.gen_range(-1.0..1.0);
                    if j < 3 {
                        2.0 * sign + noise
                    } else {
                        noise
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();
    (rows, labels)
}

/// Uniform features with `y = 3 x0 - 2 x1` plus a little noise
pub fn make_regression(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let noise: f64 = rng.gen_range(-0.05..0.05);
        targets.push(3.0 * row[0] - 2.0 * row[1] + noise);
        rows.push(row);
    }
    (rows, targets)
}

/// Bootstrap resampler drawing `n_samples` rows with replacement.
///
/// Paired application resamples every input with the same row draw.
pub struct Bootstrap {
    pub n_samples: usize,
    pub seed: u64,
}

impl Applicable<Data> for Bootstrap {
    fn apply(&self, inputs: &[&Data]) -> Result<Data, ModuleError> {
        self.apply_paired(inputs)?
            .into_iter()
            .next()
            .ok_or_else(|| ModuleError::new("nothing to resample"))
    }

    fn apply_paired(&self, inputs: &[&Data]) -> Result<Vec<Data>, ModuleError> {
        let rows = arg(inputs, 0)?.rows()?;
        if rows == 0 {
            return Err(ModuleError::new("cannot resample an empty input"));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let indices: Vec<usize> = (0..self.n_samples).map(|_| rng.gen_range(0..rows)).collect();
        inputs.iter().map(|input| input.select(&indices)).collect()
    }
}

/// Column selection, as a feature extraction step
pub fn columns(selected: Vec<usize>) -> Arc<dyn Applicable<Data>> {
    Arc::new(pipeline_lineage::module_fn(move |inputs: &[&Data]| {
        let rows = arg(inputs, 0)?.features()?;
        Ok(Data::Features(
            rows.iter()
                .map(|row| selected.iter().map(|&j| row[j]).collect::<Vec<f64>>())
                .collect(),
        ))
    }))
}

/// Metric over (predictions, truth)
pub fn metric(score: fn(&[f64], &[f64]) -> f64) -> Arc<dyn Applicable<Data>> {
    Arc::new(pipeline_lineage::module_fn(move |inputs: &[&Data]| {
        let predicted = arg(inputs, 0)?.labels()?;
        let truth = arg(inputs, 1)?.labels()?;
        if predicted.len() != truth.len() {
            return Err(ModuleError::new("prediction and truth lengths differ"));
        }
        Ok(Data::Score(score(predicted, truth)))
    }))
}

pub fn accuracy(predicted: &[f64], truth: &[f64]) -> f64 {
    let correct = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| (*p - *t).abs() < 0.5)
        .count();
    correct as f64 / truth.len().max(1) as f64
}

pub fn balanced_accuracy(predicted: &[f64], truth: &[f64]) -> f64 {
    let mut recalls = Vec::new();
    for class in [0.0, 1.0] {
        let members: Vec<usize> = (0..truth.len())
            .filter(|&i| (truth[i] - class).abs() < 0.5)
            .collect();
        if members.is_empty() {
            continue;
        }
        let hits = members
            .iter()
            .filter(|&&i| (predicted[i] - class).abs() < 0.5)
            .count();
        recalls.push(hits as f64 / members.len() as f64);
    }
    recalls.iter().sum::<f64>() / recalls.len().max(1) as f64
}

pub fn r2(predicted: &[f64], truth: &[f64]) -> f64 {
    let mean = truth.iter().sum::<f64>() / truth.len().max(1) as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = predicted.iter().zip(truth).map(|(p, t)| (t - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Accuracy drop when each feature column is shuffled, over (model, X, y)
pub fn permutation_importance() -> Arc<dyn Applicable<Data>> {
    Arc::new(pipeline_lineage::module_fn(|inputs: &[&Data]| {
        let model = arg(inputs, 0)?.model()?;
        let rows = arg(inputs, 1)?.features()?;
        let truth = arg(inputs, 2)?.labels()?;

        let score = |rows: Vec<Vec<f64>>| -> Result<f64, ModuleError> {
            let predicted = model.predict(&[&Data::Features(rows)])?;
            Ok(accuracy(predicted.labels()?, truth))
        };
        let baseline = score(rows.to_vec())?;

        let n_features = rows.first().map_or(0, Vec::len);
        let mut rng = StdRng::seed_from_u64(0);
        let mut importances = Vec::with_capacity(n_features);
        for j in 0..n_features {
            let mut column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            column.shuffle(&mut rng);
            let permuted = rows
                .iter()
                .zip(&column)
                .map(|(row, &value)| {
                    let mut row = row.clone();
                    row[j] = value;
                    row
                })
                .collect();
            importances.push(baseline - score(permuted)?);
        }
        Ok(Data::Importances(importances))
    }))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Binary logistic regression trained by batch gradient descent
pub struct LogisticRegression {
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 0.5,
        }
    }
}

struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

impl Fittable<Data> for LogisticRegression {
    fn fit(&self, inputs: &[&Data]) -> Result<Box<dyn Predictable<Data>>, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        let labels = arg(inputs, 1)?.labels()?;
        let n = rows.len().max(1) as f64;
        let n_features = rows.first().map_or(0, Vec::len);

        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;
        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (row, &label) in rows.iter().zip(labels) {
                let error = sigmoid(dot(&weights, row) + bias) - label;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += error * x;
                }
                grad_b += error;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g / n;
            }
            bias -= self.learning_rate * grad_b / n;
        }

        Ok(Box::new(LogisticModel { weights, bias }))
    }
}

impl Predictable<Data> for LogisticModel {
    fn predict(&self, inputs: &[&Data]) -> Result<Data, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        Ok(Data::Labels(
            rows.iter()
                .map(|row| {
                    if sigmoid(dot(&self.weights, row) + self.bias) >= 0.5 {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
        ))
    }
}

/// Single-split decision tree
pub struct DecisionStump;

struct StumpModel {
    feature: usize,
    threshold: f64,
    above: f64,
}

impl Fittable<Data> for DecisionStump {
    fn fit(&self, inputs: &[&Data]) -> Result<Box<dyn Predictable<Data>>, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        let labels = arg(inputs, 1)?.labels()?;
        let n_features = rows.first().map_or(0, Vec::len);

        let mut best = StumpModel {
            feature: 0,
            threshold: 0.0,
            above: 1.0,
        };
        let mut best_errors = usize::MAX;
        for feature in 0..n_features {
            for row in rows {
                let threshold = row[feature];
                for above in [0.0, 1.0] {
                    let candidate = StumpModel {
                        feature,
                        threshold,
                        above,
                    };
                    let errors = rows
                        .iter()
                        .zip(labels)
                        .filter(|(row, label)| (candidate.classify(row) - **label).abs() > 0.5)
                        .count();
                    if errors < best_errors {
                        best_errors = errors;
                        best = candidate;
                    }
                }
            }
        }

        Ok(Box::new(best))
    }
}

impl StumpModel {
    fn classify(&self, row: &[f64]) -> f64 {
        if row[self.feature] > self.threshold {
            self.above
        } else {
            1.0 - self.above
        }
    }
}

impl Predictable<Data> for StumpModel {
    fn predict(&self, inputs: &[&Data]) -> Result<Data, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        Ok(Data::Labels(rows.iter().map(|row| self.classify(row)).collect()))
    }
}

/// Linear least squares with an intercept and optional L2 penalty
pub struct LeastSquares {
    pub penalty: f64,
}

struct LinearModel {
    coefficients: Vec<f64>,
}

impl Fittable<Data> for LeastSquares {
    fn fit(&self, inputs: &[&Data]) -> Result<Box<dyn Predictable<Data>>, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        let targets = arg(inputs, 1)?.labels()?;
        let width = rows.first().map_or(0, Vec::len) + 1;

        // Normal equations over [1, x]
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, &target) in rows.iter().zip(targets) {
            let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..width {
                moment[i] += design[i] * target;
                for j in 0..width {
                    gram[i][j] += design[i] * design[j];
                }
            }
        }
        for (i, diagonal) in gram.iter_mut().enumerate().skip(1) {
            diagonal[i] += self.penalty;
        }

        let coefficients = solve(gram, moment)?;
        Ok(Box::new(LinearModel { coefficients }))
    }
}

impl Predictable<Data> for LinearModel {
    fn predict(&self, inputs: &[&Data]) -> Result<Data, ModuleError> {
        let rows = arg(inputs, 0)?.features()?;
        Ok(Data::Labels(
            rows.iter()
                .map(|row| self.coefficients[0] + dot(&self.coefficients[1..], row))
                .collect(),
        ))
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ModuleError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(ModuleError::new("singular system"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
