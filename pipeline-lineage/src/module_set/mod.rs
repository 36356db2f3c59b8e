// Module-Set Engine
// Applies every alternative module to every upstream combination and labels
// each result with its lineage

mod combine;
pub mod options;

pub use options::{LineageMatching, ModuleSetOptions};

use crate::error::{LineageError, LineageResult};
use crate::events::{LineageEvent, Operation, ProgressSender};
use crate::key::{CompositeKey, Segment};
use crate::module::{Applicable, Fittable, Predictable};
use crate::store::OutputStore;
use combine::Combination;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Fitted instances produced by [`ModuleSet::fit`], keyed by fit-time lineage
pub type FittedStore<V> = OutputStore<Arc<dyn Predictable<V>>>;

/// Fit progress of a module set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Unfit,
    Fitted,
    Predicted,
}

/// A named, ordered collection of interchangeable modules.
///
/// Every operation reads its upstream stores and returns a brand-new store;
/// the only state a set keeps is its fitted-instance cache, keyed by the
/// lineage each instance was fitted on.
pub struct ModuleSet<V, M: ?Sized = dyn Applicable<V>> {
    name: String,
    modules: Vec<(Segment, Arc<M>)>,
    options: ModuleSetOptions,
    fitted: FittedStore<V>,
    state: FitState,
    progress: Option<ProgressSender>,
}

impl<V, M: ?Sized> ModuleSet<V, M> {
    /// Create a set whose modules are identified by position
    pub fn new(name: impl Into<String>, modules: Vec<Arc<M>>) -> Self {
        let name = name.into();
        let count = modules.len();
        let modules = modules
            .into_iter()
            .enumerate()
            .map(|(i, module)| (positional_segment(&name, i, count), module))
            .collect();

        Self {
            name,
            modules,
            options: ModuleSetOptions::default(),
            fitted: OutputStore::new(),
            state: FitState::Unfit,
            progress: None,
        }
    }

    /// Identify modules by caller-supplied keys, in module order
    pub fn with_keys<I, S>(mut self, keys: I) -> LineageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.len() != self.modules.len() {
            return Err(LineageError::cardinality(
                &self.name,
                format!("{} module keys for {} modules", keys.len(), self.modules.len()),
            ));
        }

        let mut seen = HashSet::new();
        for key in &keys {
            if !seen.insert(key.as_str()) {
                return Err(LineageError::KeyCollision {
                    key: CompositeKey::named(key.clone()),
                });
            }
        }

        for ((segment, _), key) in self.modules.iter_mut().zip(keys) {
            *segment = Segment::plain(key);
        }
        Ok(self)
    }

    pub fn with_output_matching(mut self, output_matching: bool) -> Self {
        self.options.output_matching = output_matching;
        self
    }

    pub fn with_lineage(mut self, lineage: LineageMatching) -> Self {
        self.options.lineage = lineage;
        self
    }

    pub fn with_options(mut self, options: ModuleSetOptions) -> Self {
        self.options = options;
        self
    }

    /// Report progress events on `sender`
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> ModuleSetOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Segment each module contributes to the keys it produces
    pub fn module_keys(&self) -> impl Iterator<Item = &Segment> {
        self.modules.iter().map(|(segment, _)| segment)
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// Fitted instances from the latest `fit` (plus any `fit_additional` calls)
    pub fn fitted(&self) -> &FittedStore<V> {
        &self.fitted
    }

    /// The fitted cache as a store of ordinary values, for evaluating the
    /// fitted modules themselves
    pub fn fitted_as<F>(&self, wrap: F) -> OutputStore<V>
    where
        F: FnMut(&Arc<dyn Predictable<V>>) -> V,
    {
        self.fitted.map_values(wrap)
    }

    /// Drop every fitted instance and return to the unfit state
    pub fn reset(&mut self) {
        self.fitted = OutputStore::new();
        self.state = FitState::Unfit;
    }

    /// Apply a fitted set to new inputs.
    ///
    /// Each result is keyed by the new input's key joined with the fit-time
    /// key, so `(X_test)` against a model fitted on
    /// `(X_train, subsampling_0, y_train, LR)` yields
    /// `(X_test, X_train, subsampling_0, y_train, LR)`.
    pub fn predict(&mut self, args: &[&OutputStore<V>]) -> LineageResult<OutputStore<V>> {
        self.run_fitted(Operation::Predict, args)
    }

    /// Like [`predict`](Self::predict) but through each instance's transform entry point
    pub fn transform(&mut self, args: &[&OutputStore<V>]) -> LineageResult<OutputStore<V>> {
        self.run_fitted(Operation::Transform, args)
    }

    fn run_fitted(
        &mut self,
        operation: Operation,
        args: &[&OutputStore<V>],
    ) -> LineageResult<OutputStore<V>> {
        let started = Instant::now();
        let result = self.expand_fitted(operation, args);
        let result = self.report(operation, started, result, |store| store.len());
        if result.is_ok() {
            self.state = FitState::Predicted;
        }
        result
    }

    fn expand_fitted(
        &self,
        operation: Operation,
        args: &[&OutputStore<V>],
    ) -> LineageResult<OutputStore<V>> {
        if self.fitted.is_empty() {
            return Err(LineageError::unfitted(&self.name));
        }

        let combinations = self.combinations(args)?;
        self.emit(LineageEvent::stage_started(
            &self.name,
            operation,
            self.fitted.len(),
            combinations.len(),
        ));

        let mut out = OutputStore::new();
        let mut consumed = 0;
        for (fit_key, model) in self.fitted.iter() {
            for combination in &combinations {
                let joined = combination.key.join(fit_key);
                if !joined.is_aligned() && self.options.lineage == LineageMatching::Aligned {
                    self.skip(&combination.key, fit_key);
                    continue;
                }
                consumed += 1;

                let key = joined.into_key();
                let value = match operation {
                    Operation::Transform => model.transform(&combination.values),
                    _ => model.predict(&combination.values),
                }
                .map_err(|e| LineageError::module(&key, e))?;
                out.insert(key, value)?;
            }
        }

        // No instance was fitted on a lineage compatible with these inputs
        if consumed == 0 && !combinations.is_empty() {
            return Err(LineageError::unfitted(&self.name));
        }

        let mut previous = input_keys(args);
        previous.extend(self.fitted.keys().cloned());
        Ok(out.with_previous_keys(previous))
    }

    /// Resolve upstream combinations according to the set's options
    fn combinations<'a>(
        &self,
        args: &[&'a OutputStore<V>],
    ) -> LineageResult<Vec<Combination<'a, V>>> {
        if self.options.output_matching {
            return combine::matched(&self.name, args, self.options.lineage);
        }

        let product = combine::cross(args, self.options.lineage);
        for (left, right) in &product.skipped {
            self.skip(left, right);
        }
        Ok(product.combinations)
    }

    fn skip(&self, left: &CompositeKey, right: &CompositeKey) {
        tracing::trace!(set = %self.name, %left, %right, "skipping diverged lineage");
        self.emit(LineageEvent::combination_skipped(
            &self.name,
            left.clone(),
            right.clone(),
        ));
    }

    fn emit(&self, event: LineageEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }

    /// Emit the completion or failure event for an application
    fn report<T, F>(
        &self,
        operation: Operation,
        started: Instant,
        result: LineageResult<T>,
        entries: F,
    ) -> LineageResult<T>
    where
        F: Fn(&T) -> usize,
    {
        match &result {
            Ok(value) => {
                let entries = entries(value);
                tracing::debug!(
                    set = %self.name,
                    %operation,
                    entries,
                    "module set application completed"
                );
                self.emit(LineageEvent::stage_completed(
                    &self.name,
                    operation,
                    entries,
                    started.elapsed(),
                ));
            }
            Err(err) => {
                tracing::debug!(set = %self.name, %operation, error = %err, "module set application failed");
                self.emit(LineageEvent::stage_failed(
                    &self.name,
                    operation,
                    err.to_string(),
                ));
            }
        }
        result
    }
}

impl<V, M> ModuleSet<V, M>
where
    M: Applicable<V> + ?Sized,
{
    /// Apply every module to every upstream combination
    pub fn apply(&self, args: &[&OutputStore<V>]) -> LineageResult<OutputStore<V>> {
        let started = Instant::now();
        let result = self.expand(Operation::Apply, args);
        self.report(Operation::Apply, started, result, |store| store.len())
    }

    /// Apply every module (typically a metric) to paired upstream stores such
    /// as predictions and ground truth
    pub fn evaluate(&self, args: &[&OutputStore<V>]) -> LineageResult<OutputStore<V>> {
        let started = Instant::now();
        let result = self.expand(Operation::Evaluate, args);
        self.report(Operation::Evaluate, started, result, |store| store.len())
    }

    /// Apply multi-output modules to positionally paired inputs, returning one
    /// store per argument.
    ///
    /// Output `j` of each module is keyed by the key of the entry consumed from
    /// argument `j`, extended with the module segment, so resampling
    /// `(X_train, y_train)` yields `(X_train, subsampling_0)` and
    /// `(y_train, subsampling_0)` in two separate stores.
    pub fn apply_paired(&self, args: &[&OutputStore<V>]) -> LineageResult<Vec<OutputStore<V>>> {
        let started = Instant::now();
        let result = self.expand_paired(args);
        self.report(Operation::ApplyPaired, started, result, |stores| {
            stores.iter().map(OutputStore::len).sum()
        })
    }

    fn expand(
        &self,
        operation: Operation,
        args: &[&OutputStore<V>],
    ) -> LineageResult<OutputStore<V>> {
        let combinations = self.combinations(args)?;
        self.emit(LineageEvent::stage_started(
            &self.name,
            operation,
            self.modules.len(),
            combinations.len(),
        ));

        let mut out = OutputStore::new();
        for (segment, module) in &self.modules {
            for combination in &combinations {
                let key = combination.key.extend([segment.clone()]);
                let value = module
                    .apply(&combination.values)
                    .map_err(|e| LineageError::module(&key, e))?;
                out.insert(key, value)?;
            }
        }

        Ok(out.with_previous_keys(input_keys(args)))
    }

    fn expand_paired(&self, args: &[&OutputStore<V>]) -> LineageResult<Vec<OutputStore<V>>> {
        let combinations = combine::matched(&self.name, args, self.options.lineage)?;
        self.emit(LineageEvent::stage_started(
            &self.name,
            Operation::ApplyPaired,
            self.modules.len(),
            combinations.len(),
        ));

        let mut outs: Vec<OutputStore<V>> = args.iter().map(|_| OutputStore::new()).collect();
        for (segment, module) in &self.modules {
            for combination in &combinations {
                let outputs = module.apply_paired(&combination.values).map_err(|e| {
                    LineageError::module(&combination.key.extend([segment.clone()]), e)
                })?;
                if outputs.len() != args.len() {
                    return Err(LineageError::cardinality(
                        &self.name,
                        format!(
                            "module {} returned {} outputs for {} inputs",
                            segment,
                            outputs.len(),
                            args.len()
                        ),
                    ));
                }

                for ((store, source), value) in
                    outs.iter_mut().zip(&combination.sources).zip(outputs)
                {
                    store.insert(source.extend([segment.clone()]), value)?;
                }
            }
        }

        let previous = input_keys(args);
        Ok(outs
            .into_iter()
            .map(|store| store.with_previous_keys(previous.clone()))
            .collect())
    }
}

impl<V, M> ModuleSet<V, M>
where
    M: Fittable<V> + ?Sized,
{
    /// Fit every module on every upstream combination.
    ///
    /// The fitted instances replace the set's cache and are returned as a
    /// store, so the following predict/transform calls only see this run.
    /// Nothing changes when any module fails.
    pub fn fit(&mut self, args: &[&OutputStore<V>]) -> LineageResult<FittedStore<V>> {
        let started = Instant::now();
        let result = self.fit_modules(args);
        let result = self.report(Operation::Fit, started, result, |store| store.len());

        if let Ok(fitted) = &result {
            self.fitted = fitted.clone();
            self.state = FitState::Fitted;
        }
        result
    }

    /// Like [`fit`](Self::fit) but adds to the cache instead of replacing it;
    /// an instance fitted earlier on the same key is replaced.
    pub fn fit_additional(&mut self, args: &[&OutputStore<V>]) -> LineageResult<FittedStore<V>> {
        let started = Instant::now();
        let result = self.fit_modules(args);
        let result = self.report(Operation::Fit, started, result, |store| store.len());

        if let Ok(fitted) = &result {
            for (key, model) in fitted.iter() {
                self.fitted.upsert(key.clone(), Arc::clone(model));
            }
            self.state = FitState::Fitted;
        }
        result
    }

    fn fit_modules(&self, args: &[&OutputStore<V>]) -> LineageResult<FittedStore<V>> {
        let combinations = self.combinations(args)?;
        self.emit(LineageEvent::stage_started(
            &self.name,
            Operation::Fit,
            self.modules.len(),
            combinations.len(),
        ));

        let mut out: FittedStore<V> = OutputStore::new();
        for (segment, module) in &self.modules {
            for combination in &combinations {
                let key = combination.key.extend([segment.clone()]);
                let model = module
                    .fit(&combination.values)
                    .map_err(|e| LineageError::module(&key, e))?;
                out.insert(key, Arc::from(model))?;
            }
        }

        Ok(out.with_previous_keys(input_keys(args)))
    }
}

impl<V, M: ?Sized> fmt::Debug for ModuleSet<V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSet")
            .field("name", &self.name)
            .field("modules", &self.module_keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("state", &self.state)
            .field("fitted", &self.fitted.len())
            .finish()
    }
}

/// Identifier of the i-th unnamed module of a set
fn positional_segment(set_name: &str, index: usize, count: usize) -> Segment {
    let instance = format!("{}_{}", set_name, index);
    if count > 1 {
        Segment::smart(instance, set_name)
    } else {
        Segment::plain(instance)
    }
}

/// Keys of every upstream store, in argument order
fn input_keys<V>(args: &[&OutputStore<V>]) -> Vec<CompositeKey> {
    args.iter().flat_map(|store| store.keys().cloned()).collect()
}
