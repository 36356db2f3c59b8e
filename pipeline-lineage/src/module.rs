// Module Capabilities
// The interfaces a data-processing module exposes to the module-set engine

use crate::error::ModuleError;

/// A module that can be called on positional upstream values.
///
/// `inputs` holds one value per upstream store, in the order the caller passed
/// the stores.
pub trait Applicable<V>: Send + Sync {
    fn apply(&self, inputs: &[&V]) -> Result<V, ModuleError>;

    /// Multi-output entry point used by paired application: one output per input.
    ///
    /// The default applies the module to each input on its own. Modules that
    /// must treat the inputs jointly (e.g. resampling `X` and `y` with the same
    /// row draw) override this.
    fn apply_paired(&self, inputs: &[&V]) -> Result<Vec<V>, ModuleError> {
        inputs.iter().map(|input| self.apply(&[*input])).collect()
    }
}

/// A fitted module, ready to produce values for new inputs
pub trait Predictable<V>: Send + Sync {
    fn predict(&self, inputs: &[&V]) -> Result<V, ModuleError>;

    fn transform(&self, inputs: &[&V]) -> Result<V, ModuleError> {
        self.predict(inputs)
    }
}

/// A module that learns from upstream values
pub trait Fittable<V>: Send + Sync {
    fn fit(&self, inputs: &[&V]) -> Result<Box<dyn Predictable<V>>, ModuleError>;
}

/// Adapter turning a plain function or closure into a module
#[derive(Clone)]
pub struct FnModule<F> {
    f: F,
}

/// Wrap a closure as an [`Applicable`] (and [`Predictable`]) module
pub fn module_fn<V, F>(f: F) -> FnModule<F>
where
    F: Fn(&[&V]) -> Result<V, ModuleError> + Send + Sync,
{
    FnModule { f }
}

impl<V, F> Applicable<V> for FnModule<F>
where
    F: Fn(&[&V]) -> Result<V, ModuleError> + Send + Sync,
{
    fn apply(&self, inputs: &[&V]) -> Result<V, ModuleError> {
        (self.f)(inputs)
    }
}

impl<V, F> Predictable<V> for FnModule<F>
where
    F: Fn(&[&V]) -> Result<V, ModuleError> + Send + Sync,
{
    fn predict(&self, inputs: &[&V]) -> Result<V, ModuleError> {
        (self.f)(inputs)
    }
}
