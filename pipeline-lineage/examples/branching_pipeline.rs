// Branching Pipeline Demo
// Runs a small resample -> fit -> predict -> score pipeline and prints its lineage

use pipeline_lineage::{
    build_ancestry_tree, build_graph, init_args, module_fn, progress_channel, Applicable,
    Fittable, LineageEvent, LineageResult, ModuleError, ModuleSet, Predictable,
};
use std::sync::Arc;

type Series = Vec<f64>;

/// Predicts a constant learned from the training series
struct ConstantModel {
    statistic: fn(&[f64]) -> f64,
}

impl Fittable<Series> for ConstantModel {
    fn fit(&self, inputs: &[&Series]) -> Result<Box<dyn Predictable<Series>>, ModuleError> {
        let train = inputs
            .first()
            .ok_or_else(|| ModuleError::new("no training series"))?;
        let level = (self.statistic)(train);
        Ok(Box::new(module_fn(move |inputs: &[&Series]| {
            let len = inputs.first().map_or(0, |s| s.len());
            Ok(vec![level; len])
        })))
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.get(sorted.len() / 2).copied().unwrap_or_default()
}

fn every_nth(step: usize) -> Arc<dyn Applicable<Series>> {
    Arc::new(module_fn(move |inputs: &[&Series]| {
        let series = inputs
            .first()
            .ok_or_else(|| ModuleError::new("nothing to thin"))?;
        Ok(series.iter().step_by(step).copied().collect())
    }))
}

fn mean_absolute_error() -> Arc<dyn Applicable<Series>> {
    Arc::new(module_fn(|inputs: &[&Series]| {
        let (predicted, truth) = match inputs {
            [p, t] => (p, t),
            _ => return Err(ModuleError::new("expected predictions and truth")),
        };
        let error = predicted
            .iter()
            .zip(truth.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / truth.len().max(1) as f64;
        Ok(vec![error])
    }))
}

fn main() -> LineageResult<()> {
    let train: Series = (0..20).map(|i| (i as f64 * 0.7).sin() * 3.0 + 5.0).collect();
    let test: Series = (20..30).map(|i| (i as f64 * 0.7).sin() * 3.0 + 5.0).collect();
    let stores = init_args(vec![train, test.clone(), test], &["train", "test", "truth"])?;

    let (tx, mut rx) = progress_channel();

    let thinning = ModuleSet::<Series>::new("thinning", vec![every_nth(1), every_nth(2), every_nth(3)])
        .with_progress(tx.clone());
    let thinned = thinning.apply(&[&stores[0]])?;

    let models: Vec<Arc<dyn Fittable<Series>>> = vec![
        Arc::new(ConstantModel { statistic: mean }),
        Arc::new(ConstantModel { statistic: median }),
    ];
    let mut modeling = ModuleSet::<Series, dyn Fittable<Series>>::new("modeling", models)
        .with_keys(["mean", "median"])?
        .with_progress(tx.clone());
    modeling.fit(&[&thinned])?;
    let predictions = modeling.predict(&[&stores[1]])?;

    let scores = ModuleSet::<Series>::new("metrics", vec![mean_absolute_error()])
        .with_keys(["MAE"])?
        .with_progress(tx)
        .evaluate(&[&predictions, &stores[2]])?;

    println!("== scores ==");
    for (key, value) in &scores {
        println!("{} = {:.3}", key, value.first().copied().unwrap_or_default());
    }

    println!("\n== events ==");
    while let Ok(event) = rx.try_recv() {
        match event {
            LineageEvent::StageCompleted {
                set_name,
                operation,
                entries,
                duration,
            } => println!("{} {}: {} entries in {:?}", set_name, operation, entries, duration),
            LineageEvent::CombinationSkipped { set_name, left, right } => {
                println!("{} skipped {} x {}", set_name, left, right)
            }
            other => println!("{:?}", other),
        }
    }

    let tree = build_ancestry_tree(&scores)?;
    println!("\n== ancestry ({} prefixes) ==", tree.len());
    print!("{}", tree.to_dot());

    println!("\n== lineage graph ==");
    print!("{}", build_graph(&scores)?.to_dot());

    Ok(())
}
