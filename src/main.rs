use std::{env, fs};

use anyhow::Context;
use log::info;
use optimization::{Optimizer, OptimizerBuilder, OptimizerSpec};
use rand::{Rng, SeedableRng, rngs::StdRng};

const DEFAULT_SPEC: &str = r#"{"eve": {"inner": {"adam": {"learning_rate": 0.05}}}}"#;
const SAMPLES: usize = 256;
const BATCH_SIZE: usize = 32;
const SEED: u64 = 42;

/// A `y = w * x + b` model with one parameter group per tensor.
struct Linear {
    w: [f32; 1],
    b: [f32; 1],
    grad_w: [f32; 1],
    grad_b: [f32; 1],
}

impl Linear {
    fn new() -> Self {
        Self {
            w: [0.],
            b: [0.],
            grad_w: [0.],
            grad_b: [0.],
        }
    }

    /// Accumulates the mean squared error gradient of a batch.
    ///
    /// # Returns
    /// The batch loss.
    fn backward(&mut self, xs: &[f32], ys: &[f32]) -> f32 {
        let n = xs.len() as f32;
        let mut loss = 0.;

        for (x, y) in xs.iter().zip(ys) {
            let err = self.w[0] * x + self.b[0] - y;
            loss += err * err / n;
            self.grad_w[0] += 2. * err * x / n;
            self.grad_b[0] += 2. * err / n;
        }

        loss
    }

    fn loss(&self, xs: &[f32], ys: &[f32]) -> f32 {
        let n = xs.len() as f32;

        xs.iter()
            .zip(ys)
            .map(|(x, y)| (self.w[0] * x + self.b[0] - y).powi(2) / n)
            .sum()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let spec = match args.next() {
        Some(path) => fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => DEFAULT_SPEC.to_string(),
    };
    let epochs: usize = match args.next() {
        Some(epochs) => epochs.parse().context("epochs must be a positive integer")?,
        None => 200,
    };

    let spec = OptimizerSpec::from_json(&spec)?;
    let mut optimizer = OptimizerBuilder::new().build::<&'static str>(&spec)?;

    let mut rng = StdRng::seed_from_u64(SEED);
    let xs: Vec<f32> = (0..SAMPLES).map(|_| rng.random_range(-1.0..1.0)).collect();
    let ys: Vec<f32> = xs
        .iter()
        .map(|x| 3. * x - 2. + rng.random_range(-0.05..0.05))
        .collect();

    let mut model = Linear::new();

    for epoch in 0..epochs {
        let mut epoch_loss = 0.;

        for (xs, ys) in xs.chunks(BATCH_SIZE).zip(ys.chunks(BATCH_SIZE)) {
            epoch_loss += model.backward(xs, ys);

            let Linear {
                w,
                b,
                grad_w,
                grad_b,
            } = &mut model;
            optimizer.step(w, grad_w, Some(&"w"))?;
            optimizer.step(b, grad_b, Some(&"b"))?;
        }

        epoch_loss /= SAMPLES.div_ceil(BATCH_SIZE) as f32;
        optimizer.set_loss(epoch_loss);

        if epoch % 20 == 0 {
            info!(epoch = epoch, loss = epoch_loss; "training");
        }
    }

    let loss = model.loss(&xs, &ys);
    println!(
        "{} after {} updates: w = {:.4}, b = {:.4}, loss = {loss:.6}",
        spec.name(),
        optimizer.iteration_count(),
        model.w[0],
        model.b[0],
    );

    let Linear { w, b, .. } = &mut model;
    if optimizer.swap_averages(&"w", w)? && optimizer.swap_averages(&"b", b)? {
        let averaged = model.loss(&xs, &ys);
        println!(
            "averaged weights: w = {:.4}, b = {:.4}, loss = {averaged:.6}",
            model.w[0], model.b[0],
        );

        let Linear { w, b, .. } = &mut model;
        optimizer.swap_averages(&"w", w)?;
        optimizer.swap_averages(&"b", b)?;
    }

    Ok(())
}
