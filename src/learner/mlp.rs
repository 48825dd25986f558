//! Small fully connected Q-network: ReLU hidden layers, linear head,
//! trained with Adam.

use ndarray::{Array, Array1, Array2, ArrayView1, Axis, Dimension, Zip};
use rand::Rng;

use super::traits::QFunction;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const ADAM_EPS: f32 = 1e-8;

#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f32>, // outputs x inputs
    bias: Array1<f32>,
    m_w: Array2<f32>,
    v_w: Array2<f32>,
    m_b: Array1<f32>,
    v_b: Array1<f32>,
}

impl Dense {
    fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = Array2::from_shape_fn((outputs, inputs), |_| rng.random_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
            m_w: Array2::zeros((outputs, inputs)),
            v_w: Array2::zeros((outputs, inputs)),
            m_b: Array1::zeros(outputs),
            v_b: Array1::zeros(outputs),
        }
    }

    fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, x: ArrayView1<f32>, relu: bool) -> Array1<f32> {
        let mut z = self.weights.dot(&x) + &self.bias;
        if relu {
            z.mapv_inplace(|v| v.max(0.0));
        }
        z
    }
}

/// Bias-corrected Adam state for one optimiser step.
struct AdamStep {
    lr: f32,
    bc1: f32,
    bc2: f32,
}

impl AdamStep {
    fn apply<D: Dimension>(
        &self,
        param: &mut Array<f32, D>,
        m: &mut Array<f32, D>,
        v: &mut Array<f32, D>,
        grad: &Array<f32, D>,
    ) {
        Zip::from(param)
            .and(m)
            .and(v)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                let m_hat = *m / self.bc1;
                let v_hat = *v / self.bc2;
                *p -= self.lr * m_hat / (v_hat.sqrt() + ADAM_EPS);
            });
    }
}

/// `a b^T` for two vectors.
fn outer(a: &Array1<f32>, b: &Array1<f32>) -> Array2<f32> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}

#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
    learning_rate: f32,
    adam_step: i32,
}

impl Mlp {
    /// `hidden` lists the hidden layer widths, input side first.
    pub fn new<R: Rng>(
        input_dim: usize,
        hidden: &[usize],
        num_actions: usize,
        learning_rate: f32,
        rng: &mut R,
    ) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(input_dim);
        widths.extend_from_slice(hidden);
        widths.push(num_actions);

        let layers = widths
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], rng))
            .collect();
        Self {
            layers,
            learning_rate,
            adam_step: 0,
        }
    }

    /// Post-activation output of every layer, the input first.
    fn activations(&self, input: &[f32]) -> Vec<Array1<f32>> {
        let last = self.layers.len() - 1;
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(Array1::from(input.to_vec()));
        for (l, layer) in self.layers.iter().enumerate() {
            let next = layer.forward(acts[l].view(), l != last);
            acts.push(next);
        }
        acts
    }

    fn adam(&mut self, grads_w: &[Array2<f32>], grads_b: &[Array1<f32>]) {
        self.adam_step += 1;
        let step = AdamStep {
            lr: self.learning_rate,
            bc1: 1.0 - BETA1.powi(self.adam_step),
            bc2: 1.0 - BETA2.powi(self.adam_step),
        };
        for (l, layer) in self.layers.iter_mut().enumerate() {
            step.apply(&mut layer.weights, &mut layer.m_w, &mut layer.v_w, &grads_w[l]);
            step.apply(&mut layer.bias, &mut layer.m_b, &mut layer.v_b, &grads_b[l]);
        }
    }
}

impl QFunction for Mlp {
    fn input_dim(&self) -> usize {
        self.layers[0].inputs()
    }

    fn num_actions(&self) -> usize {
        self.layers[self.layers.len() - 1].outputs()
    }

    fn q_values(&self, input: &[f32]) -> Vec<f32> {
        self.activations(input)
            .pop()
            .map(|q| q.to_vec())
            .unwrap_or_default()
    }

    fn fit(&mut self, inputs: &[Vec<f32>], actions: &[usize], targets: &[f32]) -> f32 {
        let batch = inputs.len();
        if batch == 0 {
            return 0.0;
        }
        let mut grads_w: Vec<Array2<f32>> = self
            .layers
            .iter()
            .map(|l| Array2::zeros(l.weights.raw_dim()))
            .collect();
        let mut grads_b: Vec<Array1<f32>> = self
            .layers
            .iter()
            .map(|l| Array1::zeros(l.outputs()))
            .collect();
        let mut loss = 0.0;

        for ((input, &action), &target) in inputs.iter().zip(actions).zip(targets) {
            let acts = self.activations(input);
            let err = acts[self.layers.len()][action] - target;
            loss += err * err;

            let mut delta = Array1::<f32>::zeros(self.num_actions());
            delta[action] = 2.0 * err / batch as f32;

            for l in (0..self.layers.len()).rev() {
                let x = &acts[l];
                grads_w[l] += &outer(&delta, x);
                grads_b[l] += &delta;
                if l == 0 {
                    break;
                }
                // x is the ReLU output of layer l-1, so x > 0 marks active units
                let mut back = self.layers[l].weights.t().dot(&delta);
                Zip::from(&mut back).and(x).for_each(|d, &xi| {
                    if xi <= 0.0 {
                        *d = 0.0;
                    }
                });
                delta = back;
            }
        }

        self.adam(&grads_w, &grads_b);
        loss / batch as f32
    }

    fn copy_weights_from(&mut self, other: &Self) {
        for (dst, src) in self.layers.iter_mut().zip(&other.layers) {
            dst.weights.assign(&src.weights);
            dst.bias.assign(&src.bias);
        }
    }
}
