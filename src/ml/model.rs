// ============================================================
// Layer 5: CfC Model (Burn)
// ============================================================
// Closed-form Continuous-time recurrent network, default (gated)
// mode. One step with input x_t and hidden state h:
//
//   z    = backbone([x_t, h])        Linear + LeCun tanh, repeated
//   ff1  = tanh(W1 z)
//   ff2  = tanh(W2 z)
//   gate = σ(Wa z · timespan + Wb z)
//   h'   = ff1 · (1 - gate) + ff2 · gate
//
// The hidden states of all steps are projected to out_features
// logits, giving one class prediction per time step.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

use crate::domain::params::ModelParams;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CfcConfig {
    pub in_features:  usize,
    pub out_features: usize,
    pub units:        usize,
    #[config(default = 64)]
    pub backbone_units: usize,
    #[config(default = 1)]
    pub backbone_layers: usize,
    #[config(default = 1.0)]
    pub timespan: f64,
}

impl CfcConfig {
    pub fn from_params(params: &ModelParams) -> Self {
        CfcConfig::new(params.in_features, params.out_features, params.units)
            .with_backbone_units(params.backbone_units)
            .with_backbone_layers(params.backbone_layers)
            .with_timespan(params.timespan)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CfcModel<B> {
        CfcModel {
            cell:       self.init_cell(device),
            projection: LinearConfig::new(self.units, self.out_features).init(device),
            units:      self.units,
            timespan:   self.timespan,
        }
    }

    fn init_cell<B: Backend>(&self, device: &B::Device) -> CfcCell<B> {
        let cat_features = self.in_features + self.units;
        let backbone: Vec<Linear<B>> = (0..self.backbone_layers)
            .map(|layer| {
                let input = if layer == 0 { cat_features } else { self.backbone_units };
                LinearConfig::new(input, self.backbone_units).init(device)
            })
            .collect();
        let head_in = if self.backbone_layers > 0 { self.backbone_units } else { cat_features };

        CfcCell {
            backbone,
            ff1:    LinearConfig::new(head_in, self.units).init(device),
            ff2:    LinearConfig::new(head_in, self.units).init(device),
            time_a: LinearConfig::new(head_in, self.units).init(device),
            time_b: LinearConfig::new(head_in, self.units).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct CfcCell<B: Backend> {
    pub backbone: Vec<Linear<B>>,
    pub ff1:      Linear<B>,
    pub ff2:      Linear<B>,
    pub time_a:   Linear<B>,
    pub time_b:   Linear<B>,
}

impl<B: Backend> CfcCell<B> {
    /// input: [batch, in_features], hidden: [batch, units] → [batch, units]
    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>, timespan: f64) -> Tensor<B, 2> {
        let mut z = Tensor::cat(vec![input, hidden], 1);
        for layer in &self.backbone {
            z = lecun_tanh(layer.forward(z));
        }

        let ff1 = tanh(self.ff1.forward(z.clone()));
        let ff2 = tanh(self.ff2.forward(z.clone()));
        let t_a = self.time_a.forward(z.clone());
        let t_b = self.time_b.forward(z);
        let gate = sigmoid(t_a.mul_scalar(timespan) + t_b);

        ff1 * gate.clone().neg().add_scalar(1.0) + ff2 * gate
    }
}

#[derive(Module, Debug)]
pub struct CfcModel<B: Backend> {
    pub cell:       CfcCell<B>,
    pub projection: Linear<B>,
    pub units:      usize,
    pub timespan:   f64,
}

impl<B: Backend> CfcModel<B> {
    /// inputs: [batch, seq_len, in_features] → logits: [batch, seq_len, out_features]
    ///
    /// `seq_len` must be at least 1.
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, in_features] = inputs.dims();
        let device = inputs.device();

        let mut hidden = Tensor::<B, 2>::zeros([batch_size, self.units], &device);
        let mut states = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = inputs
                .clone()
                .slice([0..batch_size, t..t + 1, 0..in_features])
                .reshape([batch_size, in_features]);
            hidden = self.cell.forward(x_t, hidden, self.timespan);
            states.push(hidden.clone().reshape([batch_size, 1, self.units]));
        }

        // [batch, seq_len, units] → [batch, seq_len, out_features]
        self.projection.forward(Tensor::cat(states, 1))
    }
}

fn lecun_tanh<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    tanh(x.mul_scalar(0.666)).mul_scalar(1.7159)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: CfcModel<TestBackend> = CfcConfig::new(3, 4, 8)
            .with_backbone_units(16)
            .init(&device);

        let inputs = Tensor::<TestBackend, 3>::ones([2, 5, 3], &device);
        assert_eq!(model.forward(inputs).dims(), [2, 5, 4]);
    }

    #[test]
    fn test_without_backbone() {
        let device = Default::default();
        let model: CfcModel<TestBackend> = CfcConfig::new(2, 3, 4)
            .with_backbone_layers(0)
            .init(&device);

        let inputs = Tensor::<TestBackend, 3>::zeros([1, 2, 2], &device);
        assert_eq!(model.forward(inputs).dims(), [1, 2, 3]);
    }

    #[test]
    fn test_hidden_state_is_bounded() {
        // h' is a convex mix of two tanh outputs, so it stays in [-1, 1]
        let device = Default::default();
        let cell = CfcConfig::new(2, 2, 6).with_backbone_layers(2).init_cell::<TestBackend>(&device);

        let input  = Tensor::<TestBackend, 2>::ones([3, 2], &device).mul_scalar(50.0);
        let hidden = Tensor::<TestBackend, 2>::zeros([3, 6], &device);
        let out: Vec<f32> = cell.forward(input, hidden, 1.0).into_data().to_vec().unwrap();
        assert!(out.iter().all(|v| v.abs() <= 1.0 + 1e-6));
    }

    #[test]
    fn test_from_params() {
        let params = ModelParams { in_features: 7, ..ModelParams::default() };
        let cfg = CfcConfig::from_params(&params);
        assert_eq!(cfg.in_features, 7);
        assert_eq!(cfg.units, params.units);
        assert_eq!(cfg.backbone_layers, params.backbone_layers);
    }
}
