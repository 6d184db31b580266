// ============================================================
// Layer 5 — Outer (Hierarchical) Encoder
// ============================================================
// Second recurrent level: consumes the per-example sequence of
// chunk-summary vectors ([batch, outer_len, hidden]) and
// produces the outer output sequence plus a final state shaped
// for the decoder's initial state.
//
// The LSTM is stepped one chunk position at a time so that the
// final hidden AND cell state can be read at each example's
// TRUE last chunk (outer_lengths), not at the padded end —
// padding chunks must not leak into the decoder's initial
// state.

use burn::{
    nn::{Lstm, LstmConfig, LstmState},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::ml::ops::last_step_outputs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterEncoderConfig {
    pub hidden_size: usize,
}

impl OuterEncoderConfig {
    pub fn new(hidden_size: usize) -> Self {
        Self { hidden_size }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> OuterEncoder<B> {
        OuterEncoder {
            rnn: LstmConfig::new(self.hidden_size, self.hidden_size, true).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct OuterEncoder<B: Backend> {
    rnn: Lstm<B>,
}

impl<B: Backend> OuterEncoder<B> {
    /// summaries: [batch, outer_len, hidden]; outer_lengths holds
    /// each example's true chunk count (1..=outer_len).
    ///
    /// Returns the outer output sequence [batch, outer_len, hidden]
    /// and the final state gathered at each example's last real
    /// chunk.
    pub fn forward(
        &self,
        summaries: Tensor<B, 3>,
        outer_lengths: &[usize],
    ) -> PipelineResult<(Tensor<B, 3>, LstmState<B, 2>)> {
        let [batch, outer_len, hidden] = summaries.dims();
        if outer_len == 0 {
            return Err(PipelineError::shape(
                "outer encoder input",
                "outer_len >= 1",
                "outer_len == 0",
            ));
        }
        if outer_lengths.len() != batch {
            return Err(PipelineError::shape(
                "outer_lengths",
                batch,
                outer_lengths.len(),
            ));
        }

        let mut state: Option<LstmState<B, 2>> = None;
        let mut hiddens: Vec<Tensor<B, 3>> = Vec::with_capacity(outer_len);
        let mut cells: Vec<Tensor<B, 3>> = Vec::with_capacity(outer_len);

        for t in 0..outer_len {
            let step = summaries.clone().slice([0..batch, t..t + 1]);
            let (_, next) = self.rnn.forward(step, state);
            hiddens.push(next.hidden.clone().unsqueeze_dim::<3>(1));
            cells.push(next.cell.clone().unsqueeze_dim::<3>(1));
            state = Some(next);
        }

        // The LSTM's per-step output IS its hidden state, so the
        // stacked hidden states are the outer output sequence.
        let outputs = Tensor::cat(hiddens, 1);
        let cell_seq = Tensor::cat(cells, 1);

        let final_hidden = last_step_outputs(outputs.clone(), outer_lengths);
        let final_cell = last_step_outputs(cell_seq, outer_lengths);
        debug_assert_eq!(final_hidden.dims(), [batch, hidden]);

        Ok((outputs, LstmState::new(final_cell, final_hidden)))
    }
}
