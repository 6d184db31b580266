// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Key Burn 0.16 insight:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns model on MyInnerBackend (Wgpu)
//   - Validation batcher must also use MyInnerBackend
//
// The decoder emits log-probabilities, so the loss is a masked
// negative log-likelihood over non-pad target positions rather
// than Burn's CrossEntropyLoss (which would re-apply softmax).

use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::HierBatcher, dataset::PairDataset, field::Field};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{HSeq2seq, HSeq2seqConfig};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

pub fn run_training(
    cfg:           &TrainConfig,
    model_cfg:     &HSeq2seqConfig,
    src_field:     Arc<Field>,
    tgt_field:     Arc<Field>,
    train_dataset: PairDataset,
    val_dataset:   PairDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop(
        cfg, model_cfg, src_field, tgt_field,
        train_dataset, val_dataset, ckpt_manager, device,
    )
}

/// Mean negative log-likelihood of `labels` under `log_probs`,
/// counting only non-pad positions.
fn masked_nll<B: Backend>(
    log_probs: Tensor<B, 3>,
    labels:    Tensor<B, 2, Int>,
    pad_id:    usize,
) -> Tensor<B, 1> {
    let [batch, steps, vocab] = log_probs.dims();
    let flat        = log_probs.reshape([batch * steps, vocab]);
    let labels_flat = labels.reshape([batch * steps]);

    let picked = flat
        .gather(1, labels_flat.clone().reshape([batch * steps, 1]))
        .reshape([batch * steps]);
    let mask = labels_flat.not_equal_elem(pad_id as i32).float();

    let total = (picked * mask.clone()).sum();
    -total / mask.sum().clamp_min(1.0)
}

#[allow(clippy::too_many_arguments)]
fn train_loop(
    cfg:           &TrainConfig,
    model_cfg:     &HSeq2seqConfig,
    src_field:     Arc<Field>,
    tgt_field:     Arc<Field>,
    train_dataset: PairDataset,
    val_dataset:   PairDataset,
    ckpt_manager:  CheckpointManager,
    device:        burn::backend::wgpu::WgpuDevice,
) -> Result<()> {

    let pad_id = tgt_field.vocab()?.pad_id();

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: HSeq2seq<MyBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: embed_dim={}, hidden={}, attention={}",
        model_cfg.embed_dim, model_cfg.hidden_size, model_cfg.use_attention,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = HierBatcher::<MyBackend>::new(
        src_field.clone(), tgt_field.clone(), device.clone(),
    );
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(42)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = HierBatcher::<MyInnerBackend>::new(
        src_field, tgt_field, device.clone(),
    );
    let val_loader = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let metrics = MetricsLogger::new(ckpt_manager.dir())?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let [b, t] = batch.targets.dims();
            let out = model.forward(
                batch.input_ids,
                &batch.outer_lengths,
                &batch.chunk_lengths,
                Some(&batch.targets),
                cfg.teacher_forcing_ratio,
            )?;

            // Labels are the targets shifted past <sos>.
            let labels = batch.targets.slice([0..b, 1..t]);
            let loss   = masked_nll(out.outputs, labels, pad_id);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        // Greedy decoding against the target step count, no
        // teacher forcing.
        let model_valid = model.valid();

        let mut val_loss_sum   = 0.0f64;
        let mut val_batches    = 0usize;
        let mut correct_tokens = 0usize;
        let mut total_tokens   = 0usize;

        for batch in val_loader.iter() {
            let [b, t] = batch.targets.dims();
            let out = model_valid.forward(
                batch.input_ids,
                &batch.outer_lengths,
                &batch.chunk_lengths,
                Some(&batch.targets),
                0.0,
            )?;

            let labels = batch.targets.slice([0..b, 1..t]);
            let loss_val: f64 = masked_nll(out.outputs.clone(), labels.clone(), pad_id)
                .into_scalar().elem::<f64>();
            val_loss_sum += loss_val;
            val_batches  += 1;

            // Token accuracy over non-pad target positions.
            let predicted: Tensor<MyInnerBackend, 2, Int> =
                out.outputs.argmax(2).reshape([b, t - 1]);
            let mask    = labels.clone().not_equal_elem(pad_id as i32);
            let matches = predicted.equal(labels).int() * mask.clone().int();

            correct_tokens += matches.sum().into_scalar().elem::<i64>() as usize;
            total_tokens   += mask.int().sum().into_scalar().elem::<i64>() as usize;
        }

        let avg_val_loss = if val_batches  > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let token_acc    = if total_tokens > 0 { correct_tokens as f64 / total_tokens as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | token_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, token_acc * 100.0,
        );

        metrics.log(&EpochMetrics {
            epoch,
            train_loss: avg_train_loss,
            val_loss:   avg_val_loss,
            token_acc,
        })?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TB = burn::backend::NdArray;

    #[test]
    fn test_masked_nll_ignores_pad_positions() {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        // Two positions, vocab 3; second position is pad (id 0).
        let log_probs = Tensor::<TB, 1>::from_floats(
            [-0.1, -2.0, -3.0, -5.0, -5.0, -5.0].as_slice(),
            &device,
        )
        .reshape([1, 2, 3]);
        let labels =
            Tensor::<TB, 1, Int>::from_ints([0, 0].as_slice(), &device).reshape([1, 2]);
        // Both positions are pad: loss is 0 / clamp(0,1) = 0.
        let loss: f64 = masked_nll(log_probs.clone(), labels, 0)
            .into_scalar().elem::<f64>();
        assert!(loss.abs() < 1e-6);

        let labels =
            Tensor::<TB, 1, Int>::from_ints([1, 0].as_slice(), &device).reshape([1, 2]);
        let loss: f64 = masked_nll(log_probs, labels, 0).into_scalar().elem::<f64>();
        // Only the first position counts: -(-2.0) / 1 = 2.0.
        assert!((loss - 2.0).abs() < 1e-4);
    }
}
