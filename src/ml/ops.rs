// ============================================================
// Layer 5 — Batch Reordering Ops
// ============================================================
// Small tensor utilities the hierarchical forward pass is
// built from:
//
//   length_sort       — descending-length permutation plus its
//                       inverse, so a flattened chunk batch can
//                       be sorted for the recurrent encoder and
//                       restored afterwards
//   select_rows_*     — apply a permutation along the batch axis
//   last_step_outputs — per row, the hidden output at the last
//                       REAL time step (length-indexed gather),
//                       which is the chunk summary used
//                       downstream
//
// Invariant: applying a permutation and then its inverse is the
// identity. Ties among equal lengths may order arbitrarily but
// the inverse always restores the original row positions.

use burn::prelude::*;

/// Sort indices by descending length and return
/// `(permutation, inverse)`.
///
/// `sorted[i] = original[permutation[i]]` and applying
/// `inverse` to the sorted batch restores the original order.
pub fn length_sort(lengths: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut permutation: Vec<usize> = (0..lengths.len()).collect();
    permutation.sort_by_key(|&i| std::cmp::Reverse(lengths[i]));

    let mut inverse = vec![0usize; permutation.len()];
    for (sorted_pos, &orig_pos) in permutation.iter().enumerate() {
        inverse[orig_pos] = sorted_pos;
    }
    (permutation, inverse)
}

fn index_tensor<B: Backend>(order: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let ids: Vec<i32> = order.iter().map(|&i| i as i32).collect();
    Tensor::from_ints(ids.as_slice(), device)
}

/// Reorder the rows of a 2D integer tensor (the flattened
/// chunk-id batch) by `order`.
pub fn select_rows_int<B: Backend>(
    tensor: Tensor<B, 2, Int>,
    order: &[usize],
) -> Tensor<B, 2, Int> {
    let device = tensor.device();
    tensor.select(0, index_tensor::<B>(order, &device))
}

/// Reorder the rows of a 3D float tensor (encoder outputs) by
/// `order`.
pub fn select_rows<B: Backend>(tensor: Tensor<B, 3>, order: &[usize]) -> Tensor<B, 3> {
    let device = tensor.device();
    tensor.select(0, index_tensor::<B>(order, &device))
}

/// Gather, per row, the output at time step `length - 1`.
///
/// `outputs` is [rows, steps, hidden]; the result is
/// [rows, hidden]. A length of 0 (an all-padding chunk) clamps
/// to step 0 so the gather never indexes out of range.
pub fn last_step_outputs<B: Backend>(
    outputs: Tensor<B, 3>,
    lengths: &[usize],
) -> Tensor<B, 2> {
    let [rows, _steps, hidden] = outputs.dims();
    let device = outputs.device();

    let last: Vec<i32> = lengths
        .iter()
        .map(|&len| len.saturating_sub(1) as i32)
        .collect();
    let indices = Tensor::<B, 1, Int>::from_ints(last.as_slice(), &device)
        .reshape([rows, 1, 1])
        .expand([rows, 1, hidden]);

    outputs.gather(1, indices).reshape([rows, hidden])
}
