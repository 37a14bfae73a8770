//! Padding of ragged per-example data into batch tensors.

use candle_core::{Device, Tensor, WithDType};
use grte_core::{GrteError, Result, TagTable, ValidityMask};

/// Pad id rows to the longest row: `(B, L)` tensor.
pub fn sequence_padding(rows: &[Vec<u32>], pad: u32, device: &Device) -> Result<Tensor> {
    let len = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut data = Vec::with_capacity(rows.len() * len);
    for row in rows {
        data.extend_from_slice(row);
        data.resize(data.len() + (len - row.len()), pad);
    }
    Ok(Tensor::from_vec(data, (rows.len(), len), device)?)
}

/// Copy a `(len, len, width)` block into the top-left corner of a
/// `(target, target, width)` block filled with `pad`.
fn pad_square<T: Copy>(
    values: &[T],
    len: usize,
    width: usize,
    target: usize,
    pad: T,
    out: &mut Vec<T>,
) {
    let start = out.len();
    out.resize(start + target * target * width, pad);
    for l1 in 0..len {
        let src = &values[l1 * len * width..(l1 + 1) * len * width];
        let dst = start + l1 * target * width;
        out[dst..dst + len * width].copy_from_slice(src);
    }
}

fn square_padding<T: WithDType>(
    blocks: &[(&[T], usize)],
    width: usize,
    pad: T,
    device: &Device,
) -> Result<Tensor> {
    let target = blocks.iter().map(|(_, len)| *len).max().unwrap_or(0);
    let mut data = Vec::with_capacity(blocks.len() * target * target * width);
    for (values, len) in blocks {
        pad_square(values, *len, width, target, pad, &mut data);
    }
    Ok(Tensor::from_vec(data, (blocks.len(), target, target, width), device)?)
}

fn common_width(widths: impl Iterator<Item = usize>) -> Result<usize> {
    let mut widths = widths.peekable();
    let first = widths.peek().copied().unwrap_or(0);
    if widths.any(|w| w != first) {
        return Err(GrteError::ShapeMismatch(
            "tables in a batch must share the predicate axis".into(),
        ));
    }
    Ok(first)
}

/// Pad label tables on both position axes with `NONE`: `(B, L, L, P)` u32 tensor.
pub fn table_padding(tables: &[&TagTable], device: &Device) -> Result<Tensor> {
    let width = common_width(tables.iter().map(|t| t.num_predicates()))?;
    let ids: Vec<Vec<u32>> = tables.iter().map(|t| t.to_ids()).collect();
    let blocks: Vec<(&[u32], usize)> = ids
        .iter()
        .zip(tables)
        .map(|(ids, t)| (ids.as_slice(), t.len()))
        .collect();
    square_padding(&blocks, width, 0u32, device)
}

/// Pad validity masks on both position axes with zeros: `(B, L, L, P)` f32 tensor.
pub fn mask_padding(masks: &[&ValidityMask], device: &Device) -> Result<Tensor> {
    let width = common_width(masks.iter().map(|m| m.shape().2))?;
    let blocks: Vec<(&[f32], usize)> = masks.iter().map(|m| (m.values(), m.len())).collect();
    square_padding(&blocks, width, 0f32, device)
}
