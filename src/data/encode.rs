use ndarray::{Array2, ArrayView1, ArrayView3, Axis};

use super::model::Category;
use crate::error::{DatasetError, Result};

/// Category written where a residue position carries no active channel.
/// Same value as the real category `1`.
pub const EMPTY_POSITION: Category = 1;

/// Widest channel axis whose every index fits in a [`Category`].
pub const MAX_CHANNELS: usize = Category::MAX as usize + 1;

/// Collapse a one-hot block `(N, L, C)` into category ids `(N, L)`.
///
/// Each position becomes the index of its largest channel (first one on ties),
/// or [`EMPTY_POSITION`] when the channels sum to zero. Blocks with more than
/// [`MAX_CHANNELS`] channels are rejected before any position is read.
pub fn collapse_onehot(block: ArrayView3<'_, f32>) -> Result<Array2<Category>> {
    let channels = block.len_of(Axis(2));
    if channels > MAX_CHANNELS {
        return Err(DatasetError::TooManyChannels {
            channels,
            max: MAX_CHANNELS,
        });
    }
    Ok(block.map_axis(Axis(2), collapse_lane))
}

fn collapse_lane(lane: ArrayView1<'_, f32>) -> Category {
    if lane.sum() == 0.0 {
        return EMPTY_POSITION;
    }
    // channel count is bounded by MAX_CHANNELS
    Category::try_from(argmax(lane)).unwrap_or(Category::MAX)
}

/// numpy semantics: first maximum wins, a NaN wins immediately.
fn argmax(lane: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in lane.iter().enumerate() {
        if v.is_nan() {
            return i;
        }
        if i == 0 || v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
