// Derivative augmenter - first and second order deltas over a frame queue
//
// Deltas use the regression formula
//
//   d[j] = sum_{k=1..T} k * (next_k[j] - prev_k[j]) / (2 * sum_{k=1..T} k^2)
//
// over a queue of 3T + 1 frames. The queue starts with 3T pad frames (copies
// of the first real frame) followed by the first real frame, and at the end
// of the stream it is topped up with pads, so every real frame passes the
// positions where both derivative orders are computed.

use std::collections::VecDeque;

use super::types::FeatureFrame;
use crate::error::PipelineError;

/// Highest derivative order appended to each frame
pub const DERIVATIVE_ORDERS: usize = 2;

/// Source of base (derivative-free) feature frames
pub trait BaseFrameSource {
    fn has_next_frame(&self) -> bool;

    fn next_frame(&mut self) -> Result<FeatureFrame, PipelineError>;
}

/// Wraps a [`BaseFrameSource`] and appends derivative blocks to its frames
pub struct DerivativeAugmenter<S: BaseFrameSource> {
    source: S,
    half_window: usize,
    queue: VecDeque<FeatureFrame>,
    pad: FeatureFrame,
}

impl<S: BaseFrameSource> DerivativeAugmenter<S> {
    /// Prime the queue so the first real frame is at its head
    ///
    /// # Errors
    /// `DataUnavailable` if the source has no frame at all, `MalformedInput`
    /// for a zero half-window.
    pub fn new(mut source: S, half_window: usize) -> Result<Self, PipelineError> {
        if half_window == 0 {
            return Err(PipelineError::malformed("derivative half-window must be positive"));
        }
        if !source.has_next_frame() {
            return Err(PipelineError::unavailable(
                "derivative augmenter",
                "source produced no frames",
            ));
        }

        let first = source.next_frame()?;
        let pad = first.to_pad();
        let capacity = 3 * half_window + 1;

        let mut queue = VecDeque::with_capacity(capacity);
        queue.extend(std::iter::repeat(pad.clone()).take(capacity - 1));
        queue.push_back(first);

        let mut augmenter = Self {
            source,
            half_window,
            queue,
            pad,
        };
        for _ in 0..capacity - 1 {
            augmenter.pull()?;
        }
        Ok(augmenter)
    }

    /// True while the head of the queue is a real frame
    pub fn has_next(&self) -> bool {
        self.queue.front().is_some_and(|frame| !frame.is_pad())
    }

    /// Next real frame with both derivative blocks appended
    pub fn next(&mut self) -> Result<FeatureFrame, PipelineError> {
        if !self.has_next() {
            return Err(PipelineError::unavailable(
                "derivative augmenter",
                "stream exhausted",
            ));
        }
        self.pull()
    }

    /// Underlying base frame source
    pub fn source(&self) -> &S {
        &self.source
    }

    fn pull(&mut self) -> Result<FeatureFrame, PipelineError> {
        append_derivatives(
            self.queue.make_contiguous(),
            self.half_window,
            DERIVATIVE_ORDERS,
        );

        let head = self.queue.pop_front().ok_or_else(|| {
            PipelineError::unavailable("derivative augmenter", "queue is empty")
        })?;

        let incoming = if self.source.has_next_frame() {
            self.source.next_frame()?
        } else {
            self.pad.clone()
        };
        self.queue.push_back(incoming);

        Ok(head)
    }
}

/// Append derivative orders `1..=max_order` wherever context allows
///
/// Order `q` is computed for frames `half_window..len - q * half_window`
/// whose highest appended order is `q - 1`. When a neighbour lacks the
/// needed block (a pad without derivatives yet) the rest of the block stays
/// zero, but the frame still moves on to order `q`.
pub fn append_derivatives(frames: &mut [FeatureFrame], half_window: usize, max_order: usize) {
    let denominator = 2.0 * (1..=half_window).map(|k| (k * k) as f64).sum::<f64>();

    for order in 1..=max_order {
        let end = frames.len().saturating_sub(order * half_window);
        for i in half_window..end {
            if frames[i].highest_derivative() != order - 1 {
                continue;
            }

            let base = frames[i].base_feature_length();
            let from = (order - 1) * base;
            let mut features = vec![0.0; base * (order + 1)];
            features[..base * order].copy_from_slice(&frames[i].features()[..base * order]);

            'block: for j in from..from + base {
                let mut numerator = 0.0;
                for k in 1..=half_window {
                    let prev = frames[i - k].features();
                    let next = frames[i + k].features();
                    if prev.len() <= j || next.len() <= j {
                        break 'block;
                    }
                    numerator += k as f64 * (next[j] - prev[j]);
                }
                features[j + base] = numerator / denominator;
            }

            frames[i].set_derivatives(features, order);
        }
    }
}
