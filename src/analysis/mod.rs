// Analysis module - numeric helpers and the speech feature front end
//
// Pipeline per audio source:
// - WindowedSignalSource (audio): overlapping, preprocessed windows
// - WindowFeatureExtractor: log energy + mel cepstrum per channel
// - DerivativeAugmenter: delta and delta-delta blocks
// Output: FeatureFrame stream consumed by the trainer through containers

pub mod features;
pub mod vector;
