// Analysis module - per-frame detection pipeline
//
// Architecture:
// - SpectrumAnalyser: PCM window → byte magnitude snapshot
// - Frame: snapshot → (level, frequency_vector)
// - TransientDetector + similarity::score → TriggerEngine
// - Output: TriggerDecision, the session layer invokes the host callback

pub mod frame;
pub mod similarity;
pub mod spectrum;
pub mod transient;
pub mod trigger;

pub use frame::Frame;
pub use similarity::cosine_similarity;
pub use spectrum::SpectrumAnalyser;
pub use transient::{TransientDetector, TransientStep};
pub use trigger::{DetectionParams, TriggerDecision, TriggerEngine};
