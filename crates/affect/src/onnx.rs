//! FER+ emotion model

use camera_capture::VideoFrame;
use std::collections::HashMap;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::info;

use crate::{AffectClassifier, AffectError};

const INPUT_SIZE: u32 = 64;

/// Output order of the FER+ model
pub const FERPLUS_LABELS: [&str; 8] = [
    "neutral",
    "happiness",
    "surprise",
    "sadness",
    "anger",
    "disgust",
    "fear",
    "contempt",
];

type EmotionPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Emotion classifier over a `1x1x64x64` grayscale tensor in `[0, 255]`.
/// Returns softmax scores in percent keyed by FER+ label.
pub struct OnnxEmotionClassifier {
    model: EmotionPlan,
}

impl OnnxEmotionClassifier {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AffectError> {
        let path = path.as_ref();
        info!("Loading emotion model from {}", path.display());

        let size = INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 1, size, size]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| AffectError::ModelLoad(e.to_string()))?;

        Ok(Self { model })
    }

    fn preprocess(frame: &VideoFrame) -> Result<Tensor, AffectError> {
        let gray = image::GrayImage::from_raw(frame.width, frame.height, frame.to_grayscale())
            .ok_or_else(|| AffectError::Classification("frame size mismatch".into()))?;
        let resized = image::imageops::resize(
            &gray,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let size = INPUT_SIZE as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            resized.get_pixel(x as u32, y as u32)[0] as f32
        });
        Ok(input.into())
    }
}

/// Softmax scaled to percent
pub(crate) fn softmax_percent(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum * 100.0).collect()
}

impl AffectClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, frame: &VideoFrame) -> Result<HashMap<String, f32>, AffectError> {
        let input = Self::preprocess(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| AffectError::Classification(e.to_string()))?;

        let logits = outputs
            .first()
            .ok_or_else(|| AffectError::Classification("model produced no output".into()))?
            .as_slice::<f32>()
            .map_err(|e| AffectError::Classification(e.to_string()))?;

        if logits.len() != FERPLUS_LABELS.len() {
            return Err(AffectError::Classification(format!(
                "expected {} logits, got {}",
                FERPLUS_LABELS.len(),
                logits.len()
            )));
        }

        Ok(FERPLUS_LABELS
            .iter()
            .zip(softmax_percent(logits))
            .map(|(label, score)| (label.to_string(), score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AffectScores;

    #[test]
    fn test_softmax_sums_to_hundred() {
        let scores = softmax_percent(&[1.0, 2.0, 3.0, 0.5]);
        let total: f32 = scores.iter().sum();
        assert!((total - 100.0).abs() < 1e-3);
        assert!(scores[2] > scores[1] && scores[1] > scores[0]);
    }

    #[test]
    fn test_softmax_is_shift_invariant() {
        let a = softmax_percent(&[1.0, 2.0, 3.0]);
        let b = softmax_percent(&[101.0, 102.0, 103.0]);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_ferplus_labels_fold() {
        let logits = [0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let raw: HashMap<String, f32> = FERPLUS_LABELS
            .iter()
            .zip(softmax_percent(&logits))
            .map(|(l, s)| (l.to_string(), s))
            .collect();
        let folded = AffectScores::fold(&raw);
        assert_eq!(folded.dominant(), "happy");
        assert!(folded.sad > 0.0);
    }

    #[test]
    fn test_missing_model_is_rejected() {
        let result = OnnxEmotionClassifier::new("/nonexistent/emotion-ferplus.onnx");
        assert!(matches!(result, Err(AffectError::ModelLoad(_))));
    }
}
