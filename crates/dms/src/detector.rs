//! Face-mesh landmark detection

use camera_capture::VideoFrame;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::landmarks::{FaceLandmarks, LandmarkExtractor, Point};
use crate::{DmsConfig, DmsError};

/// Face-mesh input resolution
const MESH_INPUT: u32 = 192;
/// Landmarks produced by the face-mesh model
const MESH_POINTS: usize = 468;

/// Eye corners and lid pairs, right eye
pub const RIGHT_EYE_INDICES: [usize; 6] = [33, 160, 159, 133, 145, 144];
/// Eye corners and lid pairs, left eye
pub const LEFT_EYE_INDICES: [usize; 6] = [362, 385, 386, 263, 374, 373];
/// Mouth corners and inner lip pairs
pub const MOUTH_INDICES: [usize; 13] = [78, 308, 13, 14, 82, 87, 312, 317, 191, 80, 81, 311, 310];

type MeshPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Face-mesh landmark extractor running an ONNX model with tract.
///
/// The model takes a `1x3x192x192` RGB tensor scaled to `[0, 1]` and returns
/// `468 * 3` landmark coordinates in input pixels plus a face presence logit.
pub struct FaceMeshDetector {
    confidence_threshold: f32,
    model: Option<MeshPlan>,
}

impl FaceMeshDetector {
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .landmark_model_path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no face-mesh model path configured".into()))?;

        info!("Loading face-mesh model from {}", path);
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(
                    0,
                    f32::fact([1, 3, MESH_INPUT as usize, MESH_INPUT as usize]).into(),
                )
            })
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| DmsError::ModelLoad(e.to_string()))?;

        Ok(Self {
            confidence_threshold: config.face_confidence,
            model: Some(model),
        })
    }

    fn preprocess(frame: &VideoFrame) -> Result<Tensor, DmsError> {
        let img = frame
            .as_image()
            .ok_or_else(|| DmsError::ImageProcessing("Failed to create image buffer".into()))?;
        let resized = image::imageops::resize(
            &img,
            MESH_INPUT,
            MESH_INPUT,
            image::imageops::FilterType::Triangle,
        );

        let size = MESH_INPUT as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into())
    }

    /// Map a model-space landmark back into frame pixels
    fn to_frame(raw: &[f32], index: usize, frame: &VideoFrame) -> Point {
        let scale_x = frame.width as f32 / MESH_INPUT as f32;
        let scale_y = frame.height as f32 / MESH_INPUT as f32;
        Point::new(raw[index * 3] * scale_x, raw[index * 3 + 1] * scale_y)
    }

    fn pick<const N: usize>(raw: &[f32], indices: &[usize; N], frame: &VideoFrame) -> [Point; N] {
        (*indices).map(|i| Self::to_frame(raw, i, frame))
    }
}

impl LandmarkExtractor for FaceMeshDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| DmsError::Inference("face-mesh model released".into()))?;

        let input = Self::preprocess(frame)?;
        let outputs = model
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        if outputs.len() < 2 {
            return Err(DmsError::Inference(format!(
                "expected landmark and score outputs, got {}",
                outputs.len()
            )));
        }

        let landmarks = outputs[0]
            .as_slice::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let logit = outputs[1]
            .as_slice::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?
            .first()
            .copied()
            .unwrap_or(f32::NEG_INFINITY);

        let score = 1.0 / (1.0 + (-logit).exp());
        if score < self.confidence_threshold {
            debug!("Face presence {:.2} below threshold", score);
            return Ok(None);
        }
        if landmarks.len() < MESH_POINTS * 3 {
            return Err(DmsError::Inference(format!(
                "expected {} landmark values, got {}",
                MESH_POINTS * 3,
                landmarks.len()
            )));
        }

        Ok(Some(FaceLandmarks {
            right_eye: Self::pick(landmarks, &RIGHT_EYE_INDICES, frame),
            left_eye: Self::pick(landmarks, &LEFT_EYE_INDICES, frame),
            mouth: Self::pick(landmarks, &MOUTH_INDICES, frame),
        }))
    }

    fn release(&mut self) {
        if self.model.take().is_some() {
            info!("Face-mesh model released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_path_is_rejected() {
        let result = FaceMeshDetector::new(&DmsConfig::default());
        assert!(matches!(result, Err(DmsError::ModelLoad(_))));
    }

    #[test]
    fn test_unreadable_model_is_rejected() {
        let config = DmsConfig {
            landmark_model_path: Some("/nonexistent/face_mesh.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(FaceMeshDetector::new(&config), Err(DmsError::ModelLoad(_))));
    }

    #[test]
    fn test_landmarks_scale_to_frame() {
        let frame = VideoFrame::new(vec![0; 384 * 96 * 3], 384, 96, 0, 0);
        let mut raw = vec![0.0f32; MESH_POINTS * 3];
        raw[33 * 3] = 96.0;
        raw[33 * 3 + 1] = 48.0;

        let eye = FaceMeshDetector::pick(&raw, &RIGHT_EYE_INDICES, &frame);
        assert_eq!(eye[0], Point::new(192.0, 24.0));
    }

    #[test]
    fn test_indices_fit_mesh() {
        let max = RIGHT_EYE_INDICES
            .iter()
            .chain(LEFT_EYE_INDICES.iter())
            .chain(MOUTH_INDICES.iter())
            .max()
            .copied()
            .unwrap_or(0);
        assert!(max < MESH_POINTS);
    }
}
