//! Age and gender estimation from aligned face crops.
//!
//! Optional head of the buffalo_l pack (genderage.onnx). Takes a 96×96
//! crop and emits either [female_logit, male_logit, age_scale] or the
//! two-logit variant without age.

use std::path::Path;
use std::sync::Mutex;

use facesight_hw::BackendDescriptor;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::model::{commit_session, ModelError};
use crate::types::Gender;

const GENDERAGE_INPUT_SIZE: usize = 96;
const GENDERAGE_MEAN: f32 = 127.5;
const GENDERAGE_STD: f32 = 128.0;
/// The model emits age as a fraction of this span.
const AGE_SCALE: f32 = 100.0;

/// genderage-based attribute head.
pub struct AttributeAnalyzer {
    session: Mutex<Session>,
}

impl AttributeAnalyzer {
    pub fn load(model_path: &Path, backends: &[BackendDescriptor]) -> Result<Self, ModelError> {
        let session = commit_session(model_path, backends)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded genderage model"
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Estimate age and gender from an aligned face crop. Age is absent for
    /// the two-logit model variant.
    pub fn analyze(&self, aligned: &RgbImage) -> Result<(Option<u32>, Gender), ModelError> {
        let input = Self::preprocess(aligned);

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("attribute head: {e}")))?;

        decode_attributes(raw)
    }

    /// Resize to 96×96 and normalize into a NCHW float tensor.
    fn preprocess(aligned: &RgbImage) -> Array4<f32> {
        let size = GENDERAGE_INPUT_SIZE;
        let resized = image::imageops::resize(
            aligned,
            size as u32,
            size as u32,
            image::imageops::FilterType::Lanczos3,
        );

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let pixel = resized.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] =
                        (pixel[c] as f32 - GENDERAGE_MEAN) / GENDERAGE_STD;
                }
            }
        }

        tensor
    }
}

/// Decode the raw output vector.
///
/// Three or more values: [female_logit, male_logit, age_fraction, ...],
/// age = fraction * 100 clamped to [1, 100]. Exactly two values: logits
/// only, no age.
fn decode_attributes(raw: &[f32]) -> Result<(Option<u32>, Gender), ModelError> {
    let (female, male) = match raw {
        [f, m, ..] => (*f, *m),
        _ => {
            return Err(ModelError::InferenceFailed(format!(
                "attribute head returned {} values, expected 2 or 3",
                raw.len()
            )))
        }
    };

    let gender = if male > female {
        Gender::Male
    } else {
        Gender::Female
    };

    let age = if raw.len() >= 3 {
        Some((raw[2] * AGE_SCALE).round().clamp(1.0, 100.0) as u32)
    } else {
        None
    };

    Ok((age, gender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_three_output_male() {
        let (age, gender) = decode_attributes(&[0.1, 0.9, 0.34]).unwrap();
        assert_eq!(gender, Gender::Male);
        assert_eq!(age, Some(34));
    }

    #[test]
    fn test_decode_three_output_female() {
        let (age, gender) = decode_attributes(&[0.8, 0.2, 0.27]).unwrap();
        assert_eq!(gender, Gender::Female);
        assert_eq!(age, Some(27));
    }

    #[test]
    fn test_decode_two_output_has_no_age() {
        let (age, gender) = decode_attributes(&[0.3, 0.7]).unwrap();
        assert_eq!(gender, Gender::Male);
        assert_eq!(age, None);
    }

    #[test]
    fn test_decode_age_clamped() {
        let (age, _) = decode_attributes(&[0.0, 1.0, 1.7]).unwrap();
        assert_eq!(age, Some(100));
        let (age, _) = decode_attributes(&[0.0, 1.0, -0.2]).unwrap();
        assert_eq!(age, Some(1));
    }

    #[test]
    fn test_decode_rejects_short_output() {
        assert!(decode_attributes(&[0.5]).is_err());
        assert!(decode_attributes(&[]).is_err());
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let aligned = RgbImage::from_pixel(112, 112, image::Rgb([128, 128, 128]));
        let tensor = AttributeAnalyzer::preprocess(&aligned);
        assert_eq!(tensor.shape(), &[1, 3, 96, 96]);
        let expected = (128.0 - GENDERAGE_MEAN) / GENDERAGE_STD;
        assert!((tensor[[0, 0, 48, 48]] - expected).abs() < 1e-6);
    }
}
