use crate::{camera::Frame, labels::ClassTable, runtime::ModelError};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{Array, Ix4};

/// One classified label with its post-softmax probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

/// Resizes a frame to a square model input with bilinear interpolation,
/// normalizes pixels to [-1, 1] and reshapes into a single-item NHWC batch.
pub fn preprocess(frame: &Frame, input_size: u32) -> Result<Array<f32, Ix4>, ModelError> {
    let pixels: Vec<u8> = frame.pixels().iter().copied().collect();
    let image = RgbImage::from_raw(frame.width(), frame.height(), pixels).ok_or_else(|| {
        ModelError::Execution(format!(
            "frame buffer does not match {}x{} RGB",
            frame.width(),
            frame.height()
        ))
    })?;

    let resized = imageops::resize(&image, input_size, input_size, FilterType::Triangle);

    let size = input_size as usize;
    let mut input = Array::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, y, x, 0]] = (r as f32 - 127.5) / 127.5;
        input[[0, y, x, 1]] = (g as f32 - 127.5) / 127.5;
        input[[0, y, x, 2]] = (b as f32 - 127.5) / 127.5;
    }

    Ok(input)
}

/// Softmaxes the logits and extracts the top `k` classes, keeping only those
/// at or above `min_probability`. Ties resolve to the lower output index.
pub fn postprocess(
    logits: &[f32],
    labels: &ClassTable,
    top_k: usize,
    min_probability: f32,
) -> Vec<Prediction> {
    let probabilities = softmax(logits);

    let mut ranked: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
    // sort_by is stable, so equal probabilities keep ascending index order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .filter(|(_, probability)| *probability >= min_probability)
        .map(|(index, probability)| Prediction {
            label: labels.label(index),
            probability,
        })
        .collect()
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn table(n: usize) -> ClassTable {
        ClassTable::from_labels((0..n).map(|i| format!("class{}", i)).collect())
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let white = Frame::new(Array3::from_elem((2, 2, 3), 255));
        let input = preprocess(&white, 4).unwrap();

        assert_eq!(input.shape(), &[1, 4, 4, 3]);
        for value in input.iter() {
            assert!((value - 1.0).abs() < 1e-6);
        }

        let black = Frame::new(Array3::zeros((2, 2, 3)));
        let input = preprocess(&black, 4).unwrap();
        for value in input.iter() {
            assert!((value + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_is_a_distribution() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probabilities.iter().sum();

        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probabilities[2] > probabilities[1]);
        assert!(probabilities[1] > probabilities[0]);
    }

    #[test]
    fn test_postprocess_bounds_and_ordering() {
        let logits = vec![0.1, 3.0, 0.2, 2.5, 1.0, 0.0];
        let predictions = postprocess(&logits, &table(6), 3, 0.0);

        assert!(predictions.len() <= 3);
        for pair in predictions.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
        assert_eq!(predictions[0].label, "class1");
    }

    #[test]
    fn test_postprocess_filters_below_min_probability() {
        // near-uniform distribution, nothing reaches 0.5
        let logits = vec![0.1; 10];
        let predictions = postprocess(&logits, &table(10), 3, 0.5);
        assert!(predictions.is_empty());

        // strongly peaked distribution passes the same floor
        let mut peaked = vec![0.0; 10];
        peaked[4] = 10.0;
        let predictions = postprocess(&peaked, &table(10), 3, 0.5);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "class4");
        assert!(predictions[0].probability >= 0.5);
    }

    #[test]
    fn test_equal_probabilities_resolve_to_lower_index() {
        let mut logits = vec![0.0; 10];
        logits[2] = 3.0;
        logits[5] = 3.0;

        let predictions = postprocess(&logits, &table(10), 1, 0.0);

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "class2");
    }

    #[test]
    fn test_every_entry_meets_the_floor() {
        let logits = vec![2.0, -1.0, 0.5, 1.5, -2.0];
        let predictions = postprocess(&logits, &table(5), 5, 0.2);

        for prediction in &predictions {
            assert!(prediction.probability >= 0.2);
        }
    }
}
