use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use super::error::ClassifierError;
use super::Prediction;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Parses a label file with one label per line.
///
/// Blank lines are skipped and a leading WordNet id (`n01440764 tench, Tinca tinca`)
/// is dropped so labels keep their comma-separated synonym form.
pub fn parse_labels(contents: &str) -> Result<Vec<String>, ClassifierError> {
    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| strip_wordnet_id(line).to_string())
        .collect();

    if labels.is_empty() {
        return Err(ClassifierError::LabelsError("Label file contains no labels".into()));
    }
    Ok(labels)
}

fn strip_wordnet_id(line: &str) -> &str {
    match line.split_once(' ') {
        Some((id, rest))
            if id.len() == 9
                && id.starts_with('n')
                && id[1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest.trim_start()
        }
        _ => line,
    }
}

/// Resizes to `size`x`size`, normalises with ImageNet statistics and lays the
/// pixels out as a `[1, 3, size, size]` tensor.
pub(crate) fn preprocess(image: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}

/// Converts logits to probabilities. Inputs that already form a distribution
/// are returned unchanged.
pub(crate) fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let sum: f32 = scores.iter().sum();
    if scores.iter().all(|&s| (0.0..=1.0).contains(&s)) && (sum - 1.0).abs() < 1e-3 {
        return scores.to_vec();
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Pairs probabilities with labels and keeps the `k` most likely, highest first.
pub(crate) fn top_k(probabilities: &[f32], labels: &[String], k: usize) -> Vec<Prediction> {
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().cloned().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(k)
        .map(|(index, probability)| {
            let label = labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class {}", index));
            Prediction::new(label, probability)
        })
        .collect()
}
