/// Plate OCR model running on ONNX Runtime
use super::session::{ExecutionConfig, OnnxModel};
use crate::pipeline::{PlateRecognizer, Recognition};
use anyhow::{bail, Context, Result};
use image::{imageops::FilterType, GrayImage};
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the OCR model's per-position scores map to characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDecoder {
    /// Greedy CTC: blank at index 0, vocab starts at index 1
    Ctc,
    /// One argmax per fixed character slot; the pad character is dropped
    Slots,
}

impl FromStr for TextDecoder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ctc" => Ok(Self::Ctc),
            "slots" => Ok(Self::Slots),
            other => bail!("Unknown text decoder '{}' (expected ctc or slots)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Path to the OCR ONNX model file
    pub model_path: String,

    /// OCR model input width
    #[serde(default = "default_input_width")]
    pub input_width: u32,

    /// OCR model input height
    #[serde(default = "default_input_height")]
    pub input_height: u32,

    /// Character vocabulary, in model output order
    #[serde(default = "default_vocab")]
    pub vocab: String,

    #[serde(default = "default_decoder")]
    pub decoder: TextDecoder,

    /// Padding character emitted for unused slots (slot decoding only)
    #[serde(default = "default_pad_char")]
    pub pad_char: char,
}

fn default_input_width() -> u32 {
    200
}

fn default_input_height() -> u32 {
    64
}

fn default_vocab() -> String {
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-".to_string()
}

fn default_decoder() -> TextDecoder {
    TextDecoder::Ctc
}

fn default_pad_char() -> char {
    '_'
}

impl RecognizerConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            input_width: default_input_width(),
            input_height: default_input_height(),
            vocab: default_vocab(),
            decoder: default_decoder(),
            pad_char: default_pad_char(),
        }
    }
}

pub struct OnnxPlateRecognizer {
    config: RecognizerConfig,
    vocab: Vec<char>,
    model: OnnxModel,
}

impl OnnxPlateRecognizer {
    pub fn load(config: RecognizerConfig, execution: &ExecutionConfig) -> Result<Self> {
        let model = OnnxModel::load("recognizer", &config.model_path, execution)?;
        let vocab = config.vocab.chars().collect();
        Ok(Self {
            config,
            vocab,
            model,
        })
    }
}

impl PlateRecognizer for OnnxPlateRecognizer {
    fn id(&self) -> &'static str {
        "plate_ocr"
    }

    fn recognize(&self, plate: &GrayImage) -> Result<Recognition> {
        let input = preprocess(plate, self.config.input_width, self.config.input_height);
        let output = self
            .model
            .run(input, &["output", "output0", "logits"])
            .context("OCR inference failed")?;

        let text = match self.config.decoder {
            TextDecoder::Ctc => ctc_decode(&output, &self.vocab)?,
            TextDecoder::Slots => slot_decode(&output, &self.vocab, self.config.pad_char)?,
        };

        if text.is_empty() {
            Ok(Recognition::Nothing)
        } else {
            Ok(Recognition::Text(text))
        }
    }
}

/// Resize the grayscale crop and convert to normalized NCHW
fn preprocess(plate: &GrayImage, width: u32, height: u32) -> Array<f32, IxDyn> {
    let resized = image::imageops::resize(plate, width, height, FilterType::Triangle);

    let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
    for (x, y, pixel) in resized.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
    }

    input
}

fn argmax(scores: impl Iterator<Item = f32>) -> usize {
    scores
        .enumerate()
        .fold((0, f32::MIN), |best, (idx, score)| {
            if score > best.1 {
                (idx, score)
            } else {
                best
            }
        })
        .0
}

/// Greedy CTC decoding over a `[1, timesteps, vocab + 1]` output
fn ctc_decode(output: &Array<f32, IxDyn>, vocab: &[char]) -> Result<String> {
    let shape = output.shape();
    if shape.len() != 3 {
        bail!("Unexpected CTC output shape {:?}", shape);
    }
    let (sequence_length, classes) = (shape[1], shape[2]);

    let mut result = String::new();
    let mut prev_idx = 0;
    for t in 0..sequence_length {
        let idx = argmax((0..classes).map(|c| output[[0, t, c]]));

        // Skip blanks and repeats of the previous symbol
        if idx > 0 && idx != prev_idx {
            if let Some(ch) = vocab.get(idx - 1) {
                result.push(*ch);
            }
        }
        prev_idx = idx;
    }

    Ok(result)
}

/// Fixed-slot decoding over `[1, slots, vocab]` or flattened `[1, slots * vocab]`
fn slot_decode(output: &Array<f32, IxDyn>, vocab: &[char], pad_char: char) -> Result<String> {
    if vocab.is_empty() {
        bail!("Empty OCR vocabulary");
    }
    let shape = output.shape();
    let (slots, classes) = match shape {
        [1, slots, classes] => (*slots, *classes),
        [1, flat] if flat % vocab.len() == 0 => (flat / vocab.len(), vocab.len()),
        _ => bail!("Unexpected slot output shape {:?}", shape),
    };
    if classes != vocab.len() {
        bail!(
            "OCR output has {} classes but vocabulary has {}",
            classes,
            vocab.len()
        );
    }

    let flat: Vec<f32> = output.iter().copied().collect();
    let text = flat
        .chunks(classes)
        .take(slots)
        .map(|slot| vocab[argmax(slot.iter().copied())])
        .filter(|ch| *ch != pad_char)
        .collect();

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn vocab() -> Vec<char> {
        default_vocab().chars().collect()
    }

    fn one_hot(rows: &[usize], classes: usize) -> Vec<f32> {
        let mut data = vec![0.01f32; rows.len() * classes];
        for (t, idx) in rows.iter().enumerate() {
            data[t * classes + idx] = 0.9;
        }
        data
    }

    #[test]
    fn test_config_defaults() {
        let config = RecognizerConfig::new("models/plate_ocr.onnx");
        assert_eq!(config.input_width, 200);
        assert_eq!(config.input_height, 64);
        assert_eq!(config.decoder, TextDecoder::Ctc);
        assert_eq!(config.pad_char, '_');
        assert!(config.vocab.contains("0123456789"));
        assert!(config.vocab.contains("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));

        let parsed: RecognizerConfig = serde_json::from_value(serde_json::json!({
            "model_path": "ocr.onnx",
            "decoder": "slots"
        }))
        .unwrap();
        assert_eq!(parsed.decoder, TextDecoder::Slots);
        assert_eq!(parsed.input_width, 200);
    }

    #[test]
    fn test_text_decoder_from_str() {
        assert_eq!("CTC".parse::<TextDecoder>().unwrap(), TextDecoder::Ctc);
        assert_eq!("slots".parse::<TextDecoder>().unwrap(), TextDecoder::Slots);
        assert!("beam".parse::<TextDecoder>().is_err());
    }

    #[test]
    fn test_preprocess_is_single_channel() {
        let plate = GrayImage::from_pixel(90, 30, Luma([255]));
        let input = preprocess(&plate, 200, 64);

        assert_eq!(input.shape(), &[1, 1, 64, 200]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_ctc_decode() {
        // blank, A, A, B, blank, B, C -> "ABBC"
        let classes = vocab().len() + 1;
        let rows = [0, 11, 11, 12, 0, 12, 13];
        let output =
            Array::from_shape_vec(IxDyn(&[1, rows.len(), classes]), one_hot(&rows, classes))
                .unwrap();

        assert_eq!(ctc_decode(&output, &vocab()).unwrap(), "ABBC");
    }

    #[test]
    fn test_ctc_decode_all_blank_is_empty() {
        let classes = vocab().len() + 1;
        let rows = [0, 0, 0];
        let output =
            Array::from_shape_vec(IxDyn(&[1, rows.len(), classes]), one_hot(&rows, classes))
                .unwrap();

        assert_eq!(ctc_decode(&output, &vocab()).unwrap(), "");
    }

    #[test]
    fn test_slot_decode_strips_padding() {
        let vocab: Vec<char> = "ABC123_".chars().collect();
        // A, B, 1, 2, _, _
        let rows = [0, 1, 3, 4, 6, 6];
        let data = one_hot(&rows, vocab.len());

        let output = Array::from_shape_vec(IxDyn(&[1, rows.len(), vocab.len()]), data.clone()).unwrap();
        assert_eq!(slot_decode(&output, &vocab, '_').unwrap(), "AB12");

        let flat = Array::from_shape_vec(IxDyn(&[1, data.len()]), data).unwrap();
        assert_eq!(slot_decode(&flat, &vocab, '_').unwrap(), "AB12");
    }

    #[test]
    fn test_slot_decode_rejects_vocab_mismatch() {
        let vocab: Vec<char> = "ABC".chars().collect();
        let output = Array::from_shape_vec(IxDyn(&[1, 2, 5]), vec![0.0; 10]).unwrap();
        assert!(slot_decode(&output, &vocab, '_').is_err());
    }
}
