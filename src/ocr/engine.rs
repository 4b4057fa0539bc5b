use anyhow::{Result, anyhow};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    /// Mean word confidence
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Text-from-image boundary consumed by the score pipeline.
pub trait TextRecognizer {
    /// Recognizes text in a grayscale raster, emitting only characters from
    /// `allowlist`. Returns fragments in reading order.
    fn recognize(&self, img: &GrayImage, allowlist: &str) -> Result<Vec<String>>;
}

/// Tesseract run as an external process.
///
/// Constructed once at startup and passed to whatever needs recognition.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, language: &str, psm: u8) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: language.to_string(),
            psm,
        }
    }

    /// Runs Tesseract and returns structured output with lines and confidence scores.
    pub fn recognize_lines(&self, img: &GrayImage, allowlist: &str) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        // Create temporary output base (Tesseract adds .tsv extension)
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string());
        if !allowlist.is_empty() {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", allowlist));
        }
        let output = command.arg("tsv").output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage, allowlist: &str) -> Result<Vec<String>> {
        let lines = self.recognize_lines(img, allowlist)?;
        for line in &lines {
            crate::log(&format!(
                "OCR line: '{}' (conf: {:.0}%)",
                line.text, line.confidence
            ));
        }
        Ok(lines.into_iter().map(|l| l.text).collect())
    }
}

fn finish_line(words: Vec<OcrWord>, lines: &mut Vec<OcrLine>) {
    if words.is_empty() {
        return;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine { text, confidence });
}

/// Parses Tesseract TSV output into structured OcrLine data
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let block_num: i32 = fields[2].parse().unwrap_or(-1);
        let par_num: i32 = fields[3].parse().unwrap_or(-1);
        let line_num: i32 = fields[4].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (block_num, par_num, line_num);
        if current_key != Some(key) {
            finish_line(std::mem::take(&mut current_words), &mut lines);
            current_key = Some(key);
        }

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    finish_line(current_words, &mut lines);

    lines
}
