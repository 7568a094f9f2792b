use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

use crate::error::{DedupError, DedupResult};

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

/// Radius substituted for a sensitivity of exactly zero.
pub const MIN_SENSITIVITY: f32 = 0.001;

#[derive(Deserialize)]
pub struct DocdupConfig {
    pub text_extensions: Option<Vec<String>>,
    pub image_extensions: Option<Vec<String>>,
    pub temp_prefix: Option<String>,
    pub ngram_min: Option<usize>,
    pub ngram_max: Option<usize>,
    pub lowercase: Option<bool>,
    pub min_points: Option<usize>,
    pub topic_iterations: Option<usize>,
    pub topic_words: Option<usize>,
    pub topic_beta: Option<f64>,
    pub topic_min_df: Option<usize>,
    pub topic_max_df: Option<f64>,
    pub topic_count: Option<usize>,
    pub excerpt_radius: Option<usize>,
    pub mmap_threshold: Option<u64>,
    pub verbose: Option<bool>,
}

impl DocdupConfig {
    pub fn try_from(config: &Config) -> Self {
        DocdupConfig {
            text_extensions: config.get("text_extensions").ok(),
            image_extensions: config.get("image_extensions").ok(),
            temp_prefix: config.get("temp_prefix").ok(),
            ngram_min: config.get("ngram_min").ok(),
            ngram_max: config.get("ngram_max").ok(),
            lowercase: config.get("lowercase").ok(),
            min_points: config.get("min_points").ok(),
            topic_iterations: config.get("topic_iterations").ok(),
            topic_words: config.get("topic_words").ok(),
            topic_beta: config.get("topic_beta").ok(),
            topic_min_df: config.get("topic_min_df").ok(),
            topic_max_df: config.get("topic_max_df").ok(),
            topic_count: config.get("topic_count").ok(),
            excerpt_radius: config.get("excerpt_radius").ok(),
            mmap_threshold: config.get("mmap_threshold").ok(),
            verbose: config.get("verbose").ok(),
        }
    }
}

/// Resolved, validated settings for one process.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub text_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    pub temp_prefix: String,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub lowercase: bool,
    pub min_points: usize,
    pub topic_iterations: usize,
    pub topic_words: usize,
    pub topic_beta: f64,
    pub topic_min_df: usize,
    pub topic_max_df: f64,
    pub topic_count: Option<usize>,
    pub excerpt_radius: usize,
    pub mmap_threshold: u64,
    pub verbose: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            text_extensions: to_strings(&["pdf", "docx", "msg", "txt", "pptx"]),
            image_extensions: to_strings(&["bmp", "png", "jpg", "jpeg", "gif", "tiff"]),
            temp_prefix: "~$".to_string(),
            ngram_min: 1,
            ngram_max: 5,
            lowercase: false,
            min_points: 2,
            topic_iterations: 200,
            topic_words: 10,
            topic_beta: 0.01,
            topic_min_df: 2,
            topic_max_df: 0.95,
            topic_count: None,
            excerpt_radius: 500,
            mmap_threshold: 1024 * 1024,
            verbose: false,
        }
    }
}

impl State {
    /// Loads `docdup_config.*` from the working directory, then `DOCDUP_*` env vars.
    pub fn new() -> DedupResult<Self> {
        let mut config = Config::default();
        #[allow(deprecated)]
        {
            config.merge(ConfigFile::with_name("docdup_config").required(false))?;
            config.merge(
                Environment::with_prefix("DOCDUP")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("text_extensions")
                    .with_list_parse_key("image_extensions"),
            )?;
        }

        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> DedupResult<Self> {
        let raw = DocdupConfig::try_from(config);
        let defaults = State::default();

        let state = Self {
            text_extensions: raw
                .text_extensions
                .map(lowercase_all)
                .unwrap_or(defaults.text_extensions),
            image_extensions: raw
                .image_extensions
                .map(lowercase_all)
                .unwrap_or(defaults.image_extensions),
            temp_prefix: raw.temp_prefix.unwrap_or(defaults.temp_prefix),
            ngram_min: raw.ngram_min.unwrap_or(defaults.ngram_min),
            ngram_max: raw.ngram_max.unwrap_or(defaults.ngram_max),
            lowercase: raw.lowercase.unwrap_or(defaults.lowercase),
            min_points: raw.min_points.unwrap_or(defaults.min_points),
            topic_iterations: raw.topic_iterations.unwrap_or(defaults.topic_iterations),
            topic_words: raw.topic_words.unwrap_or(defaults.topic_words),
            topic_beta: raw.topic_beta.unwrap_or(defaults.topic_beta),
            topic_min_df: raw.topic_min_df.unwrap_or(defaults.topic_min_df),
            topic_max_df: raw.topic_max_df.unwrap_or(defaults.topic_max_df),
            topic_count: raw.topic_count.or(defaults.topic_count),
            excerpt_radius: raw.excerpt_radius.unwrap_or(defaults.excerpt_radius),
            mmap_threshold: raw.mmap_threshold.unwrap_or(defaults.mmap_threshold),
            verbose: raw.verbose.unwrap_or(defaults.verbose),
        };
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> DedupResult<()> {
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(DedupError::Settings(format!(
                "ngram range {}..={} is invalid",
                self.ngram_min, self.ngram_max
            )));
        }
        if self.min_points < 2 {
            return Err(DedupError::Settings(
                "min_points must be at least 2".to_string(),
            ));
        }
        if !(self.topic_max_df > 0.0 && self.topic_max_df <= 1.0) {
            return Err(DedupError::Settings(format!(
                "topic_max_df must be in (0, 1], got {}",
                self.topic_max_df
            )));
        }
        if self.topic_beta <= 0.0 {
            return Err(DedupError::Settings(
                "topic_beta must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_text_extension(&self, ext: &str) -> bool {
        self.text_extensions.iter().any(|e| e == ext)
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions.iter().any(|e| e == ext)
    }

    pub fn print_config(&self) {
        println!("text_extensions={}", self.text_extensions.join(","));
        println!("image_extensions={}", self.image_extensions.join(","));
        println!("temp_prefix={}", self.temp_prefix);
        println!("ngram_range={}..={}", self.ngram_min, self.ngram_max);
        println!("lowercase={}", self.lowercase);
        println!("min_points={}", self.min_points);
        println!("topic_iterations={}", self.topic_iterations);
        println!("topic_words={}", self.topic_words);
        println!("topic_beta={}", self.topic_beta);
        println!("topic_min_df={}", self.topic_min_df);
        println!("topic_max_df={}", self.topic_max_df);
        match self.topic_count {
            Some(count) => println!("topic_count={}", count),
            None => println!("topic_count=auto"),
        }
        println!("excerpt_radius={}", self.excerpt_radius);
        println!("mmap_threshold={}", self.mmap_threshold);
        println!("verbose={}", self.verbose);
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn lowercase_all(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().trim_start_matches('.').to_lowercase())
        .collect()
}
