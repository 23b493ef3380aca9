use crate::framework::analyzers::{parse_score, ScoreParseError};
use crate::framework::config::Rgb;
use log::{debug, warn};

/// Scores are clamped to +/- this many pawns before display
pub const SCORE_LIMIT: f64 = 5.0;

/// Scores within +/- this band count as balanced
pub const ADVANTAGE_THRESHOLD: f64 = 0.2;

/// Map a score in pawns onto the fraction of the bar shown as the
/// positive region: -5 and below is 0.0, 0 is 0.5, +5 and above is 1.0.
pub fn score_to_fraction(score: f64) -> f64 {
    (score.clamp(-SCORE_LIMIT, SCORE_LIMIT) + SCORE_LIMIT) / (2.0 * SCORE_LIMIT)
}

/// Which side the current evaluation favours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advantage {
    Positive,
    Negative,
    Neutral,
}

impl Advantage {
    pub fn from_score(score: f64) -> Self {
        if score > ADVANTAGE_THRESHOLD {
            Advantage::Positive
        } else if score < -ADVANTAGE_THRESHOLD {
            Advantage::Negative
        } else {
            Advantage::Neutral
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Advantage::Positive => Rgb::new(0x4C, 0xAF, 0x50),
            Advantage::Negative => Rgb::new(0xF4, 0x43, 0x36),
            Advantage::Neutral => Rgb::new(0x9E, 0x9E, 0x9E),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Advantage::Positive => "positive",
            Advantage::Negative => "negative",
            Advantage::Neutral => "neutral",
        }
    }
}

/// Two-region evaluation bar.
///
/// The positive region occupies `fraction * total_extent` cells (rounded)
/// and the negative region takes the remainder, so the two always add up
/// to the full extent.
#[derive(Debug, Clone)]
pub struct EvalBar {
    total_extent: u32,
    score: Option<f64>,
    fraction: f64,
    advantage: Advantage,
}

impl EvalBar {
    pub fn new(total_extent: u32) -> Self {
        Self {
            total_extent,
            score: None,
            fraction: 0.5,
            advantage: Advantage::Neutral,
        }
    }

    /// Update the bar from a raw evaluation payload. Unparseable payloads
    /// leave the bar untouched.
    pub fn on_evaluation(&mut self, raw: &str) -> Result<f64, ScoreParseError> {
        match parse_score(raw) {
            Ok(score) => {
                self.set_score(score);
                Ok(self.fraction)
            }
            Err(e) => {
                warn!("Discarding evaluation: {}", e);
                Err(e)
            }
        }
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = Some(score);
        self.fraction = score_to_fraction(score);
        self.advantage = Advantage::from_score(score);
        debug!(
            "EvalBar: score {:+.2} -> fraction {:.2} ({})",
            score,
            self.fraction,
            self.advantage.as_str()
        );
    }

    /// Back to the balanced starting position
    pub fn reset(&mut self) {
        *self = Self::new(self.total_extent);
    }

    #[allow(dead_code)]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    #[allow(dead_code)]
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    #[allow(dead_code)]
    pub fn advantage(&self) -> Advantage {
        self.advantage
    }

    pub fn color(&self) -> Rgb {
        self.advantage.color()
    }

    /// Extents of the (positive, negative) regions
    pub fn regions(&self) -> (u32, u32) {
        let positive = (self.fraction * self.total_extent as f64).round() as u32;
        let positive = positive.min(self.total_extent);
        (positive, self.total_extent - positive)
    }

    /// Text rendering: `[####------] +0.35 (positive #4CAF50)`
    pub fn render(&self) -> String {
        let (positive, negative) = self.regions();
        let score = match self.score {
            Some(score) => format!("{:+.2}", score),
            None => "--".to_string(),
        };
        format!(
            "[{}{}] {} ({} {})",
            "#".repeat(positive as usize),
            "-".repeat(negative as usize),
            score,
            self.advantage.as_str(),
            self.color()
        )
    }
}
