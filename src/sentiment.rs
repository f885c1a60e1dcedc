use crate::models::{Sentiment, SentimentLabel};

/// Lexicon-based polarity scorer for free-text feedback. Stands in for the
/// external VADER scorer the rest of the pipeline treats as a black box:
/// token valences are summed and squashed to a compound score in (-1, 1),
/// and the label cutoffs are the usual +/-0.05.
#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: Vec<(&'static str, f64)>,
}

// Valences on the VADER -4..4 scale, trimmed to academic-feedback vocabulary.
const LEXICON: &[(&str, f64)] = &[
    ("excellent", 3.2),
    ("outstanding", 3.1),
    ("great", 3.1),
    ("best", 3.2),
    ("love", 3.2),
    ("good", 1.9),
    ("happy", 2.7),
    ("enjoy", 2.2),
    ("enjoys", 2.2),
    ("improved", 1.8),
    ("improving", 1.8),
    ("improvement", 1.8),
    ("helpful", 1.8),
    ("motivated", 1.8),
    ("confident", 1.6),
    ("attentive", 1.4),
    ("consistent", 1.2),
    ("engaged", 1.4),
    ("terrible", -3.0),
    ("worst", -3.1),
    ("hate", -2.7),
    ("fail", -2.5),
    ("fails", -2.5),
    ("failing", -2.5),
    ("failed", -2.5),
    ("bad", -2.5),
    ("poor", -2.1),
    ("struggling", -1.8),
    ("struggles", -1.8),
    ("stressed", -1.8),
    ("stress", -1.6),
    ("worried", -1.5),
    ("weak", -1.5),
    ("difficult", -1.5),
    ("confused", -1.3),
    ("distracted", -1.3),
    ("absent", -1.1),
    ("declining", -1.6),
    ("disengaged", -1.6),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "cannot", "cant", "dont", "doesnt", "didnt", "isnt", "wasnt",
    "wont", "hardly",
];

// VADER's normalization constant and negation damping factor.
const NORM_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.to_vec(),
        }
    }

    fn valence(&self, token: &str) -> Option<f64> {
        self.lexicon
            .iter()
            .find(|(word, _)| *word == token)
            .map(|(_, v)| *v)
    }

    /// Scores `text` and labels it Positive (compound >= 0.05),
    /// Negative (<= -0.05) or Neutral.
    pub fn analyze(&self, text: &str) -> Sentiment {
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|t| t.replace('\'', ""))
            .filter(|t| !t.is_empty())
            .collect();

        let mut total = 0.0;
        for (i, token) in tokens.iter().enumerate() {
            let Some(mut valence) = self.valence(token) else {
                continue;
            };
            if i > 0 && NEGATORS.contains(&tokens[i - 1].as_str()) {
                valence *= NEGATION_SCALAR;
            }
            total += valence;
        }

        let compound = if total == 0.0 {
            0.0
        } else {
            total / (total * total + NORM_ALPHA).sqrt()
        };

        let label = if compound >= 0.05 {
            SentimentLabel::Positive
        } else if compound <= -0.05 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Sentiment {
            score: compound,
            label,
        }
    }
}
