use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::lexicon::SentimentLexicon;
use crate::models::Sentiment;

/// Below this model confidence a polarized label is not trustworthy and is
/// reported as neutral.
pub const CONFIDENCE_FLOOR: f64 = 0.6;
/// Inference input is capped to bound latency on long comments.
pub const MAX_INFERENCE_CHARS: usize = 500;
/// A language is only reported when its function-word match count is
/// strictly greater than this.
pub const MIN_LANGUAGE_MATCHES: usize = 3;
pub const BASELINE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentVerdict {
    pub sentiment: Sentiment,
    pub score: f64,
    pub confidence: f64,
    pub language: String,
}

impl SentimentVerdict {
    pub fn neutral(confidence: f64, language: &str) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            score: 0.5,
            confidence,
            language: language.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierStatus {
    pub ready: bool,
    pub analysis_count: u64,
}

/// Raw model output: a binary label plus the model's certainty in it.
#[derive(Debug, Clone, Copy)]
struct ModelOutput {
    label: Sentiment,
    confidence: f64,
}

struct SentimentModel {
    lexicon: SentimentLexicon,
}

impl SentimentModel {
    fn build() -> Self {
        Self {
            lexicon: SentimentLexicon::build(),
        }
    }

    fn infer(&self, text: &str) -> ModelOutput {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        let mut total = 0.0;
        let mut matched = 0usize;
        let mut negation_window = 0usize;
        let mut boost = 1.0;
        let mut boost_window = 0usize;

        for token in &tokens {
            if self.lexicon.is_negation(token) {
                negation_window = 3;
                continue;
            }
            if let Some(mult) = self.lexicon.intensity(token) {
                boost = mult;
                boost_window = 3;
                continue;
            }
            if let Some(weight) = self.lexicon.weight(token) {
                let mut w = weight;
                if boost_window > 0 {
                    w *= boost;
                }
                if negation_window > 0 {
                    w = -w * 0.8;
                }
                total += w;
                matched += 1;
                negation_window = 0;
                boost_window = 0;
                boost = 1.0;
            } else {
                negation_window = negation_window.saturating_sub(1);
                boost_window = boost_window.saturating_sub(1);
            }
        }

        let mean = if matched == 0 {
            0.0
        } else {
            (total / matched as f64).clamp(-1.0, 1.0)
        };
        let coverage = matched as f64 / tokens.len().max(1) as f64;
        let strength = (0.4 * coverage.min(1.0) + 0.6 * mean.abs()).min(1.0);

        ModelOutput {
            label: if mean >= 0.0 {
                Sentiment::Positive
            } else {
                Sentiment::Negative
            },
            confidence: 0.5 + strength / 2.0,
        }
    }
}

struct ClassifierInner {
    model: OnceLock<SentimentModel>,
    ready: watch::Receiver<bool>,
    analysis_count: AtomicU64,
}

#[derive(Clone)]
pub struct SentimentClassifier {
    inner: Arc<ClassifierInner>,
}

impl SentimentClassifier {
    /// Starts the one-time model load in the background. Classification
    /// requests arriving before the load completes degrade to neutral.
    pub fn load() -> Self {
        let (tx, rx) = watch::channel(false);
        let inner = Arc::new(ClassifierInner {
            model: OnceLock::new(),
            ready: rx,
            analysis_count: AtomicU64::new(0),
        });

        let worker = Arc::clone(&inner);
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(SentimentModel::build).await {
                Ok(model) => {
                    let _ = worker.model.set(model);
                    let _ = tx.send(true);
                    info!("sentiment model loaded");
                }
                Err(err) => {
                    error!("sentiment model load failed: {err}");
                }
            }
        });

        Self { inner }
    }

    /// Builds the model synchronously. Used by tests and one-shot commands.
    pub fn preloaded() -> Self {
        let (tx, rx) = watch::channel(true);
        let inner = ClassifierInner {
            model: OnceLock::new(),
            ready: rx,
            analysis_count: AtomicU64::new(0),
        };
        let _ = inner.model.set(SentimentModel::build());
        drop(tx);
        Self {
            inner: Arc::new(inner),
        }
    }

    #[cfg(test)]
    fn pending() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let inner = Arc::new(ClassifierInner {
            model: OnceLock::new(),
            ready: rx,
            analysis_count: AtomicU64::new(0),
        });
        (Self { inner }, tx)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.model.get().is_some()
    }

    /// Blocks until the model is loaded or the timeout elapses. Returns the
    /// readiness state either way; callers degrade rather than fail.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        let mut ready = self.inner.ready.clone();
        let _ = tokio::time::timeout(timeout, async {
            while !*ready.borrow() {
                if ready.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        self.is_ready()
    }

    pub fn classify(&self, text: &str) -> SentimentVerdict {
        let language = detect_language(text);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SentimentVerdict::neutral(0.0, BASELINE_LANGUAGE);
        }

        let Some(model) = self.inner.model.get() else {
            warn!("classifier not ready, degrading to neutral");
            return SentimentVerdict::neutral(0.0, &language);
        };

        let capped: String = trimmed.chars().take(MAX_INFERENCE_CHARS).collect();
        let output = model.infer(&capped);
        self.inner.analysis_count.fetch_add(1, Ordering::Relaxed);

        apply_confidence_gate(output, &language)
    }

    pub async fn classify_with_wait(&self, text: &str, timeout: Duration) -> SentimentVerdict {
        self.wait_ready(timeout).await;
        self.classify(text)
    }

    pub fn status(&self) -> ClassifierStatus {
        ClassifierStatus {
            ready: self.is_ready(),
            analysis_count: self.inner.analysis_count.load(Ordering::Relaxed),
        }
    }
}

/// Maps the binary model output to the three-way taxonomy. Low-confidence
/// polarized calls are reported as neutral.
fn apply_confidence_gate(output: ModelOutput, language: &str) -> SentimentVerdict {
    if output.confidence < CONFIDENCE_FLOOR {
        return SentimentVerdict::neutral(output.confidence, language);
    }
    let (sentiment, score) = match output.label {
        Sentiment::Positive => (Sentiment::Positive, output.confidence),
        Sentiment::Negative => (Sentiment::Negative, 1.0 - output.confidence),
        Sentiment::Neutral => (Sentiment::Neutral, 0.5),
    };
    SentimentVerdict {
        sentiment,
        score,
        confidence: output.confidence,
        language: language.to_string(),
    }
}

fn detect_language(text: &str) -> String {
    const FRENCH: &[&str] = &[
        "le", "la", "les", "de", "du", "des", "un", "une", "et", "est", "dans", "pour", "avec",
        "sur", "pas", "plus", "tres", "nous", "vous", "je",
    ];
    const SPANISH: &[&str] = &[
        "el", "la", "los", "las", "de", "del", "un", "una", "y", "es", "en", "para", "con",
        "sobre", "no", "mas", "muy", "pero", "este", "esta",
    ];
    const GERMAN: &[&str] = &[
        "der", "die", "das", "den", "dem", "des", "ein", "eine", "und", "ist", "in", "mit",
        "auf", "nicht", "mehr", "sehr", "aber", "war", "fur", "sind",
    ];

    let mut counts = [("fr", 0usize), ("es", 0usize), ("de", 0usize)];
    for token in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if FRENCH.contains(&token.as_str()) {
            counts[0].1 += 1;
        }
        if SPANISH.contains(&token.as_str()) {
            counts[1].1 += 1;
        }
        if GERMAN.contains(&token.as_str()) {
            counts[2].1 += 1;
        }
    }

    let (best, count) = counts
        .iter()
        .max_by_key(|(_, count)| *count)
        .copied()
        .unwrap_or((BASELINE_LANGUAGE, 0));
    if count > MIN_LANGUAGE_MATCHES {
        best.to_string()
    } else {
        BASELINE_LANGUAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_short_circuits_to_neutral() {
        let classifier = SentimentClassifier::preloaded();
        let verdict = classifier.classify("   ");
        assert_eq!(verdict.sentiment, Sentiment::Neutral);
        assert_eq!(verdict.score, 0.5);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(classifier.status().analysis_count, 0);
    }

    #[test]
    fn positive_comment_scores_above_midpoint() {
        let classifier = SentimentClassifier::preloaded();
        let verdict = classifier.classify("Absolutely amazing workshop, loved every minute");
        assert_eq!(verdict.sentiment, Sentiment::Positive);
        assert!(verdict.score > 0.5);
        assert!(verdict.confidence >= CONFIDENCE_FLOOR);
    }

    #[test]
    fn negative_comment_scores_below_midpoint() {
        let classifier = SentimentClassifier::preloaded();
        let verdict = classifier.classify("Terrible session, boring and a waste of time");
        assert_eq!(verdict.sentiment, Sentiment::Negative);
        assert!(verdict.score < 0.5);
    }

    #[test]
    fn negation_flips_polarity() {
        let classifier = SentimentClassifier::preloaded();
        let verdict = classifier.classify("This was not good, not helpful at all");
        assert_ne!(verdict.sentiment, Sentiment::Positive);
    }

    #[test]
    fn factual_text_stays_neutral() {
        let classifier = SentimentClassifier::preloaded();
        let verdict = classifier.classify("The session started at nine in the morning");
        assert_eq!(verdict.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn low_confidence_positive_is_gated_to_neutral() {
        let output = ModelOutput {
            label: Sentiment::Positive,
            confidence: 0.55,
        };
        let verdict = apply_confidence_gate(output, "en");
        assert_eq!(verdict.sentiment, Sentiment::Neutral);
        assert_eq!(verdict.score, 0.5);
        assert_eq!(verdict.confidence, 0.55);
    }

    #[test]
    fn confident_negative_maps_score_to_lower_half() {
        let output = ModelOutput {
            label: Sentiment::Negative,
            confidence: 0.9,
        };
        let verdict = apply_confidence_gate(output, "en");
        assert_eq!(verdict.sentiment, Sentiment::Negative);
        assert!((verdict.score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn detects_french_from_function_words() {
        let lang = detect_language("Le stand est dans la salle et nous avons plus de place pour le groupe");
        assert_eq!(lang, "fr");
    }

    #[test]
    fn defaults_to_baseline_language() {
        assert_eq!(detect_language("Great talk overall"), "en");
    }

    #[tokio::test]
    async fn classify_before_load_degrades_to_neutral() {
        let (classifier, tx) = SentimentClassifier::pending();
        assert!(!classifier.is_ready());
        let verdict = classifier.classify("This was amazing");
        assert_eq!(verdict.sentiment, Sentiment::Neutral);
        assert_eq!(verdict.confidence, 0.0);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ready_times_out_without_load() {
        let (classifier, _tx) = SentimentClassifier::pending();
        let ready = classifier.wait_ready(Duration::from_secs(1)).await;
        assert!(!ready);
    }

    #[tokio::test]
    async fn background_load_becomes_ready() {
        let classifier = SentimentClassifier::load();
        assert!(classifier.wait_ready(Duration::from_secs(5)).await);
        let verdict = classifier.classify("wonderful");
        assert_eq!(verdict.sentiment, Sentiment::Positive);
    }
}
