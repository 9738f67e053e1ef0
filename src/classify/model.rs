use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::classify::{EventClassifier, tokenize};

#[derive(Debug, Clone)]
pub struct TrainParams {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Inverse regularisation strength, as in liblinear.
    pub c: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: 0.5,
            c: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagOfWordsModel {
    vocab: BTreeMap<String, usize>,
    idf: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

type SparseVec = Vec<(usize, f64)>;

impl BagOfWordsModel {
    /// Fit on `(text, is_event)` pairs. Both classes must be present.
    pub fn train(samples: &[(String, bool)], params: &TrainParams) -> Result<Self> {
        let positives = samples.iter().filter(|(_, y)| *y).count();
        let negatives = samples.len() - positives;
        if positives == 0 || negatives == 0 {
            bail!("need labeled examples of both classes (got {positives} event, {negatives} other)");
        }

        let docs: Vec<Vec<String>> = samples.iter().map(|(t, _)| tokenize(t)).collect();

        let mut vocab = BTreeMap::new();
        for tok in docs.iter().flatten() {
            let next = vocab.len();
            vocab.entry(tok.clone()).or_insert(next);
        }

        let mut df = vec![0usize; vocab.len()];
        for doc in &docs {
            let mut seen: Vec<usize> = doc.iter().map(|t| vocab[t]).collect();
            seen.sort_unstable();
            seen.dedup();
            for i in seen {
                df[i] += 1;
            }
        }
        let n = samples.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let mut model = Self {
            vocab,
            idf,
            weights: Vec::new(),
            bias: 0.0,
        };
        model.weights = vec![0.0; model.vocab.len()];

        let xs: Vec<SparseVec> = docs.iter().map(|d| model.vectorize_tokens(d)).collect();
        let ys: Vec<f64> = samples.iter().map(|(_, y)| if *y { 1.0 } else { 0.0 }).collect();

        // Balanced weights: n_samples / (n_classes * n_class_samples).
        let w_pos = n / (2.0 * positives as f64);
        let w_neg = n / (2.0 * negatives as f64);
        let lambda = 1.0 / (params.c * n);

        for _ in 0..params.epochs {
            let mut grad = vec![0.0; model.weights.len()];
            let mut grad_bias = 0.0;
            for (x, &y) in xs.iter().zip(&ys) {
                let weight = if y > 0.5 { w_pos } else { w_neg };
                let err = weight * (model.probability(x) - y);
                for &(i, v) in x {
                    grad[i] += err * v;
                }
                grad_bias += err;
            }
            for (w, g) in model.weights.iter_mut().zip(&grad) {
                *w -= params.learning_rate * (g / n + lambda * *w);
            }
            model.bias -= params.learning_rate * grad_bias / n;
        }

        Ok(model)
    }

    fn vectorize_tokens(&self, tokens: &[String]) -> SparseVec {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for t in tokens {
            if let Some(&i) = self.vocab.get(t) {
                *counts.entry(i).or_default() += 1.0;
            }
        }
        let mut v: SparseVec = counts
            .into_iter()
            .map(|(i, c)| (i, c * self.idf[i]))
            .collect();
        let norm = v.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, x) in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn probability(&self, x: &[(usize, f64)]) -> f64 {
        let z = self.bias + x.iter().map(|&(i, v)| self.weights[i] * v).sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }

    pub fn predict_proba(&self, text: &str) -> f64 {
        self.probability(&self.vectorize_tokens(&tokenize(text)))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("no trained model at {} (run `train` first)", path.display()))?;
        Ok(serde_json::from_str(&s)?)
    }
}

impl EventClassifier for BagOfWordsModel {
    fn is_event(&self, subject: &str, body: &str) -> bool {
        self.predict_proba(&format!("{subject} {body}")) >= 0.5
    }
}

/// Precision/recall for the event class on a held-out split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub support: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

pub fn evaluate(model: &impl EventClassifier, samples: &[(String, String, bool)]) -> Evaluation {
    let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
    for (subject, body, y) in samples {
        match (model.is_event(subject, body), *y) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }
    let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
    Evaluation {
        support: samples.len(),
        accuracy: ratio(tp + tn, samples.len()),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
    }
}

/// Stratified 3:1 split: every fourth example of each class goes to the test side.
pub fn split_train_test<T: Clone>(samples: &[(T, bool)]) -> (Vec<(T, bool)>, Vec<(T, bool)>) {
    let (mut train, mut test) = (Vec::new(), Vec::new());
    let (mut pos, mut neg) = (0usize, 0usize);
    for s in samples {
        let k = if s.1 {
            pos += 1;
            pos
        } else {
            neg += 1;
            neg
        };
        if k % 4 == 0 {
            test.push(s.clone());
        } else {
            train.push(s.clone());
        }
    }
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(String, bool)> {
        let events = [
            "Board games and pizza night this Friday at 7pm in the lounge",
            "Join us for a talk on robotics, free pizza provided, RSVP required",
            "Study break with snacks tonight in room 4-231",
            "Career fair next Tuesday, register online to attend",
            "Movie night Saturday, popcorn provided, all welcome",
            "Pizza and trivia event Thursday evening, RSVP by Wednesday",
        ];
        let others = [
            "Your package has shipped and will arrive soon",
            "Reminder: submit your timesheet by end of week",
            "Password reset requested for your account",
            "Minutes from the last committee meeting attached",
            "Invoice for the month of May is attached",
            "Please review the updated policy document",
        ];
        events
            .iter()
            .map(|s| (s.to_string(), true))
            .chain(others.iter().map(|s| (s.to_string(), false)))
            .collect()
    }

    #[test]
    fn learns_to_separate_training_data() {
        let model = BagOfWordsModel::train(&corpus(), &TrainParams::default()).unwrap();
        for (text, y) in corpus() {
            assert_eq!(model.predict_proba(&text) >= 0.5, y, "{text}");
        }
        assert!(model.is_event("Free pizza", "RSVP for the trivia night event"));
        assert!(!model.is_event("Invoice", "your account invoice is attached"));
    }

    #[test]
    fn needs_both_classes() {
        let only_events: Vec<_> = corpus().into_iter().filter(|(_, y)| *y).collect();
        assert!(BagOfWordsModel::train(&only_events, &TrainParams::default()).is_err());
    }

    #[test]
    fn save_and_load_give_same_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = BagOfWordsModel::train(&corpus(), &TrainParams::default()).unwrap();
        model.save(&path).unwrap();
        let loaded = BagOfWordsModel::load(&path).unwrap();
        assert_eq!(loaded.vocabulary_size(), model.vocabulary_size());
        let text = "pizza night RSVP";
        assert!((loaded.predict_proba(text) - model.predict_proba(text)).abs() < 1e-12);
    }

    #[test]
    fn split_is_stratified() {
        let (train, test) = split_train_test(&corpus());
        assert_eq!(train.len() + test.len(), 12);
        assert_eq!(test.iter().filter(|(_, y)| *y).count(), 1);
        assert_eq!(test.iter().filter(|(_, y)| !*y).count(), 1);
    }

    #[test]
    fn evaluation_counts() {
        struct Always(bool);
        impl EventClassifier for Always {
            fn is_event(&self, _: &str, _: &str) -> bool {
                self.0
            }
        }
        let samples = vec![
            ("a".to_string(), "".to_string(), true),
            ("b".to_string(), "".to_string(), false),
            ("c".to_string(), "".to_string(), false),
        ];
        let e = evaluate(&Always(true), &samples);
        assert_eq!(e.support, 3);
        assert!((e.precision - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(e.recall, 1.0);
        let e = evaluate(&Always(false), &samples);
        assert_eq!(e.precision, 0.0);
        assert!((e.accuracy - 2.0 / 3.0).abs() < 1e-9);
    }
}
