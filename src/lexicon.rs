use std::collections::{HashMap, HashSet};

pub struct SentimentLexicon {
    words: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
    intensifiers: HashMap<&'static str, f64>,
}

impl SentimentLexicon {
    pub fn build() -> Self {
        let mut words = HashMap::new();

        let positive_words: &[(&str, f64)] = &[
            ("amazing", 0.9),
            ("excellent", 0.9),
            ("fantastic", 0.9),
            ("wonderful", 0.8),
            ("awesome", 0.8),
            ("incredible", 0.8),
            ("perfect", 0.8),
            ("love", 0.8),
            ("loved", 0.8),
            ("brilliant", 0.8),
            ("great", 0.7),
            ("superb", 0.7),
            ("delightful", 0.7),
            ("inspiring", 0.7),
            ("engaging", 0.6),
            ("enjoyable", 0.6),
            ("enjoyed", 0.6),
            ("fun", 0.6),
            ("friendly", 0.6),
            ("helpful", 0.6),
            ("informative", 0.6),
            ("insightful", 0.6),
            ("memorable", 0.6),
            ("recommend", 0.6),
            ("good", 0.5),
            ("nice", 0.5),
            ("pleasant", 0.5),
            ("interesting", 0.5),
            ("clear", 0.4),
            ("smooth", 0.4),
            ("useful", 0.4),
            ("welcoming", 0.5),
            ("thanks", 0.4),
            ("thank", 0.4),
        ];

        let negative_words: &[(&str, f64)] = &[
            ("terrible", -0.9),
            ("awful", -0.9),
            ("horrible", -0.9),
            ("worst", -0.9),
            ("hate", -0.8),
            ("hated", -0.8),
            ("disaster", -0.8),
            ("useless", -0.7),
            ("waste", -0.7),
            ("disappointing", -0.7),
            ("disappointed", -0.7),
            ("bad", -0.6),
            ("poor", -0.6),
            ("boring", -0.6),
            ("confusing", -0.6),
            ("frustrating", -0.6),
            ("frustrated", -0.6),
            ("rude", -0.6),
            ("chaotic", -0.6),
            ("broken", -0.6),
            ("crowded", -0.5),
            ("slow", -0.5),
            ("noisy", -0.5),
            ("unclear", -0.5),
            ("mediocre", -0.5),
            ("late", -0.4),
            ("long", -0.3),
            ("cold", -0.3),
            ("expensive", -0.4),
            ("problem", -0.5),
            ("problems", -0.5),
            ("issue", -0.4),
            ("issues", -0.4),
            ("complaint", -0.5),
        ];

        for (word, score) in positive_words {
            words.insert(*word, *score);
        }
        for (word, score) in negative_words {
            words.insert(*word, *score);
        }

        let negations = [
            "not", "no", "never", "neither", "nothing", "none", "cannot",
            "cant", "dont", "doesnt", "didnt", "wont", "wouldnt", "shouldnt",
            "couldnt", "isnt", "wasnt", "werent", "hardly", "barely",
        ]
        .into_iter()
        .collect();

        let intensifiers = [
            ("very", 1.3),
            ("really", 1.3),
            ("extremely", 1.5),
            ("absolutely", 1.5),
            ("totally", 1.4),
            ("so", 1.2),
            ("quite", 1.1),
            ("somewhat", 0.7),
            ("slightly", 0.6),
            ("bit", 0.7),
        ]
        .into_iter()
        .collect();

        Self {
            words,
            negations,
            intensifiers,
        }
    }

    pub fn weight(&self, token: &str) -> Option<f64> {
        self.words.get(token).copied()
    }

    pub fn is_negation(&self, token: &str) -> bool {
        self.negations.contains(token)
    }

    pub fn intensity(&self, token: &str) -> Option<f64> {
        self.intensifiers.get(token).copied()
    }
}
