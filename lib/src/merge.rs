//! Combining the template and model readings of one cell.
//!
//! Everything here is a pure function of its inputs so the merge policy can be tested without
//! images or an OCR engine.
use serde::Serialize;

/// Placeholder for a cell nothing could be read from
pub const UNKNOWN: &str = "?";

/// Known misreads, rewritten after the merge
pub const CONFUSION_TABLE: &[(char, char)] = &[
    ('0', 'O'),
    ('1', 'I'),
    ('5', 'S'),
    ('|', 'I'),
    ('!', 'I'),
    ('{', 'C'),
    ('(', 'C'),
];

/// Which recognition source produced a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Template,
    Model,
    /// Both sources read the same letter
    Agreement,
    /// Neither source read anything
    None,
}

/// One source's opinion about a cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub letter: String,
    /// 0..1
    pub confidence: f32,
}

impl Reading {
    pub fn new<S: Into<String>>(letter: S, confidence: f32) -> Self {
        Reading {
            letter: letter.into(),
            confidence,
        }
    }
}

/// The letter unit of a cell after merging: one letter, or `QU`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedLetter {
    pub unit: String,
    pub confidence: f32,
    pub source: Source,
}

impl RecognizedLetter {
    pub fn unknown() -> Self {
        RecognizedLetter {
            unit: UNKNOWN.to_string(),
            confidence: 0.0,
            source: Source::None,
        }
    }
}

/// Uppercase `s`, expanding a lone `Q` to the `QU` unit.
pub fn canonical_unit(s: &str) -> String {
    let unit = s.to_ascii_uppercase();
    if unit == "Q" {
        String::from("QU")
    } else {
        unit
    }
}

fn correct(c: char) -> char {
    CONFUSION_TABLE
        .iter()
        .find(|(from, _)| *from == c)
        .map_or(c, |(_, to)| *to)
}

/// Apply the confusion table character by character, then canonicalize.
pub fn apply_corrections(s: &str) -> String {
    if s == UNKNOWN {
        return s.to_string();
    }
    canonical_unit(&s.chars().map(correct).collect::<String>())
}

/// Reduce raw OCR text to a letter unit: corrections applied, first letter kept.
///
/// `"qu"` and `"Qu"` are kept whole, any other text yields its first letter.
pub fn clean_text(raw: &str) -> Option<String> {
    let text: String = raw
        .trim()
        .chars()
        .map(|c| correct(c.to_ascii_uppercase()))
        .filter(|c| c.is_ascii_uppercase())
        .collect();
    let first = text.chars().next()?;
    Some(canonical_unit(&first.to_string()))
}

/// Pick the letter for one cell.
///
/// A model reading at or above `threshold` wins outright. Below it, a lone reading wins, equal
/// readings agree, and otherwise the more confident source wins with ties going to the model.
/// The winner is passed through the confusion table.
pub fn merge(
    template: Option<&Reading>,
    model: Option<&Reading>,
    threshold: f32,
) -> RecognizedLetter {
    let agree = |t: &Reading, m: &Reading| apply_corrections(&t.letter) == apply_corrections(&m.letter);
    let pick = |reading: &Reading, source: Source| RecognizedLetter {
        unit: apply_corrections(&reading.letter),
        confidence: reading.confidence,
        source,
    };
    let agreement = |t: &Reading, m: &Reading| RecognizedLetter {
        unit: apply_corrections(&m.letter),
        confidence: t.confidence.max(m.confidence),
        source: Source::Agreement,
    };
    match (template, model) {
        (Some(t), Some(m)) if agree(t, m) => agreement(t, m),
        (_, Some(m)) if m.confidence >= threshold => pick(m, Source::Model),
        (Some(t), Some(m)) => {
            if t.confidence > m.confidence {
                pick(t, Source::Template)
            } else {
                pick(m, Source::Model)
            }
        }
        (Some(t), None) => pick(t, Source::Template),
        (None, Some(m)) => pick(m, Source::Model),
        (None, None) => RecognizedLetter::unknown(),
    }
}
