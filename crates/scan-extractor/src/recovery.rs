//! VIN recovery from noisy recognized text

use std::collections::HashSet;

use data_validator::{Validator, VIN_LENGTH};
use regex::Regex;

use crate::recognize::TextFragment;

/// Letters that never occur in a VIN, read for the digit they resemble
const CONFUSED_ANYWHERE: &[(char, char)] = &[('O', '0'), ('Q', '0'), ('I', '1')];

/// Extra confusions in the numeric production serial (last four positions)
const CONFUSED_IN_SERIAL: &[(char, char)] = &[('S', '5'), ('B', '8'), ('Z', '2'), ('G', '6'), ('D', '0')];

const SERIAL_DIGITS: usize = 4;

/// Recognized runs joined across at most this many splits
const MAX_JOINED_RUNS: usize = 3;

/// Shortest run taking part in a join. Row numbers and stray marks stay separate.
const MIN_JOINED_RUN: usize = 3;

/// A VIN recovered from a recognized line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub vin: String,
    /// Substitutions applied to reach a valid VIN
    pub corrections: usize,
    /// Line the VIN was read from
    pub line: usize,
}

/// Finds 17-character runs and repairs OCR confusions before validation
#[derive(Debug, Clone)]
pub struct IdentifierScanner {
    runs: Regex,
    validator: Validator,
    max_corrections: usize,
}

impl IdentifierScanner {
    pub fn new(validator: Validator, max_corrections: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            runs: Regex::new(r"[A-Z0-9]+")?,
            validator,
            max_corrections,
        })
    }

    /// Recover VINs from every fragment, in fragment order
    pub fn scan(&self, fragments: &[TextFragment]) -> Vec<Recovered> {
        fragments
            .iter()
            .flat_map(|fragment| {
                self.scan_line(&fragment.text)
                    .into_iter()
                    .map(move |(vin, corrections)| Recovered {
                        vin,
                        corrections,
                        line: fragment.line,
                    })
            })
            .collect()
    }

    /// Recover VINs from a single line of text
    pub fn scan_line(&self, text: &str) -> Vec<(String, usize)> {
        let mut seen = HashSet::new();
        self.candidates(&text.to_uppercase())
            .into_iter()
            .filter_map(|candidate| self.correct(&candidate))
            .filter(|(vin, _)| seen.insert(vin.clone()))
            .collect()
    }

    /// Apply confusion substitutions and validate, within the correction budget
    pub fn correct(&self, candidate: &str) -> Option<(String, usize)> {
        if !candidate.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let length = candidate.chars().count();
        let mut corrections = 0;
        let corrected: String = candidate
            .chars()
            .enumerate()
            .map(|(position, c)| {
                let in_serial = position + SERIAL_DIGITS >= length;
                let replacement = lookup(CONFUSED_ANYWHERE, c)
                    .or_else(|| in_serial.then(|| lookup(CONFUSED_IN_SERIAL, c)).flatten());
                match replacement {
                    Some(digit) => {
                        corrections += 1;
                        digit
                    }
                    None => c,
                }
            })
            .collect();

        if corrections > self.max_corrections {
            return None;
        }

        self.validator
            .validate(&corrected)
            .ok()
            .map(|vin| (vin, corrections))
    }

    /// 17-character runs, including runs split once or twice by a single space or hyphen.
    /// Only runs of at least three characters join, and a split VIN never starts with
    /// an all-digit run, so a line number next to a truncated VIN is not completed.
    fn candidates(&self, upper: &str) -> Vec<String> {
        let runs: Vec<regex::Match> = self.runs.find_iter(upper).collect();
        let mut candidates = Vec::new();

        for (i, run) in runs.iter().enumerate() {
            let mut joined = run.as_str().to_string();
            if joined.len() == VIN_LENGTH {
                candidates.push(joined);
                continue;
            }
            if !joinable(run.as_str()) || run.as_str().chars().all(|c| c.is_ascii_digit()) {
                continue;
            }

            let mut previous = run;
            for next in runs.iter().skip(i + 1).take(MAX_JOINED_RUNS - 1) {
                if joined.len() > VIN_LENGTH {
                    break;
                }
                let gap = &upper[previous.end()..next.start()];
                if (gap != " " && gap != "-") || !joinable(next.as_str()) {
                    break;
                }
                joined.push_str(next.as_str());
                if joined.len() == VIN_LENGTH {
                    candidates.push(joined.clone());
                    break;
                }
                previous = next;
            }
        }

        candidates
    }
}

fn joinable(run: &str) -> bool {
    run.len() >= MIN_JOINED_RUN
}

fn lookup(table: &[(char, char)], c: char) -> Option<char> {
    table.iter().find(|(from, _)| *from == c).map(|(_, to)| *to)
}
