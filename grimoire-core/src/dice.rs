//! Dice formula evaluation.
//!
//! Supports standard dice notation (`XdY+Z`), keep highest/lowest, named
//! variables substituted from the character sheet (`2d6+STR`), and signed
//! advantage levels on d20 terms.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Most dice a single term may roll, advantage dice included.
pub const MAX_DICE: u32 = 1000;

/// Error type for dice parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Empty dice formula")]
    Empty,
    #[error("Unknown variable '{0}' in dice formula")]
    UnknownVariable(String),
    #[error("Dice are not allowed in a fixed-value formula: {0}")]
    DiceInStaticFormula(String),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
    #[error("Too many dice: {count} (at most {max})")]
    TooManyDice { count: u32, max: u32 },
    #[error("Dice formula total is out of range: {0}")]
    Overflow(String),
}

// ============================================================================
// Randomness
// ============================================================================

/// Source of individual die results.
///
/// Everything that rolls dice takes a `&mut dyn RollSource`, so tests can
/// script exact results with [`crate::testing::SequenceRolls`].
pub trait RollSource {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Adapts any [`rand::Rng`] into a [`RollSource`].
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RollSource for RngSource<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.gen_range(1..=sides.max(1))
    }
}

/// A roll source backed by the thread-local RNG.
pub fn thread_source() -> RngSource<rand::rngs::ThreadRng> {
    RngSource(rand::thread_rng())
}

// ============================================================================
// Die Types
// ============================================================================

/// Standard polyhedral die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

// ============================================================================
// Variables and Options
// ============================================================================

/// Named values available to a formula (attribute abbreviations, resource
/// ids, `LEVEL`). Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    values: HashMap<String, i32>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl AsRef<str>, value: i32) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: i32) {
        self.values.insert(name.as_ref().to_ascii_uppercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.values.get(&name.to_ascii_uppercase()).copied()
    }

    /// Overlay `other` onto these variables; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Variables) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Options controlling a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOptions {
    /// Net advantage. Positive rolls extra d20s and keeps the highest,
    /// negative keeps the lowest.
    pub advantage_level: i32,
    pub allow_criticals: bool,
    pub allow_fumbles: bool,
}

impl RollOptions {
    /// No advantage, no critical or fumble detection.
    pub fn plain() -> Self {
        Self {
            advantage_level: 0,
            allow_criticals: false,
            allow_fumbles: false,
        }
    }

    pub fn with_advantage(mut self, level: i32) -> Self {
        self.advantage_level = level;
        self
    }
}

impl Default for RollOptions {
    fn default() -> Self {
        Self {
            advantage_level: 0,
            allow_criticals: true,
            allow_fumbles: true,
        }
    }
}

// ============================================================================
// Parsed Formula
// ============================================================================

/// A single die component of a formula (e.g. `2d6`, `4d6kh3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

impl DiceComponent {
    /// Parse `NdM[khK|klK]`. Returns `Ok(None)` when the text is not dice
    /// notation at all (so `dex` can still be read as a variable).
    fn parse(text: &str) -> Result<Option<Self>, DiceError> {
        let lower = text.to_ascii_lowercase();
        let Some(d_pos) = lower.find('d') else {
            return Ok(None);
        };

        let count_str = &lower[..d_pos];
        let rest = &lower[d_pos + 1..];
        if !count_str.chars().all(|c| c.is_ascii_digit())
            || !rest.starts_with(|c: char| c.is_ascii_digit())
        {
            return Ok(None);
        }

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(text.to_string()))?
        };
        if count == 0 {
            return Err(DiceError::InvalidNotation(text.to_string()));
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice {
                count,
                max: MAX_DICE,
            });
        }

        let sides_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let sides: u32 = rest[..sides_len]
            .parse()
            .map_err(|_| DiceError::InvalidNotation(text.to_string()))?;
        let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        let suffix = &rest[sides_len..];
        let parse_keep = |digits: &str| -> Result<u32, DiceError> {
            digits
                .parse()
                .map_err(|_| DiceError::InvalidNotation(text.to_string()))
        };
        let (keep_highest, keep_lowest) = if suffix.is_empty() {
            (None, None)
        } else if let Some(digits) = suffix.strip_prefix("kh") {
            (Some(parse_keep(digits)?), None)
        } else if let Some(digits) = suffix.strip_prefix("kl") {
            (None, Some(parse_keep(digits)?))
        } else {
            return Err(DiceError::InvalidNotation(text.to_string()));
        };

        // Validate keep count doesn't exceed dice count
        if let Some(keep) = keep_highest.or(keep_lowest) {
            if keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: text.to_string(),
                });
            }
        }

        Ok(Some(DiceComponent {
            count,
            die_type,
            keep_highest,
            keep_lowest,
        }))
    }

    /// Roll the component, returning (all rolls, kept rolls).
    ///
    /// Advantage only touches d20 components without an explicit keep
    /// modifier: `count + |level|` dice are rolled and `count` are kept.
    fn roll(
        &self,
        advantage_level: i32,
        rng: &mut dyn RollSource,
    ) -> Result<(Vec<u32>, Vec<u32>), DiceError> {
        let advantaged = advantage_level != 0
            && self.die_type == DieType::D20
            && self.keep_highest.is_none()
            && self.keep_lowest.is_none();
        let extra = if advantaged {
            advantage_level.unsigned_abs()
        } else {
            0
        };

        let total_dice = self.count.saturating_add(extra);
        if total_dice > MAX_DICE {
            return Err(DiceError::TooManyDice {
                count: total_dice,
                max: MAX_DICE,
            });
        }

        let sides = self.die_type.sides();
        let rolls: Vec<u32> = (0..total_dice)
            .map(|_| rng.roll_die(sides).clamp(1, sides))
            .collect();

        let (keep_highest, keep_lowest) = match (advantaged, advantage_level > 0) {
            (true, true) => (Some(self.count), None),
            (true, false) => (None, Some(self.count)),
            (false, _) => (self.keep_highest, self.keep_lowest),
        };

        let kept = if let Some(keep) = keep_highest {
            let mut sorted = rolls.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            sorted.truncate(keep as usize);
            sorted
        } else if let Some(keep) = keep_lowest {
            let mut sorted = rolls.clone();
            sorted.sort();
            sorted.truncate(keep as usize);
            sorted
        } else {
            rolls.clone()
        };

        Ok((rolls, kept))
    }
}

impl fmt::Display for DiceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.die_type)?;
        if let Some(keep) = self.keep_highest {
            write!(f, "kh{keep}")?;
        }
        if let Some(keep) = self.keep_lowest {
            write!(f, "kl{keep}")?;
        }
        Ok(())
    }
}

/// What a formula term refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermKind {
    Dice(DiceComponent),
    Constant(i32),
    Variable(String),
}

/// A signed term of a formula, keeping its original text for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub sign: i32,
    pub kind: TermKind,
    pub text: String,
}

impl Term {
    fn parse(text: &str, sign: i32) -> Result<Self, DiceError> {
        let kind = if text.chars().all(|c| c.is_ascii_digit()) {
            let value: i32 = text
                .parse()
                .map_err(|_| DiceError::InvalidNotation(text.to_string()))?;
            TermKind::Constant(value)
        } else if let Some(component) = DiceComponent::parse(text)? {
            TermKind::Dice(component)
        } else if is_identifier(text) {
            TermKind::Variable(text.to_string())
        } else {
            return Err(DiceError::InvalidNotation(text.to_string()));
        };

        Ok(Term {
            sign,
            kind,
            text: text.to_string(),
        })
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A parsed dice formula (e.g. `2d6+STR-1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    pub terms: Vec<Term>,
    pub original: String,
}

impl DiceFormula {
    /// Parse a formula string.
    pub fn parse(formula: &str) -> Result<Self, DiceError> {
        let original = formula.trim().to_string();
        let compact: String = original.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DiceError::Empty);
        }

        let mut terms = Vec::new();
        let mut current = String::new();
        let mut sign: i32 = 1;
        let mut leading_sign = false;

        for ch in compact.chars() {
            match ch {
                '+' | '-' => {
                    if current.is_empty() {
                        // Only a single leading sign may appear without a term
                        if !terms.is_empty() || leading_sign {
                            return Err(DiceError::InvalidNotation(original));
                        }
                        leading_sign = true;
                    } else {
                        terms.push(Term::parse(&current, sign)?);
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                _ => current.push(ch),
            }
        }

        if current.is_empty() {
            return Err(DiceError::InvalidNotation(original));
        }
        terms.push(Term::parse(&current, sign)?);

        Ok(DiceFormula { terms, original })
    }

    /// Names of all variables referenced by the formula.
    pub fn variables(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter_map(|t| match &t.kind {
                TermKind::Variable(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_dice(&self) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t.kind, TermKind::Dice(_)))
    }

    /// Evaluate a formula that must not contain dice (resource bounds).
    pub fn evaluate_static(&self, variables: &Variables) -> Result<i32, DiceError> {
        let mut total: i32 = 0;
        for term in &self.terms {
            let value = match &term.kind {
                TermKind::Constant(value) => *value,
                TermKind::Variable(name) => variables
                    .get(name)
                    .ok_or_else(|| DiceError::UnknownVariable(name.clone()))?,
                TermKind::Dice(_) => {
                    return Err(DiceError::DiceInStaticFormula(self.original.clone()))
                }
            };
            total = accumulate(total, term.sign, value, &self.original)?;
        }
        Ok(total)
    }

    /// Roll the formula.
    pub fn evaluate(
        &self,
        variables: &Variables,
        options: &RollOptions,
        rng: &mut dyn RollSource,
    ) -> Result<DiceRollResult, DiceError> {
        let mut tokens = Vec::with_capacity(self.terms.len());
        let mut substituted = String::new();
        let mut total: i32 = 0;

        for (index, term) in self.terms.iter().enumerate() {
            match &term.kind {
                TermKind::Constant(value) => {
                    push_signed_text(&mut substituted, index, term.sign, &term.text);
                    total = accumulate(total, term.sign, *value, &self.original)?;
                    tokens.push(RollToken::Constant {
                        sign: term.sign,
                        value: *value,
                    });
                }
                TermKind::Variable(name) => {
                    let value = variables
                        .get(name)
                        .ok_or_else(|| DiceError::UnknownVariable(name.clone()))?;
                    let signed = term
                        .sign
                        .checked_mul(value)
                        .ok_or_else(|| DiceError::Overflow(self.original.clone()))?;
                    push_value(&mut substituted, index, signed);
                    total = accumulate(total, 1, signed, &self.original)?;
                    tokens.push(RollToken::Variable {
                        sign: term.sign,
                        name: name.clone(),
                        value,
                    });
                }
                TermKind::Dice(component) => {
                    let (rolls, kept) = component.roll(options.advantage_level, rng)?;
                    let subtotal: i32 = kept.iter().map(|&v| v as i32).sum();
                    push_signed_text(&mut substituted, index, term.sign, &term.text);
                    total = accumulate(total, term.sign, subtotal, &self.original)?;
                    tokens.push(RollToken::Dice {
                        sign: term.sign,
                        count: component.count,
                        die_type: component.die_type,
                        rolls,
                        kept,
                        subtotal,
                    });
                }
            }
        }

        // Criticals and fumbles are read off the primary (first) dice term only.
        let primary = tokens.iter().find_map(|t| match t {
            RollToken::Dice { die_type, kept, .. } => Some((*die_type, kept.as_slice())),
            _ => None,
        });

        let num_criticals = match primary {
            Some((die_type, kept)) if options.allow_criticals => {
                kept.iter().filter(|&&v| v == die_type.sides()).count() as u32
            }
            _ => 0,
        };

        let is_fumble = match primary {
            Some((DieType::D20, [kept])) => options.allow_fumbles && *kept == 1,
            _ => false,
        };

        Ok(DiceRollResult {
            total,
            formula: self.original.clone(),
            substituted_formula: substituted,
            tokens,
            num_criticals,
            is_fumble,
        })
    }
}

fn push_signed_text(out: &mut String, index: usize, sign: i32, text: &str) {
    if index > 0 {
        out.push(if sign < 0 { '-' } else { '+' });
    } else if sign < 0 {
        out.push('-');
    }
    out.push_str(text);
}

fn push_value(out: &mut String, index: usize, value: i32) {
    if index == 0 {
        out.push_str(&value.to_string());
    } else if value < 0 {
        out.push('-');
        out.push_str(&value.unsigned_abs().to_string());
    } else {
        out.push('+');
        out.push_str(&value.to_string());
    }
}

/// Add `sign * value` to `total`, failing instead of wrapping.
fn accumulate(total: i32, sign: i32, value: i32, formula: &str) -> Result<i32, DiceError> {
    sign.checked_mul(value)
        .and_then(|signed| total.checked_add(signed))
        .ok_or_else(|| DiceError::Overflow(formula.to_string()))
}

impl FromStr for DiceFormula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceFormula::parse(s)
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// ============================================================================
// Results
// ============================================================================

/// One evaluated term of a roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollToken {
    Dice {
        sign: i32,
        count: u32,
        die_type: DieType,
        rolls: Vec<u32>,
        kept: Vec<u32>,
        subtotal: i32,
    },
    Constant {
        sign: i32,
        value: i32,
    },
    Variable {
        sign: i32,
        name: String,
        value: i32,
    },
}

/// Complete result of evaluating a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollResult {
    pub total: i32,
    pub formula: String,
    pub substituted_formula: String,
    pub tokens: Vec<RollToken>,
    pub num_criticals: u32,
    pub is_fumble: bool,
}

impl DiceRollResult {
    pub fn is_critical(&self) -> bool {
        self.num_criticals > 0
    }

    /// Format the individual dice results for display. Dropped dice are
    /// shown in parentheses.
    pub fn dice_display(&self) -> String {
        let mut out = String::new();
        for (index, token) in self.tokens.iter().enumerate() {
            let (sign, text) = match token {
                RollToken::Dice { sign, rolls, kept, .. } => {
                    let mut kept_used = vec![false; kept.len()];
                    let shown: Vec<String> = rolls
                        .iter()
                        .map(|&roll| {
                            let slot = kept
                                .iter()
                                .enumerate()
                                .position(|(i, &k)| k == roll && !kept_used[i]);
                            match slot {
                                Some(i) => {
                                    kept_used[i] = true;
                                    roll.to_string()
                                }
                                None => format!("({roll})"),
                            }
                        })
                        .collect();
                    (*sign, format!("[{}]", shown.join(", ")))
                }
                RollToken::Constant { sign, value } => (*sign, value.to_string()),
                RollToken::Variable { sign, value, .. } => {
                    if *value < 0 {
                        (-*sign, value.unsigned_abs().to_string())
                    } else {
                        (*sign, value.to_string())
                    }
                }
            };

            if index > 0 {
                out.push_str(if sign < 0 { " - " } else { " + " });
            } else if sign < 0 {
                out.push('-');
            }
            out.push_str(&text);
        }
        out
    }
}

impl fmt::Display for DiceRollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Parse and evaluate a formula in one step.
pub fn evaluate(
    formula: &str,
    variables: &Variables,
    options: &RollOptions,
    rng: &mut dyn RollSource,
) -> Result<DiceRollResult, DiceError> {
    DiceFormula::parse(formula)?.evaluate(variables, options, rng)
}

/// Convenience function to roll a variable-free formula with the thread RNG.
pub fn roll(notation: &str) -> Result<DiceRollResult, DiceError> {
    evaluate(
        notation,
        &Variables::new(),
        &RollOptions::default(),
        &mut thread_source(),
    )
}

/// Roll with a signed advantage level using the thread RNG.
pub fn roll_with_advantage(notation: &str, level: i32) -> Result<DiceRollResult, DiceError> {
    evaluate(
        notation,
        &Variables::new(),
        &RollOptions::default().with_advantage(level),
        &mut thread_source(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SequenceRolls;

    #[test]
    fn test_parse_simple() {
        let formula = DiceFormula::parse("1d20").unwrap();
        assert_eq!(formula.terms.len(), 1);
        match &formula.terms[0].kind {
            TermKind::Dice(c) => {
                assert_eq!(c.count, 1);
                assert_eq!(c.die_type, DieType::D20);
            }
            other => panic!("expected dice, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_variables_and_modifiers() {
        let formula = DiceFormula::parse("2d6 + STR - 1").unwrap();
        assert_eq!(formula.terms.len(), 3);
        assert_eq!(formula.variables(), vec!["STR"]);
        assert_eq!(formula.terms[2].sign, -1);
    }

    #[test]
    fn test_dex_is_a_variable_not_dice() {
        let formula = DiceFormula::parse("d8+dex").unwrap();
        assert!(matches!(formula.terms[0].kind, TermKind::Dice(_)));
        assert_eq!(formula.terms[1].kind, TermKind::Variable("dex".to_string()));
    }

    #[test]
    fn test_invalid_notation() {
        assert_eq!(DiceFormula::parse("  "), Err(DiceError::Empty));
        assert!(matches!(
            DiceFormula::parse("2d7"),
            Err(DiceError::InvalidDieSize(7))
        ));
        assert!(DiceFormula::parse("2d6++3").is_err());
        assert!(DiceFormula::parse("2d6+").is_err());
        assert!(DiceFormula::parse("1dex").is_err());
        assert!(DiceFormula::parse("2d6*3").is_err());
    }

    #[test]
    fn test_invalid_keep_count() {
        let result = DiceFormula::parse("4d6kh5");
        assert!(matches!(
            result,
            Err(DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            })
        ));
        assert!(DiceFormula::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_variable_substitution() {
        let vars = Variables::new().with("STR", 4);
        let mut rng = SequenceRolls::new(vec![3, 4]);
        let result = evaluate("2d6+STR", &vars, &RollOptions::default(), &mut rng).unwrap();

        assert_eq!(result.total, 11);
        assert_eq!(result.formula, "2d6+STR");
        assert_eq!(result.substituted_formula, "2d6+4");
    }

    #[test]
    fn test_negative_variable_folds_sign() {
        let vars = Variables::new().with("dex", -2);
        let mut rng = SequenceRolls::new(vec![5]);
        let result = evaluate("1d8 + DEX", &vars, &RollOptions::default(), &mut rng).unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.substituted_formula, "1d8-2");
        assert_eq!(result.dice_display(), "[5] - 2");
    }

    #[test]
    fn test_unknown_variable() {
        let mut rng = SequenceRolls::new(vec![1]);
        let result = evaluate("1d4+WIS", &Variables::new(), &RollOptions::default(), &mut rng);
        assert_eq!(result, Err(DiceError::UnknownVariable("WIS".to_string())));
    }

    #[test]
    fn test_advantage_keeps_highest() {
        let mut rng = SequenceRolls::new(vec![7, 15, 3]);
        let options = RollOptions::default().with_advantage(2);
        let result = evaluate("1d20+2", &Variables::new(), &options, &mut rng).unwrap();

        assert_eq!(result.total, 17);
        match &result.tokens[0] {
            RollToken::Dice { rolls, kept, .. } => {
                assert_eq!(rolls, &vec![7, 15, 3]);
                assert_eq!(kept, &vec![15]);
            }
            other => panic!("expected dice token, got {other:?}"),
        }
    }

    #[test]
    fn test_disadvantage_keeps_lowest() {
        let mut rng = SequenceRolls::new(vec![12, 4]);
        let options = RollOptions::default().with_advantage(-1);
        let result = evaluate("1d20", &Variables::new(), &options, &mut rng).unwrap();
        assert_eq!(result.total, 4);
    }

    #[test]
    fn test_advantage_ignores_non_d20_terms() {
        let mut rng = SequenceRolls::new(vec![2, 5]);
        let options = RollOptions::default().with_advantage(3);
        let result = evaluate("2d6", &Variables::new(), &options, &mut rng).unwrap();
        assert_eq!(result.total, 7);
    }

    #[test]
    fn test_criticals_count_kept_dice() {
        let mut rng = SequenceRolls::new(vec![20, 20, 9]);
        let options = RollOptions::default().with_advantage(1);
        let result = evaluate("2d20", &Variables::new(), &options, &mut rng).unwrap();
        assert_eq!(result.num_criticals, 2);
        assert!(result.is_critical());

        let mut rng = SequenceRolls::new(vec![20]);
        let result = evaluate("1d20", &Variables::new(), &RollOptions::plain(), &mut rng).unwrap();
        assert_eq!(result.num_criticals, 0);
    }

    #[test]
    fn test_fumble_reads_kept_die() {
        let mut rng = SequenceRolls::new(vec![1]);
        let result =
            evaluate("1d20+5", &Variables::new(), &RollOptions::default(), &mut rng).unwrap();
        assert!(result.is_fumble);

        // Advantage discards the natural 1
        let mut rng = SequenceRolls::new(vec![1, 14]);
        let options = RollOptions::default().with_advantage(1);
        let result = evaluate("1d20", &Variables::new(), &options, &mut rng).unwrap();
        assert!(!result.is_fumble);

        // Disadvantage keeps it
        let mut rng = SequenceRolls::new(vec![14, 1]);
        let options = RollOptions::default().with_advantage(-1);
        let result = evaluate("1d20", &Variables::new(), &options, &mut rng).unwrap();
        assert!(result.is_fumble);
    }

    #[test]
    fn test_keep_highest_display() {
        let mut rng = SequenceRolls::new(vec![6, 1, 4, 5]);
        let result =
            evaluate("4d6kh3", &Variables::new(), &RollOptions::plain(), &mut rng).unwrap();
        assert_eq!(result.total, 15);
        assert_eq!(result.dice_display(), "[6, (1), 4, 5]");
    }

    #[test]
    fn test_static_evaluation() {
        let vars = Variables::new().with("INT", 3).with("LEVEL", 5);
        let formula = DiceFormula::parse("5+INT+LEVEL").unwrap();
        assert_eq!(formula.evaluate_static(&vars), Ok(13));

        let formula = DiceFormula::parse("1d4+INT").unwrap();
        assert!(matches!(
            formula.evaluate_static(&vars),
            Err(DiceError::DiceInStaticFormula(_))
        ));
    }

    #[test]
    fn test_dice_count_is_bounded() {
        assert_eq!(
            DiceFormula::parse("1000000000d6"),
            Err(DiceError::TooManyDice {
                count: 1_000_000_000,
                max: MAX_DICE,
            })
        );
        assert!(matches!(
            DiceFormula::parse("4294967295d20"),
            Err(DiceError::TooManyDice { .. })
        ));
        assert!(DiceFormula::parse("1000d6").is_ok());
    }

    #[test]
    fn test_advantage_dice_are_bounded() {
        let mut rng = SequenceRolls::new(vec![10]);
        let options = RollOptions::default().with_advantage(i32::MIN);
        let result = evaluate("1d20", &Variables::new(), &options, &mut rng);
        assert!(matches!(result, Err(DiceError::TooManyDice { .. })));

        let options = RollOptions::default().with_advantage(1);
        let result = evaluate("1000d20", &Variables::new(), &options, &mut rng);
        assert_eq!(
            result,
            Err(DiceError::TooManyDice {
                count: 1001,
                max: MAX_DICE,
            })
        );
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let mut rng = SequenceRolls::new(vec![1]);
        let options = RollOptions::default();

        let result = evaluate("2147483647+1", &Variables::new(), &options, &mut rng);
        assert_eq!(result, Err(DiceError::Overflow("2147483647+1".to_string())));

        let result = evaluate("1d4+2147483647", &Variables::new(), &options, &mut rng);
        assert!(matches!(result, Err(DiceError::Overflow(_))));

        let vars = Variables::new().with("X", i32::MIN);
        let result = evaluate("1d4-X", &vars, &options, &mut rng);
        assert!(matches!(result, Err(DiceError::Overflow(_))));

        let formula = DiceFormula::parse("2147483647+LEVEL").unwrap();
        let vars = Variables::new().with("LEVEL", 5);
        assert!(matches!(
            formula.evaluate_static(&vars),
            Err(DiceError::Overflow(_))
        ));
    }

    #[test]
    fn test_roll_range() {
        for _ in 0..100 {
            let result = roll("1d20+5").unwrap();
            assert!(result.total >= 6 && result.total <= 25);
        }
    }
}
