//! Password generation under per-class minimums
//!
//! Generation runs in three independent steps over a CSPRNG:
//! 1. [`draw_minimums`]: each enabled class contributes exactly its minimum
//! 2. [`draw_fill`]: remaining positions pick a class by bias weight, then a
//!    character from that class
//! 3. [`shuffle`]: Fisher-Yates so the minimums are not clustered up front
//!
//! Every draw goes through [`uniform`], which rejects the top partial bucket
//! of the 32-bit range so the result carries no modulo bias. Characters are
//! drawn with replacement.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secnote_core::{SecnoteError, SecnoteResult};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!#$%&()*+,-./:;<=>?@[]^_{|}~";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Lower,
    Upper,
    Numbers,
    Symbols,
}

impl CharClass {
    pub const ALL: [CharClass; 4] = [Self::Lower, Self::Upper, Self::Numbers, Self::Symbols];

    pub fn alphabet(self) -> &'static [u8] {
        match self {
            Self::Lower => LOWER,
            Self::Upper => UPPER,
            Self::Numbers => NUMBERS,
            Self::Symbols => SYMBOLS,
        }
    }

    pub fn default_bias(self) -> u32 {
        match self {
            Self::Lower | Self::Upper => 3,
            Self::Numbers => 2,
            Self::Symbols => 1,
        }
    }

    pub fn of(c: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| c.is_ascii() && class.alphabet().contains(&(c as u8)))
    }
}

/// Per-class generation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRule {
    /// `None`: enabled with no minimum. `Some(0)`: disabled. `Some(n)`: at
    /// least `n` characters from this class.
    pub min: Option<u32>,
    /// Relative weight when filling positions beyond the minimums
    pub bias: u32,
}

impl ClassRule {
    pub fn enabled(&self) -> bool {
        self.min != Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSpec {
    pub len: u32,
    pub lower: ClassRule,
    pub upper: ClassRule,
    pub numbers: ClassRule,
    pub symbols: ClassRule,
}

impl Default for PasswordSpec {
    fn default() -> Self {
        Self::with_minimums(10, 1, 1, 1, 1)
    }
}

impl PasswordSpec {
    /// Explicit minimums for every class with the default bias weights.
    /// A minimum of 0 disables that class.
    pub fn with_minimums(len: u32, lower: u32, upper: u32, numbers: u32, symbols: u32) -> Self {
        let rule = |class: CharClass, min| ClassRule {
            min: Some(min),
            bias: class.default_bias(),
        };
        Self {
            len,
            lower: rule(CharClass::Lower, lower),
            upper: rule(CharClass::Upper, upper),
            numbers: rule(CharClass::Numbers, numbers),
            symbols: rule(CharClass::Symbols, symbols),
        }
    }

    pub fn rule(&self, class: CharClass) -> &ClassRule {
        match class {
            CharClass::Lower => &self.lower,
            CharClass::Upper => &self.upper,
            CharClass::Numbers => &self.numbers,
            CharClass::Symbols => &self.symbols,
        }
    }
}

/// Validated allocation derived from a [`PasswordSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Enabled classes with their minimum count and bias weight
    pub classes: Vec<(CharClass, u32, u32)>,
    /// Positions left for the bias-weighted fill
    pub fill: u32,
}

/// Validate the password rules and compute the allocation. Runs before any random draw.
pub fn plan(spec: &PasswordSpec) -> SecnoteResult<Plan> {
    let classes: Vec<(CharClass, u32, u32)> = CharClass::ALL
        .into_iter()
        .filter(|class| spec.rule(*class).enabled())
        .map(|class| {
            let rule = spec.rule(class);
            (class, rule.min.unwrap_or(0), rule.bias)
        })
        .collect();

    if classes.is_empty() {
        return Err(SecnoteError::Constraint("no class enabled".into()));
    }

    let required: u64 = classes.iter().map(|(_, min, _)| u64::from(*min)).sum();
    if required > u64::from(spec.len) {
        return Err(SecnoteError::Constraint(format!(
            "minimums ({required}) don't fit in length {}",
            spec.len
        )));
    }
    let fill = spec.len - required as u32;

    if fill > 0 && classes.iter().all(|(_, _, bias)| *bias == 0) {
        return Err(SecnoteError::Constraint(
            "no enabled class has a non-zero bias".into(),
        ));
    }

    Ok(Plan { classes, fill })
}

/// Uniform integer in `[0, max)` by rejection sampling over 32-bit draws.
///
/// Values at or above the largest multiple of `max` that fits in 2^32 are
/// redrawn. `max` must be in `1..=u32::MAX`.
pub fn uniform<R: RngCore + CryptoRng>(rng: &mut R, max: u64) -> SecnoteResult<u32> {
    if max == 0 || max > u64::from(u32::MAX) {
        return Err(SecnoteError::OutOfRange {
            field: "uniform bound",
            value: max,
            limit: u64::from(u32::MAX),
        });
    }
    const RANGE: u64 = 1 << 32;
    let limit = RANGE - RANGE % max;
    loop {
        let v = u64::from(rng.next_u32());
        if v < limit {
            return Ok((v % max) as u32);
        }
    }
}

fn pick<R: RngCore + CryptoRng>(rng: &mut R, class: CharClass) -> SecnoteResult<char> {
    let alphabet = class.alphabet();
    let i = uniform(rng, alphabet.len() as u64)?;
    Ok(char::from(alphabet[i as usize]))
}

/// Step 1: exactly `min` characters from each enabled class, in class order.
pub fn draw_minimums<R: RngCore + CryptoRng>(plan: &Plan, rng: &mut R) -> SecnoteResult<Vec<char>> {
    let mut out = Vec::new();
    for (class, min, _) in &plan.classes {
        for _ in 0..*min {
            out.push(pick(rng, *class)?);
        }
    }
    Ok(out)
}

/// Step 2: `plan.fill` characters, each from a class chosen with probability
/// proportional to its bias weight.
pub fn draw_fill<R: RngCore + CryptoRng>(
    plan: &Plan,
    rng: &mut R,
    out: &mut Vec<char>,
) -> SecnoteResult<()> {
    let total: u64 = plan.classes.iter().map(|(_, _, bias)| u64::from(*bias)).sum();
    for _ in 0..plan.fill {
        let mut r = u64::from(uniform(rng, total)?);
        let mut chosen = plan.classes[0].0;
        for (class, _, bias) in &plan.classes {
            let bias = u64::from(*bias);
            if r < bias {
                chosen = *class;
                break;
            }
            r -= bias;
        }
        out.push(pick(rng, chosen)?);
    }
    Ok(())
}

/// Step 3: in-place Fisher-Yates, from the last index down to 1.
pub fn shuffle<T, R: RngCore + CryptoRng>(items: &mut [T], rng: &mut R) -> SecnoteResult<()> {
    for i in (1..items.len()).rev() {
        let j = uniform(rng, i as u64 + 1)? as usize;
        items.swap(i, j);
    }
    Ok(())
}

/// Generate a password with the OS CSPRNG.
pub fn generate_password(spec: &PasswordSpec) -> SecnoteResult<String> {
    generate_password_with(spec, &mut OsRng)
}

pub fn generate_password_with<R: RngCore + CryptoRng>(
    spec: &PasswordSpec,
    rng: &mut R,
) -> SecnoteResult<String> {
    let plan = plan(spec)?;
    let mut chars = draw_minimums(&plan, rng)?;
    draw_fill(&plan, rng, &mut chars)?;
    shuffle(&mut chars, rng)?;
    Ok(chars.into_iter().collect())
}
