//! Heuristic slot extraction from free-form shopper text.
//!
//! Pure and deterministic: rule tables are iterated in declaration order, so
//! the first occasion that matches wins and colors come back in table order
//! regardless of where they appear in the input.

use std::sync::LazyLock;

use regex::Regex;

use bloomify_common::{Color, Occasion, SlotUpdate};

/// Earlier entries take priority on the same input.
const OCCASION_PATTERNS: &[(Occasion, &str)] = &[
    (
        Occasion::GetWell,
        r"(?i)menjenguk|sakit|sembuh|rumah\s*sakit|\bhospital\b|\brs\b|\bget\s*well\b",
    ),
    (
        Occasion::Condolence,
        r"(?i)duka|belasungkawa|wafat|jenazah|takziah|meninggal|\bfuneral\b|\bcondolences?\b|\bsympathy\b",
    ),
    (Occasion::Graduation, r"(?i)wisuda|kelulusan|yudisium|\bgraduation\b"),
    (Occasion::Birthday, r"(?i)ulang\s*tahun|\bultah\b|\bbirthday\b"),
    (Occasion::Anniversary, r"(?i)\banniversary\b|hari\s*jadi"),
    (Occasion::Romance, r"(?i)romantis|valentine|pacar|\bromance\b|\bromantic\b"),
    (Occasion::NewBaby, r"(?i)bayi|newborn|lahir|\bnew\s*baby\b"),
    (
        Occasion::ThankYou,
        r"(?i)terima\s*kasih|apresiasi|\bthank\s*you\b|\bthanks\b",
    ),
];

const COLOR_PATTERNS: &[(Color, &str)] = &[
    (Color::White, r"(?i)putih|\bwhite\b"),
    (Color::Yellow, r"(?i)kuning|\byellow\b"),
    (Color::Pink, r"(?i)\bpink\b"),
    (Color::Purple, r"(?i)ungu|lavender|\bpurple\b"),
    (Color::Red, r"(?i)merah|\bred\b"),
    (Color::Blue, r"(?i)biru|\bblue\b"),
    (Color::Green, r"(?i)hijau|\bgreen\b"),
];

static OCCASION_RULES: LazyLock<Vec<(Occasion, Regex)>> =
    LazyLock::new(|| compile(OCCASION_PATTERNS));
static COLOR_RULES: LazyLock<Vec<(Color, Regex)>> = LazyLock::new(|| compile(COLOR_PATTERNS));

fn compile<T: Copy>(table: &[(T, &str)]) -> Vec<(T, Regex)> {
    table
        .iter()
        .map(|(tag, pattern)| (*tag, Regex::new(pattern).unwrap()))
        .collect()
}

/// First numeric token and an optional thousand shorthand (`k`, `rb`, `ribu`).
/// A minus sign counts only at the start or after a non-word character, so
/// hyphenated words like `covid-19` are not negative amounts.
static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(?:^|[^\w])(-))?(\d[\d.,]*)(?:\s*(k|rb|ribu)\b)?").unwrap()
});

/// Extract every slot the text mentions. Unmentioned slots stay `None`.
pub fn extract_slots(text: &str) -> SlotUpdate {
    SlotUpdate {
        occasion: detect_occasion(text),
        budget: detect_budget(text),
        colors: detect_colors(text),
    }
}

pub fn detect_occasion(text: &str) -> Option<Occasion> {
    OCCASION_RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(occasion, _)| *occasion)
}

pub fn detect_colors(text: &str) -> Option<Vec<Color>> {
    let picked: Vec<Color> = COLOR_RULES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(color, _)| *color)
        .collect();
    (!picked.is_empty()).then_some(picked)
}

pub fn detect_budget(text: &str) -> Option<f64> {
    let caps = BUDGET_RE.captures(text)?;
    if caps.get(1).is_some() {
        return None;
    }
    let has_shorthand = caps.get(3).is_some();
    let amount = parse_amount(&caps[2], has_shorthand)?;
    let value = if has_shorthand { amount * 1000.0 } else { amount };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Normalize a digit run with `.`/`,` separators.
///
/// Separators are grouping marks, except that with a thousand shorthand a
/// single separator followed by one or two digits is a decimal point.
fn parse_amount(raw: &str, has_shorthand: bool) -> Option<f64> {
    let number = raw.trim_end_matches(['.', ',']);
    let separators: Vec<usize> = number
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == ',')
        .map(|(i, _)| i)
        .collect();

    let normalized: String = match separators.as_slice() {
        [single] if has_shorthand && (2..=3).contains(&(number.len() - single)) => {
            number.replace(',', ".")
        }
        _ => number.chars().filter(|c| c.is_ascii_digit()).collect(),
    };

    normalized.parse::<f64>().ok()
}
