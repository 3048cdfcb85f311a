//! Static lookup data for the spell document grammar.
//!
//! Prefix variants are kept as explicit lists per field so that source
//! formatting drift (a missing colon, for instance) only needs a new entry.

use crate::model::Component;

pub const CASTING_TIME_PREFIXES: [&str; 2] = ["**Час створення:**", "**Час створення**"];
pub const DURATION_PREFIXES: [&str; 2] = ["**Тривалість:**", "**Тривалість**"];
pub const DISTANCE_PREFIXES: [&str; 2] = ["**Відстань:**", "**Відстань**"];
pub const COMPONENTS_PREFIXES: [&str; 2] = ["**Складові:**", "**Складові**"];

pub const COMPONENT_SYMBOLS: [(&str, Component); 3] = [
    ("В", Component::Verbal),
    ("С", Component::Somatic),
    ("М", Component::Material),
];

pub const COPPER: i64 = 1;
pub const SILVER: i64 = 100;
pub const ELECTRUM: i64 = 5_000;
pub const GOLD: i64 = 10_000;

/// Leading letter of a price unit (`зм`, `см`, ...) and its value in copper.
pub const CURRENCY_UNITS: [(char, i64); 4] = [
    ('м', COPPER),
    ('с', SILVER),
    ('е', ELECTRUM),
    ('з', GOLD),
];

/// Cyrillic letters that are routinely typed in place of their Latin twins.
pub const LATIN_LOOKALIKES: [(char, char); 24] = [
    ('А', 'A'),
    ('В', 'B'),
    ('Е', 'E'),
    ('К', 'K'),
    ('М', 'M'),
    ('Н', 'H'),
    ('О', 'O'),
    ('Р', 'P'),
    ('С', 'C'),
    ('Т', 'T'),
    ('У', 'y'),
    ('Х', 'X'),
    ('а', 'a'),
    ('в', 'B'),
    ('е', 'e'),
    ('к', 'K'),
    ('м', 'M'),
    ('н', 'H'),
    ('о', 'o'),
    ('р', 'p'),
    ('с', 'c'),
    ('т', 'T'),
    ('у', 'y'),
    ('х', 'x'),
];

pub fn component_for_symbol(symbol: &str) -> Option<Component> {
    COMPONENT_SYMBOLS
        .iter()
        .find(|(candidate, _)| *candidate == symbol)
        .map(|(_, component)| *component)
}

pub fn currency_multiplier(unit: char) -> Option<i64> {
    CURRENCY_UNITS
        .iter()
        .find(|(candidate, _)| *candidate == unit)
        .map(|(_, multiplier)| *multiplier)
}

pub fn latin_lookalike(ch: char) -> char {
    LATIN_LOOKALIKES
        .iter()
        .find(|(cyrillic, _)| *cyrillic == ch)
        .map(|(_, latin)| *latin)
        .unwrap_or(ch)
}
