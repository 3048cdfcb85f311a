use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;
use crate::model::Component;
use crate::tables::{component_for_symbol, currency_multiplier};

static PRICE_REGEX: OnceLock<Regex> = OnceLock::new();

fn price_regex() -> &'static Regex {
    PRICE_REGEX.get_or_init(|| {
        Regex::new(r"([0-9]+) ([мсез])м").expect("price pattern is a valid regex")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComponents {
    pub components: BTreeSet<Component>,
    pub material_description: Option<String>,
    pub material_price: Option<i64>,
}

/// Parse a components line such as `В, С, М (перлина вартістю 100 зм)`.
pub fn parse_components(line: &str) -> Result<ParsedComponents, ParseError> {
    let symbol_list = line.split('(').next().unwrap_or("").trim();

    let mut components = BTreeSet::new();
    for token in symbol_list.split(',') {
        let symbol = token.trim();
        let component = component_for_symbol(symbol).ok_or_else(|| {
            ParseError::UnrecognizedComponentSymbol {
                symbol: symbol.to_string(),
            }
        })?;
        components.insert(component);
    }

    let Some(material_description) = parenthesized(line) else {
        return Ok(ParsedComponents {
            components,
            ..ParsedComponents::default()
        });
    };
    let material_price = parse_price(&material_description);

    Ok(ParsedComponents {
        components,
        material_description: Some(material_description),
        material_price,
    })
}

/// Price in copper of the first `<amount> <unit>м` pattern in `text`.
pub fn parse_price(text: &str) -> Option<i64> {
    let captures = price_regex().captures(text)?;
    let amount: i64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().chars().next()?;
    amount.checked_mul(currency_multiplier(unit)?)
}

fn parenthesized(line: &str) -> Option<String> {
    let (_, rest) = line.split_once('(')?;
    let (inner, _) = rest.split_once(')')?;
    Some(inner.trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{parse_components, parse_price};
    use crate::error::ParseError;
    use crate::model::Component;

    #[test]
    fn symbols_without_material_note() {
        let parsed = parse_components("В, С").expect("parse");
        assert_eq!(
            parsed.components,
            BTreeSet::from([Component::Verbal, Component::Somatic])
        );
        assert_eq!(parsed.material_description, None);
        assert_eq!(parsed.material_price, None);
    }

    #[test]
    fn repeated_symbols_collapse() {
        let parsed = parse_components("В, В,С , В").expect("parse");
        assert_eq!(
            parsed.components,
            BTreeSet::from([Component::Verbal, Component::Somatic])
        );
    }

    #[test]
    fn material_note_with_gold_price() {
        let parsed =
            parse_components("В, С, М (алмаз вартістю щонайменше 5 зм, який закляття поглинає)")
                .expect("parse");
        assert_eq!(
            parsed.components,
            BTreeSet::from([Component::Verbal, Component::Somatic, Component::Material])
        );
        assert_eq!(
            parsed.material_description.as_deref(),
            Some("алмаз вартістю щонайменше 5 зм, який закляття поглинає")
        );
        assert_eq!(parsed.material_price, Some(50_000));
    }

    #[test]
    fn material_note_without_price_keeps_description() {
        let parsed = parse_components("М ( шматочок кришталю )").expect("parse");
        assert_eq!(parsed.components, BTreeSet::from([Component::Material]));
        assert_eq!(
            parsed.material_description.as_deref(),
            Some("шматочок кришталю")
        );
        assert_eq!(parsed.material_price, None);
    }

    #[test]
    fn unclosed_parenthesis_has_no_description() {
        let parsed = parse_components("В, М (незакрита примітка").expect("parse");
        assert_eq!(parsed.material_description, None);
        assert_eq!(parsed.material_price, None);
    }

    #[test]
    fn unrecognized_symbol_fails() {
        let error = parse_components("В, Z").expect_err("must fail");
        match error {
            ParseError::UnrecognizedComponentSymbol { symbol } => assert_eq!(symbol, "Z"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_line_fails() {
        let error = parse_components("").expect_err("must fail");
        assert!(matches!(
            error,
            ParseError::UnrecognizedComponentSymbol { ref symbol } if symbol.is_empty()
        ));
    }

    #[test]
    fn price_uses_currency_multiplier() {
        assert_eq!(parse_price("7 мм"), Some(7));
        assert_eq!(parse_price("25 см"), Some(2_500));
        assert_eq!(parse_price("3 ем"), Some(15_000));
        assert_eq!(parse_price("1000 зм"), Some(10_000_000));
        assert_eq!(parse_price("перлина за 100 зм або 2 см"), Some(1_000_000));
        assert_eq!(parse_price("5зм"), None);
        assert_eq!(parse_price("5 gp"), None);
        assert_eq!(parse_price("99999999999999999999 зм"), None);
    }
}
