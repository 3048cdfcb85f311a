//! Front matter and body extraction for spell and class documents.

use serde_yaml::{Mapping, Value};

use crate::components::parse_components;
use crate::error::ParseError;
use crate::lines::extract_line;
use crate::model::Spell;
use crate::registry::ClassRegistry;
use crate::tables::{
    CASTING_TIME_PREFIXES, COMPONENTS_PREFIXES, DISTANCE_PREFIXES, DURATION_PREFIXES,
};

/// The YAML header of a document and the lines that follow it.
#[derive(Debug, Clone)]
pub struct FrontMatter<'a> {
    pub fields: Mapping,
    pub body: Vec<&'a str>,
}

impl FrontMatter<'_> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A scalar field rendered as a string. Lists and maps are not scalars.
    pub fn scalar(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

/// What a class description file contributes to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub name: String,
    pub name_ua: String,
}

/// Split off the `---` delimited header and parse it as YAML.
pub fn extract_front_matter(contents: &str) -> Result<FrontMatter<'_>, ParseError> {
    let lines: Vec<&str> = contents
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let open = lines
        .iter()
        .position(|line| is_delimiter(line))
        .ok_or(ParseError::MissingFrontMatter)?;
    let close = lines[open + 1..]
        .iter()
        .position(|line| is_delimiter(line))
        .map(|offset| open + 1 + offset)
        .ok_or(ParseError::MissingFrontMatter)?;

    let yaml = lines[open + 1..close].join("\n");
    let fields = match serde_yaml::from_str::<Value>(&yaml)? {
        Value::Mapping(mapping) => mapping,
        _ => Mapping::new(),
    };

    Ok(FrontMatter {
        fields,
        body: lines[close + 1..].to_vec(),
    })
}

fn is_delimiter(line: &str) -> bool {
    line.trim_start_matches('\u{feff}').trim_end() == "---"
}

/// Parse one spell document. Class names are resolved through `registry`
/// only once the rest of the document has parsed, so a failing document
/// leaves the registry untouched.
pub fn extract_spell(
    slug: &str,
    contents: &str,
    registry: &mut ClassRegistry,
    id: i64,
) -> Result<Spell, ParseError> {
    let front = extract_front_matter(contents)?;

    let raw_title = front
        .scalar("title")
        .ok_or(ParseError::MissingField { field: "title" })?;
    let (title, title_ua) = split_title(&raw_title);
    let level = parse_level(front.get("level"))?;
    let school = front
        .scalar("tag")
        .ok_or(ParseError::MissingField { field: "tag" })?
        .trim()
        .to_string();
    let class_names = class_names(front.get("classes"))?;

    let casting_time = extract_line(&front.body, &CASTING_TIME_PREFIXES);
    let duration = extract_line(&front.body, &DURATION_PREFIXES);
    let distance = extract_line(&front.body, &DISTANCE_PREFIXES);
    let components = extract_line(&front.body, &COMPONENTS_PREFIXES);

    let parsed = parse_components(&components.value_or_empty())?;

    let last_property = [
        casting_time.index,
        duration.index,
        distance.index,
        components.index,
    ]
    .into_iter()
    .flatten()
    .max();
    let description_start = last_property.map_or(0, |index| index + 1);
    let description = collapse_description(&front.body[description_start..]);

    let mut classes = Vec::with_capacity(class_names.len());
    for name in &class_names {
        let class_id = registry.register(name);
        if !classes.contains(&class_id) {
            classes.push(class_id);
        }
    }

    Ok(Spell {
        id,
        slug: slug.to_lowercase(),
        school,
        level,
        classes,
        title,
        title_ua,
        description,
        casting_time: casting_time.value_or_empty(),
        duration: duration.value_or_empty(),
        distance: distance.value_or_empty(),
        components: parsed.components,
        material_description: parsed.material_description,
        material_price: parsed.material_price,
    })
}

/// Parse a class description file; `slug` is the file stem.
pub fn extract_class(slug: &str, contents: &str) -> Result<ClassEntry, ParseError> {
    let front = extract_front_matter(contents)?;
    let title = front
        .scalar("title")
        .ok_or(ParseError::MissingField { field: "title" })?;
    Ok(ClassEntry {
        name: slug.trim().to_lowercase(),
        name_ua: title.trim().to_lowercase(),
    })
}

/// Split `"Localized [Reference]"` (or `"[Reference] Localized"`) into
/// `(reference, localized)`. The bracketed part is always the reference
/// title. Without brackets both halves are the whole title.
pub fn split_title(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let bracketed = trimmed.split_once('[').and_then(|(before, rest)| {
        rest.split_once(']')
            .map(|(inside, after)| (before, inside, after))
    });

    match bracketed {
        Some((before, inside, after)) => {
            let reference = inside.trim().to_string();
            let localized = format!("{} {}", before.trim(), after.trim())
                .trim()
                .to_string();
            if localized.is_empty() {
                (reference.clone(), reference)
            } else {
                (reference, localized)
            }
        }
        None => (trimmed.to_string(), trimmed.to_string()),
    }
}

fn parse_level(value: Option<&Value>) -> Result<u32, ParseError> {
    let missing = ParseError::MissingField { field: "level" };
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|level| u32::try_from(level).ok())
            .ok_or(missing),
        Some(Value::String(text)) => text.trim().parse::<u32>().map_err(|_| missing),
        _ => Err(missing),
    }
}

fn class_names(value: Option<&Value>) -> Result<Vec<String>, ParseError> {
    let names: Vec<String> = match value {
        Some(Value::String(list)) => list.split(',').map(str::to_string).collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => return Err(ParseError::MissingField { field: "classes" }),
    };
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// Trim every line, join with `\n`, and collapse blank-line runs.
pub fn collapse_description<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(joined.len());
    let mut previous_newline = false;
    for ch in joined.trim().chars() {
        if ch == '\n' {
            if previous_newline {
                continue;
            }
            previous_newline = true;
        } else {
            previous_newline = false;
        }
        out.push(ch);
    }
    out
}
