use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Verbal,
    Somatic,
    Material,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub name_ua: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub id: i64,
    pub slug: String,
    pub school: String,
    pub level: u32,
    pub classes: Vec<i64>,
    pub title: String,
    pub title_ua: String,
    pub description: String,
    pub casting_time: String,
    pub duration: String,
    pub distance: String,
    pub components: BTreeSet<Component>,
    #[serde(rename = "materialDescription")]
    pub material_description: Option<String>,
    #[serde(rename = "materialPrice")]
    pub material_price: Option<i64>,
}

/// Everything one parse run produces, ready to be exported or loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub classes: Vec<Class>,
    pub spells: Vec<Spell>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{Component, Spell};

    #[test]
    fn component_names_match_stored_type_names() {
        let parsed: BTreeSet<Component> =
            serde_json::from_str(r#"["material", "verbal", "somatic"]"#).expect("decode");
        assert_eq!(
            parsed,
            BTreeSet::from([Component::Verbal, Component::Somatic, Component::Material])
        );
        assert!(serde_json::from_str::<Component>(r#""focus""#).is_err());
    }

    #[test]
    fn spell_serializes_component_set_as_array() {
        let spell = Spell {
            id: 1,
            slug: "light".to_string(),
            school: "evocation".to_string(),
            level: 0,
            classes: vec![2, 1],
            title: "Light".to_string(),
            title_ua: "Світло".to_string(),
            description: "Glows.".to_string(),
            casting_time: "1 дія".to_string(),
            duration: "1 година".to_string(),
            distance: "Дотик".to_string(),
            components: BTreeSet::from([Component::Material, Component::Verbal]),
            material_description: Some("світлячок".to_string()),
            material_price: None,
        };

        let value = serde_json::to_value(&spell).expect("serialize");
        assert_eq!(value["components"], serde_json::json!(["verbal", "material"]));
        assert_eq!(value["classes"], serde_json::json!([2, 1]));
        assert_eq!(value["materialDescription"], "світлячок");
        assert!(value["materialPrice"].is_null());
    }
}
