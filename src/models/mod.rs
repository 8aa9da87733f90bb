use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::db::{DocumentSnapshot, StoreError};

/// Champion record as seen by API clients.
///
/// Every field is optional: a field is only present when it holds a truthy
/// value, see [`Champion::cleaned`]. Falsy input (`null`, `false`, `""`, `0`)
/// reads as absent whatever the field type; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Champion {
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub order: Option<Number>,
    #[serde(default, deserialize_with = "falsy_as_none", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Deserialize a field, treating any falsy JSON value as `None`.
/// Truthy values of the wrong type are still rejected.
fn falsy_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if is_falsy(&value) {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(D::Error::custom)
}

impl Champion {
    /// Drop every field whose value is falsy: empty strings, zero and absent values.
    /// An attributes map is kept even when empty.
    pub fn cleaned(self) -> Champion {
        Champion {
            uid: self.uid.filter(|s| !s.is_empty()),
            name: self.name.filter(|s| !s.is_empty()),
            image: self.image.filter(|s| !s.is_empty()),
            avatar: self.avatar.filter(|s| !s.is_empty()),
            order: self.order.filter(|n| n.as_f64().is_some_and(|f| f != 0.0)),
            attributes: self.attributes,
        }
    }

    /// Map a stored document to a champion, or `None` if the document does not exist.
    /// The document id always wins over any `uid` stored in the data.
    pub fn from_snapshot(snapshot: &DocumentSnapshot, collection: &str) -> Result<Option<Champion>, StoreError> {
        let Some(data) = &snapshot.data else {
            return Ok(None);
        };

        let mut champion: Champion =
            serde_json::from_value(Value::Object(data.clone())).map_err(|source| StoreError::DataLoss {
                collection: collection.to_string(),
                id: snapshot.id.clone(),
                source,
            })?;
        champion.uid = Some(snapshot.id.clone());

        Ok(Some(champion.cleaned()))
    }

    /// Stored representation: every set field except `uid`, which is the document id
    pub fn into_document(self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(name) = self.name {
            fields.insert("name".to_string(), Value::String(name));
        }
        if let Some(image) = self.image {
            fields.insert("image".to_string(), Value::String(image));
        }
        if let Some(avatar) = self.avatar {
            fields.insert("avatar".to_string(), Value::String(avatar));
        }
        if let Some(order) = self.order {
            fields.insert("order".to_string(), Value::Number(order));
        }
        if let Some(attributes) = self.attributes {
            fields.insert("attributes".to_string(), Value::Object(attributes));
        }
        fields
    }
}

/// Response body for a single champion lookup: the record, or `false` when it does not exist
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChampionLookup {
    Found(Champion),
    Missing(bool),
}

impl From<Option<Champion>> for ChampionLookup {
    fn from(champion: Option<Champion>) -> Self {
        match champion {
            Some(champion) => ChampionLookup::Found(champion),
            None => ChampionLookup::Missing(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> Champion {
        serde_json::from_value(json!({
            "uid": "ahri",
            "name": "Ahri",
            "image": "ahri.png",
            "avatar": "ahri-avatar.png",
            "order": 4,
            "attributes": {"role": "mage"}
        }))
        .unwrap()
    }

    #[test]
    fn test_cleaned_keeps_truthy_fields() {
        assert_eq!(full().cleaned(), full());
    }

    #[test]
    fn test_cleaned_drops_each_falsy_field() {
        let falsy = [
            ("uid", json!("")),
            ("name", json!("")),
            ("image", json!("")),
            ("avatar", json!(null)),
            ("order", json!(0)),
            ("attributes", json!(null)),
        ];

        for (field, value) in falsy {
            let mut input = serde_json::to_value(full()).unwrap();
            input[field] = value;
            let champion: Champion = serde_json::from_value(input).unwrap();

            let cleaned = serde_json::to_value(champion.cleaned()).unwrap();
            assert!(cleaned.get(field).is_none(), "{field} should be dropped");
            assert_eq!(cleaned.as_object().unwrap().len(), 5);
        }
    }

    #[test]
    fn test_cleaned_drops_combinations() {
        let champion: Champion = serde_json::from_value(json!({
            "name": "",
            "image": "",
            "order": 0.0,
            "avatar": "a.png"
        }))
        .unwrap();

        assert_eq!(serde_json::to_value(champion.cleaned()).unwrap(), json!({"avatar": "a.png"}));
    }

    #[test]
    fn test_empty_attributes_are_kept() {
        let champion: Champion = serde_json::from_value(json!({"attributes": {}})).unwrap();
        assert_eq!(serde_json::to_value(champion.cleaned()).unwrap(), json!({"attributes": {}}));
    }

    #[test]
    fn test_false_reads_as_absent() {
        let champion: Champion = serde_json::from_value(json!({
            "uid": false,
            "name": "Foo",
            "image": false,
            "avatar": false,
            "order": false,
            "attributes": false
        }))
        .unwrap();

        assert_eq!(serde_json::to_value(champion.cleaned()).unwrap(), json!({"name": "Foo"}));
    }

    #[test]
    fn test_truthy_values_of_wrong_type_are_rejected() {
        for input in [json!({"name": true}), json!({"order": "first"}), json!({"attributes": [1]})] {
            assert!(serde_json::from_value::<Champion>(input.clone()).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let champion: Champion =
            serde_json::from_value(json!({"name": "Ahri", "lore": "...", "secret": true})).unwrap();
        assert_eq!(serde_json::to_value(champion.cleaned()).unwrap(), json!({"name": "Ahri"}));
    }

    #[test]
    fn test_from_snapshot_missing_ignores_data() {
        let snapshot = DocumentSnapshot::missing("ahri");
        assert_eq!(Champion::from_snapshot(&snapshot, "champions").unwrap(), None);
    }

    #[test]
    fn test_from_snapshot_uses_document_id() {
        let data = json!({"uid": "stale", "name": "Ahri", "order": 0}).as_object().cloned().unwrap();
        let snapshot = DocumentSnapshot::found("ahri", data);

        let champion = Champion::from_snapshot(&snapshot, "champions").unwrap().unwrap();
        assert_eq!(serde_json::to_value(champion).unwrap(), json!({"uid": "ahri", "name": "Ahri"}));
    }

    #[test]
    fn test_from_snapshot_rejects_malformed_data() {
        let data = json!({"name": 42}).as_object().cloned().unwrap();
        let snapshot = DocumentSnapshot::found("bad", data);

        let err = Champion::from_snapshot(&snapshot, "champions").unwrap_err();
        assert_eq!(err.code(), "data-loss");
    }

    #[test]
    fn test_into_document_skips_uid() {
        let doc = full().into_document();
        assert!(!doc.contains_key("uid"));
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn test_lookup_serializes_false_when_missing() {
        assert_eq!(serde_json::to_value(ChampionLookup::from(None)).unwrap(), json!(false));
        let found = ChampionLookup::from(Some(full()));
        assert_eq!(serde_json::to_value(found).unwrap()["name"], json!("Ahri"));
    }
}
