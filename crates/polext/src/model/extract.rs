//! Extraction payloads: the raw per-document output of the model and the
//! aggregated, normalized record exposed to users.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Accepts strings, numbers, booleans and `null` for fields the model is
/// asked to emit as strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifying fields of the insured party and object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub object: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub vin: Option<String>,
    /// Policy kind, e.g. `CASCO`.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    /// Any further fields the prompt of a policy type asks for.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One offer exactly as the model returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOffer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: String,
    /// Some responses name the insurer under this key instead of `company`.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub insurer: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rate1: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rate4: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub franchise_partial: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub franchise_total: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sum: String,
}

impl RawOffer {
    /// `company`, falling back to `insurer` when the former is blank.
    pub fn company_name(&self) -> &str {
        if self.company.trim().is_empty() {
            &self.insurer
        } else {
            &self.company
        }
    }
}

/// Structured extraction of a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExtract {
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_data: ClientData,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offers_without_franchise: Vec<RawOffer>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offers_with_franchise: Vec<RawOffer>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub risks: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: String,
}

impl DocumentExtract {
    /// Converts a recovered JSON object into the per-document schema.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A normalized offer: monetary fields are `.`-grouped integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub company: String,
    pub rate1: String,
    pub rate4: String,
    pub franchise_partial: String,
    pub franchise_total: String,
    pub sum: String,
}

/// The aggregated result of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyExtract {
    #[serde(default)]
    pub client_data: ClientData,
    #[serde(default)]
    pub offers_without_franchise: Vec<Offer>,
    #[serde(default)]
    pub offers_with_franchise: Vec<Offer>,
    #[serde(default)]
    pub risks: String,
    #[serde(default)]
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_extract_from_model_json() {
        let value = json!({
            "clientData": {"name": "Popescu Ion", "object": "Dacia Logan", "vin": "UU1234", "type": "CASCO"},
            "offersWithoutFranchise": [
                {"company": "Allianz", "rate1": "1.200", "rate4": "1.250", "franchisePartial": "0", "franchiseTotal": "10%", "sum": "15.000"}
            ],
            "offersWithFranchise": [],
            "risks": "Theft, damage",
            "notes": "Driver over 25"
        });

        let extract = DocumentExtract::from_value(value).unwrap();
        assert_eq!(extract.client_data.name.as_deref(), Some("Popescu Ion"));
        assert_eq!(extract.client_data.kind.as_deref(), Some("CASCO"));
        assert_eq!(extract.offers_without_franchise.len(), 1);
        assert_eq!(extract.offers_without_franchise[0].franchise_total, "10%");
        assert_eq!(extract.risks, "Theft, damage");
    }

    #[test]
    fn test_lenient_fields_accept_numbers_and_nulls() {
        let value = json!({
            "clientData": null,
            "offersWithoutFranchise": null,
            "offersWithFranchise": [
                {"company": "Groupama", "rate1": 980.5, "sum": null, "franchiseTotal": 5}
            ],
            "risks": null
        });

        let extract = DocumentExtract::from_value(value).unwrap();
        assert_eq!(extract.client_data, ClientData::default());
        assert!(extract.offers_without_franchise.is_empty());
        let offer = &extract.offers_with_franchise[0];
        assert_eq!(offer.rate1, "980.5");
        assert_eq!(offer.sum, "");
        assert_eq!(offer.franchise_total, "5");
        assert_eq!(extract.risks, "");
    }

    #[test]
    fn test_insurer_alias() {
        let offer: RawOffer = serde_json::from_value(json!({"insurer": "Generali"})).unwrap();
        assert_eq!(offer.company_name(), "Generali");

        let offer: RawOffer =
            serde_json::from_value(json!({"company": "Omniasig", "insurer": "Generali"})).unwrap();
        assert_eq!(offer.company_name(), "Omniasig");
    }

    #[test]
    fn test_client_data_keeps_extra_fields() {
        let value = json!({"name": "Ion", "plate": "B-123-ABC"});
        let client: ClientData = serde_json::from_value(value).unwrap();
        assert_eq!(client.extra.get("plate"), Some(&json!("B-123-ABC")));

        let back = serde_json::to_value(&client).unwrap();
        assert_eq!(back, json!({"name": "Ion", "plate": "B-123-ABC"}));
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(DocumentExtract::from_value(json!([1, 2, 3])).is_err());
    }
}
