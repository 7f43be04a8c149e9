//! Serde helpers for storing chrono timestamps as BSON dates.

/// `Option<DateTime<Utc>>` stored as an optional BSON datetime.
pub mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(|dt| dt.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(default, with = "super::optional_bson_datetime", skip_serializing_if = "Option::is_none")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_optional_datetime_is_stored_as_bson_date() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let doc = bson::to_document(&Stamped { at: Some(at) }).unwrap();
        assert!(matches!(doc.get("at"), Some(bson::Bson::DateTime(_))));

        let back: Stamped = bson::from_document(doc).unwrap();
        assert_eq!(back.at, Some(at));
    }

    #[test]
    fn test_missing_datetime_reads_as_none() {
        let back: Stamped = bson::from_document(bson::doc! {}).unwrap();
        assert_eq!(back.at, None);
    }
}
