//! Helpers for encoding/decoding the JSON snapshot of a session [`Record`].
//!
//! Stores that keep records as text (like [`MemoryStore`](crate::MemoryStore)) should go through
//! these helpers so `cookie.expires` is normalized on the way back in: both RFC 3339 strings and
//! unix-millisecond numbers decode to an [`OffsetDateTime`](time::OffsetDateTime).

use crate::{record::Record, store};

/// Encode a session [`Record`] into its JSON snapshot.
pub fn encode_record(record: &Record) -> store::Result<String> {
    serde_json::to_string(record).map_err(|err| store::Error::Encode(err.to_string()))
}

/// Decode a JSON snapshot into a session [`Record`].
pub fn decode_record(value: &str) -> store::Result<Record> {
    serde_json::from_str(value).map_err(|err| store::Error::Decode(err.to_string()))
}

pub(crate) mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de, ser};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Text(String),
        Millis(i64),
    }

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(datetime) => {
                let text = datetime.format(&Rfc3339).map_err(ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        Option::<Timestamp>::deserialize(deserializer)?
            .map(|timestamp| match timestamp {
                Timestamp::Text(text) => {
                    OffsetDateTime::parse(&text, &Rfc3339).map_err(de::Error::custom)
                }
                Timestamp::Millis(millis) => {
                    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
                        .map_err(de::Error::custom)
                }
            })
            .transpose()
    }
}

pub(crate) mod same_site {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::SameSite;

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<SameSite>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(SameSite::Strict) => serializer.serialize_some("strict"),
            Some(SameSite::Lax) => serializer.serialize_some("lax"),
            Some(SameSite::None) => serializer.serialize_some("none"),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SameSite>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| match text.to_ascii_lowercase().as_str() {
                "strict" => Ok(SameSite::Strict),
                "lax" => Ok(SameSite::Lax),
                "none" => Ok(SameSite::None),
                other => Err(de::Error::custom(format!("unknown SameSite value: {other}"))),
            })
            .transpose()
    }
}
