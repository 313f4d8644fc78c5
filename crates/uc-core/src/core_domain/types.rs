use std::fmt;

// ---------------------------------------------------------------------------
// String-based identity newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(ConversationId);
string_newtype!(SeedId);

// ---------------------------------------------------------------------------
// EvaluationTarget — one conversation queued for scoring
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EvaluationTarget {
    pub conversation_id: ConversationId,
    pub seed_id: SeedId,
}

impl EvaluationTarget {
    pub fn new(conversation_id: impl Into<String>, seed_id: impl Into<String>) -> Self {
        Self {
            conversation_id: ConversationId::new(conversation_id),
            seed_id: SeedId::new(seed_id),
        }
    }
}

/// Round to three decimal places, the precision every reported score uses.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_impls() {
        assert_eq!(ConversationId::new("conv-001").to_string(), "conv-001");
        assert_eq!(SeedId::new("seed-42").to_string(), "seed-42");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ConversationId::new("c1")).unwrap();
        assert_eq!(json, "\"c1\"");

        let seed: SeedId = serde_json::from_str("\"seed-7\"").unwrap();
        assert_eq!(seed.as_str(), "seed-7");
    }

    #[test]
    fn test_target_roundtrips_field_names() {
        let target = EvaluationTarget::new("c1", "s1");
        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value["conversation_id"], "c1");
        assert_eq!(value["seed_id"], "s1");
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.70049), 0.7);
        assert_eq!(round3(0.8125), 0.813);
        assert_eq!(round3(0.0), 0.0);
        assert_eq!(round3(1.0), 1.0);
    }
}
