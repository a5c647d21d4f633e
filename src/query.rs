use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};

/// Named query parameters.
pub type QueryParams = Map<String, Value>;

/// One flattened result record, keyed by column name. Columns are sorted by
/// name because the driver does not report the server's column order.
pub type Row = Map<String, Value>;

/// Cypher text plus its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    text: String,
    params: QueryParams,
}

impl CypherQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: QueryParams::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: Option<QueryParams>) -> Self {
        Self {
            text: text.into(),
            params: params.unwrap_or_default(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Builds the driver query, converting every parameter to its Bolt form.
    pub(crate) fn to_bolt(&self) -> Result<neo4rs::Query> {
        let mut query = neo4rs::query(&self.text);
        for (key, value) in &self.params {
            let bolt = json_to_bolt(value)
                .map_err(|e| GraphError::Parameter(format!("${}: {}", key, e)))?;
            query = query.param(key, bolt);
        }
        Ok(query)
    }
}

impl From<&str> for CypherQuery {
    fn from(text: &str) -> Self {
        CypherQuery::new(text)
    }
}

fn json_to_bolt(value: &Value) -> std::result::Result<BoltType, String> {
    let bolt = match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(BoltInteger::new(i))
            } else if n.is_u64() {
                return Err(format!("integer {} does not fit in 64 signed bits", n));
            } else if let Some(f) = n.as_f64() {
                BoltType::Float(BoltFloat::new(f))
            } else {
                return Err(format!("unsupported number {}", n));
            }
        }
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(json_to_bolt(item)?);
            }
            BoltType::List(list)
        }
        Value::Object(entries) => {
            let mut map = BoltMap::with_capacity(entries.len());
            for (key, item) in entries {
                map.put(BoltString::new(key), json_to_bolt(item)?);
            }
            BoltType::Map(map)
        }
    };
    Ok(bolt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_map_to_matching_bolt_types() {
        assert!(matches!(json_to_bolt(&json!(null)), Ok(BoltType::Null(_))));
        assert!(matches!(json_to_bolt(&json!(true)), Ok(BoltType::Boolean(_))));
        assert!(matches!(json_to_bolt(&json!(42)), Ok(BoltType::Integer(_))));
        assert!(matches!(json_to_bolt(&json!(-1.5)), Ok(BoltType::Float(_))));
        assert!(matches!(json_to_bolt(&json!("x")), Ok(BoltType::String(_))));
    }

    #[test]
    fn nested_values_convert() {
        let value = json!({ "names": ["a", "b"], "meta": { "depth": 2 } });
        match json_to_bolt(&value) {
            Ok(BoltType::Map(map)) => assert_eq!(map.value.len(), 2),
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[test]
    fn oversized_integers_are_rejected() {
        let query = CypherQuery::new("RETURN $n AS n").param("n", u64::MAX);
        match query.to_bolt() {
            Err(GraphError::Parameter(msg)) => assert!(msg.starts_with("$n")),
            other => panic!("expected a parameter error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn params_accumulate() {
        let query = CypherQuery::new("MATCH (n) WHERE n.a = $a AND n.b = $b RETURN n")
            .param("a", 1)
            .param("b", "two");

        let keys: Vec<&str> = query.params().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(query.to_bolt().is_ok());
    }

    #[test]
    fn missing_params_become_empty() {
        let query = CypherQuery::with_params("RETURN 1 AS n", None);
        assert!(query.params().is_empty());
        assert_eq!(query.text(), "RETURN 1 AS n");
    }
}
