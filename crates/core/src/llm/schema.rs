//! Output schemas for the four analysis agents.
//!
//! Every schema is strict: `additionalProperties: false` and all
//! declared properties required. Nullable fields carry
//! `["number", "null"]` so the model can admit missing data instead of
//! inventing values.

use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct SchemaDef {
    pub name: &'static str,
    pub schema: Value,
}

pub fn research() -> SchemaDef {
    SchemaDef {
        name: "ResearchSchema",
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["symbol", "sentiment", "ownership"],
            "properties": {
                "symbol": {"type": "string"},
                "sentiment": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["score", "top_headlines"],
                    "properties": {
                        "score": {"type": ["number", "null"], "minimum": -1, "maximum": 1},
                        "top_headlines": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "required": ["title", "link", "sentiment"],
                                "properties": {
                                    "title": {"type": "string"},
                                    "link": {"type": "string"},
                                    "sentiment": {"type": "string", "enum": ["pos", "neg", "neu"]}
                                }
                            }
                        }
                    }
                },
                "ownership": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["institutional", "foreign"],
                    "properties": {
                        "institutional": ownership_side(),
                        "foreign": ownership_side()
                    }
                }
            }
        }),
    }
}

pub fn technical() -> SchemaDef {
    SchemaDef {
        name: "TechnicalSchema",
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["symbol", "rsi", "macd", "support_levels", "resistance_levels", "trend"],
            "properties": {
                "symbol": {"type": "string"},
                "rsi": {"type": ["number", "null"]},
                "macd": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["hist", "signal", "macd"],
                    "properties": {
                        "hist": {"type": ["number", "null"]},
                        "signal": {"type": ["number", "null"]},
                        "macd": {"type": ["number", "null"]}
                    }
                },
                "support_levels": {
                    "type": "array",
                    "items": {"type": "number"}
                },
                "resistance_levels": {
                    "type": "array",
                    "items": {"type": "number"}
                },
                "trend": {"type": "string", "enum": ["up", "down", "sideways"]}
            }
        }),
    }
}

pub fn financial() -> SchemaDef {
    SchemaDef {
        name: "FinancialSchema",
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["symbol", "revenue_yoy", "eps_yoy", "roe", "debt_to_equity", "cash_flow"],
            "properties": {
                "symbol": {"type": "string"},
                "revenue_yoy": {"type": ["number", "null"]},
                "eps_yoy": {"type": ["number", "null"]},
                "roe": {"type": ["number", "null"]},
                "debt_to_equity": {"type": ["number", "null"]},
                "cash_flow": {"type": ["number", "null"]}
            }
        }),
    }
}

pub fn recommendation() -> SchemaDef {
    SchemaDef {
        name: "RecommendationSchema",
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["symbol", "recommendation", "report", "score"],
            "properties": {
                "symbol": {"type": "string"},
                "recommendation": {"type": "string", "enum": ["BUY", "SELL", "HOLD"]},
                "report": {"type": "string"},
                "score": {"type": "number", "minimum": 0, "maximum": 100}
            }
        }),
    }
}

fn ownership_side() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["current_pct", "delta_1d"],
        "properties": {
            "current_pct": {"type": ["number", "null"]},
            "delta_1d": {"type": ["number", "null"]}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_strict(value: &Value, path: &str) {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return,
        };
        if obj.get("type").and_then(Value::as_str) == Some("object") {
            assert_eq!(
                obj.get("additionalProperties"),
                Some(&Value::Bool(false)),
                "object at {path} must forbid extra properties"
            );
            let properties = obj
                .get("properties")
                .and_then(Value::as_object)
                .unwrap_or_else(|| panic!("object at {path} has no properties"));
            let mut declared: Vec<&str> = properties.keys().map(String::as_str).collect();
            declared.sort_unstable();
            let mut required: Vec<&str> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            required.sort_unstable();
            assert_eq!(declared, required, "all properties at {path} must be required");
        }
        for (key, child) in obj {
            assert_strict(child, &format!("{path}/{key}"));
        }
    }

    #[test]
    fn every_schema_is_fully_strict() {
        for def in [research(), technical(), financial(), recommendation()] {
            assert_strict(&def.schema, def.name);
        }
    }

    #[test]
    fn headline_sentiment_uses_short_labels() {
        let def = research();
        let labels = def
            .schema
            .pointer("/properties/sentiment/properties/top_headlines/items/properties/sentiment/enum")
            .and_then(Value::as_array)
            .unwrap();
        let labels: Vec<&str> = labels.iter().filter_map(Value::as_str).collect();
        assert_eq!(labels, vec!["pos", "neg", "neu"]);
    }

    #[test]
    fn recommendation_labels_and_score_bounds() {
        let def = recommendation();
        let labels: Vec<&str> = def
            .schema
            .pointer("/properties/recommendation/enum")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(labels, vec!["BUY", "SELL", "HOLD"]);
        assert_eq!(
            def.schema.pointer("/properties/score/minimum").and_then(Value::as_f64),
            Some(0.0)
        );
        assert_eq!(
            def.schema.pointer("/properties/score/maximum").and_then(Value::as_f64),
            Some(100.0)
        );
    }
}
