//! Narrative spending insights
//!
//! The service generates these with a language model, so the shape is
//! loose: any field may be missing, and list fields sometimes arrive as a
//! single string or as objects. Everything is normalized to text here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Insight payload from the analytics endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingInsights {
    #[serde(default, deserialize_with = "text_block")]
    pub insights: Option<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub top_categories: Vec<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub concerns: Vec<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub suggestions: Vec<String>,
    /// Set by the service when generation failed
    #[serde(default, deserialize_with = "text_block")]
    pub error: Option<String>,
}

impl SpendingInsights {
    /// True when there is nothing to show
    pub fn is_empty(&self) -> bool {
        self.insights.is_none()
            && self.top_categories.is_empty()
            && self.concerns.is_empty()
            && self.suggestions.is_empty()
    }
}

/// What the insight sub-section shows
#[derive(Debug, Clone, PartialEq)]
pub enum InsightState {
    Available(SpendingInsights),
    /// Fetch failed or the service reported an error
    Unavailable(String),
    /// Not requested
    Skipped,
}

impl InsightState {
    /// Fold a fetch outcome; a payload carrying `error` is unavailable too
    pub fn from_result(result: crate::error::Result<SpendingInsights>) -> Self {
        match result {
            Ok(insights) => match &insights.error {
                Some(err) => Self::Unavailable(err.clone()),
                None => Self::Available(insights),
            },
            Err(e) => Self::Unavailable(e.user_message()),
        }
    }

    pub fn insights(&self) -> Option<&SpendingInsights> {
        match self {
            Self::Available(insights) => Some(insights),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| value_text(v).map(|t| format!("{}: {}", k, t)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn text_block<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Array(items) => {
            let lines: Vec<String> = items.iter().filter_map(value_text).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        other => value_text(other),
    })
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_full_payload() {
        let insights: SpendingInsights = serde_json::from_value(json!({
            "insights": "Food dominates this month.",
            "top_categories": ["Food", "Travel"],
            "concerns": ["Two receipts from the same merchant on one day"],
            "suggestions": ["Set a dining budget"]
        }))
        .unwrap();

        assert_eq!(insights.insights.as_deref(), Some("Food dominates this month."));
        assert_eq!(insights.top_categories, vec!["Food", "Travel"]);
        assert_eq!(insights.concerns.len(), 1);
        assert!(insights.error.is_none());
        assert!(!insights.is_empty());
    }

    #[test]
    fn test_loose_shapes() {
        let insights: SpendingInsights = serde_json::from_value(json!({
            "insights": ["Line one", "Line two"],
            "top_categories": [{ "category": "Food", "amount": 420.5 }],
            "concerns": "Spending spiked on weekends",
            "suggestions": null
        }))
        .unwrap();

        assert_eq!(insights.insights.as_deref(), Some("Line one\nLine two"));
        assert_eq!(insights.top_categories, vec!["amount: 420.5, category: Food"]);
        assert_eq!(insights.concerns, vec!["Spending spiked on weekends"]);
        assert!(insights.suggestions.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let insights: SpendingInsights = serde_json::from_value(json!({})).unwrap();
        assert!(insights.is_empty());
    }

    #[test]
    fn test_state_from_result() {
        let ok = InsightState::from_result(Ok(SpendingInsights {
            insights: Some("fine".into()),
            ..Default::default()
        }));
        assert!(ok.insights().is_some());

        let reported = InsightState::from_result(Ok(SpendingInsights {
            error: Some("model offline".into()),
            ..Default::default()
        }));
        assert_eq!(reported, InsightState::Unavailable("model offline".into()));

        let failed = InsightState::from_result(Err(Error::Api {
            status: 503,
            detail: "Analytics disabled".into(),
        }));
        assert_eq!(failed, InsightState::Unavailable("Analytics disabled".into()));
        assert!(failed.is_unavailable());
    }
}
