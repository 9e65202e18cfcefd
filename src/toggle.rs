use serde::Deserialize;

use crate::models::RiskToggleState;

/// Whether a computed risk level may be shown. Missing state keeps it visible.
pub fn is_risk_visible(state: Option<&RiskToggleState>) -> bool {
    state.map_or(true, |state| state.enabled)
}

#[derive(Deserialize)]
struct TogglePayload {
    toggle_risk: Option<bool>,
}

/// Parses the course settings payload `{"toggle_risk": bool}`.
pub fn parse_toggle_payload(course_id: &str, body: &str) -> Option<RiskToggleState> {
    let payload: TogglePayload = serde_json::from_str(body).ok()?;
    payload.toggle_risk.map(|enabled| RiskToggleState {
        course_id: course_id.to_string(),
        enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_is_visible() {
        assert!(is_risk_visible(None));
    }

    #[test]
    fn explicit_state_wins() {
        let state = RiskToggleState {
            course_id: "101".to_string(),
            enabled: false,
        };
        assert!(!is_risk_visible(Some(&state)));
    }

    #[test]
    fn malformed_payload_fails_open() {
        assert_eq!(parse_toggle_payload("101", "not json"), None);
        assert_eq!(parse_toggle_payload("101", r#"{"other": 1}"#), None);
        assert_eq!(parse_toggle_payload("101", r#"{"toggle_risk": "yes"}"#), None);

        let state = parse_toggle_payload("101", r#"{"toggle_risk": false}"#);
        assert!(!is_risk_visible(state.as_ref()));
    }
}
