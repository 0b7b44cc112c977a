/// Buckets opaque back-end error messages into presentation categories.
///
/// Third-party services report failures as free-form text, so this is
/// substring matching by necessity. All the matching rules live in this
/// one function; nothing else in the crate inspects message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    AuthFailure,
    ModelNotFound,
    QuotaExceeded,
    NetworkError,
    BothBackendsFailed,
    Unknown,
}

/// Classifies a failure message.
///
/// Rule order is load-bearing: an auth failure whose message mentions a
/// model id must not be reported as a missing model, so the auth rule
/// runs first. One consequence is that "local model not found" lands in
/// `ModelNotFound` rather than `BothBackendsFailed`; only the
/// "local model detection error" wording reaches the both-failed rule.
pub fn classify(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();

    if lower.contains("api key") || lower.contains("oauthexception") || message.contains("does not exist")
    {
        ErrorCategory::AuthFailure
    } else if lower.contains("model") && (lower.contains("not found") || lower.contains("not available"))
    {
        ErrorCategory::ModelNotFound
    } else if lower.contains("credits") || lower.contains("quota") {
        ErrorCategory::QuotaExceeded
    } else if lower.contains("network") || lower.contains("connection") || lower.contains("timeout")
    {
        ErrorCategory::NetworkError
    } else if lower.contains("local model detection error") {
        ErrorCategory::BothBackendsFailed
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::api_key("API key is not set. Configure ROBOFLOW_API_KEY.", ErrorCategory::AuthFailure)]
    #[case::oauth("OAuthException: invalid key", ErrorCategory::AuthFailure)]
    #[case::does_not_exist("workspace does not exist", ErrorCategory::AuthFailure)]
    #[case::model_missing("Model not found. Verify model id 'w/p/1'", ErrorCategory::ModelNotFound)]
    #[case::model_unavailable("model is not available on this plan", ErrorCategory::ModelNotFound)]
    #[case::credits("API credits exhausted or rate limited", ErrorCategory::QuotaExceeded)]
    #[case::quota("monthly quota reached", ErrorCategory::QuotaExceeded)]
    #[case::network("Network error calling inference API", ErrorCategory::NetworkError)]
    #[case::connection("connection refused", ErrorCategory::NetworkError)]
    #[case::timeout("request timeout after 30s", ErrorCategory::NetworkError)]
    #[case::both("Local model detection error: session init failed", ErrorCategory::BothBackendsFailed)]
    #[case::unknown("something odd happened", ErrorCategory::Unknown)]
    fn test_classification_table(#[case] message: &str, #[case] expected: ErrorCategory) {
        assert_eq!(classify(message), expected);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(classify("NETWORK unreachable"), ErrorCategory::NetworkError);
        assert_eq!(classify("Api Key rejected"), ErrorCategory::AuthFailure);
    }

    #[test]
    fn test_does_not_exist_is_case_sensitive() {
        // Only the exact lowercase phrase triggers the auth rule.
        assert_eq!(classify("Resource Does Not Exist"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_auth_rule_wins_over_model_rule() {
        // Mentions both an API key problem and a model; auth runs first.
        assert_eq!(
            classify("OAuthException: model 'w/p/1' not found for this key"),
            ErrorCategory::AuthFailure
        );
    }

    #[test]
    fn test_local_model_not_found_classifies_as_model_not_found() {
        // Current behavior: the model rule fires before the both-failed
        // rule ever sees this message.
        assert_eq!(
            classify("Local model not found at path: model/best.onnx"),
            ErrorCategory::ModelNotFound
        );
    }
}
