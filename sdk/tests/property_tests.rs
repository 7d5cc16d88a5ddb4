use proptest::prelude::*;
use sdk::errors::{AnalystErrorExt, EngineError};
use sdk::types::ToolInput;

// Every error variant yields a non-empty, static user hint that never echoes
// the raw detail string back to the user.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-zA-Z0-9_./:-]{8,40}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::Database(error_str.clone()),
            EngineError::Memory(error_str.clone()),
            EngineError::Archive(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::UnknownProvider(error_str.clone()),
            EngineError::ToolNotFound(error_str.clone()),
            EngineError::ToolError(error_str.clone()),
            EngineError::Profiler(error_str.clone()),
            EngineError::UnknownSourceType(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(error_str.as_str()));
        }
    }
}

// Tool arguments written as a JSON object always decode back to the same keys.
proptest! {
    #[test]
    fn test_tool_input_object_keys_survive(
        code in "[a-zA-Z0-9 ()=+]{0,40}",
        k in 1i64..50,
    ) {
        let raw = serde_json::json!({"code": code, "k": k}).to_string();
        let input = ToolInput::from_json(&raw, "code").expect("object arguments decode");

        prop_assert_eq!(input.param_str("code").expect("code present"), code);
        prop_assert_eq!(input.param_i64_opt("k"), Some(k));
    }
}
