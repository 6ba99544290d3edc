fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use resumable_protocol::{ApiErrorBody, RetryBudget, StateError, StateRecord, UploadProgress};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// Other clients may write `6` where Rust writes `6.0`; both mean the
    /// same thing.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- State record ---

    #[test]
    fn fixture_state_record() {
        let record = roundtrip_test::<StateRecord>("state_record.json");
        record.validate().unwrap();
        assert_eq!(record.bytes_confirmed, 20_971_520);
        assert_eq!(record.retry_budget, RetryBudget::Remaining(3));
        assert_eq!(record.remaining(), 31_457_280);
        assert_eq!(
            record.initiated_at.unwrap().to_rfc3339(),
            "2026-10-18T09:30:00+00:00"
        );
        assert_eq!(
            record.resource_metadata["status"]["privacyStatus"],
            "private"
        );
    }

    #[test]
    fn fixture_state_record_fresh() {
        let record = roundtrip_test::<StateRecord>("state_record_fresh.json");
        record.validate().unwrap();
        assert!(record.session_url.is_none());
        assert!(record.initiated_at.is_none());
        assert!(record.retry_budget.is_unlimited());
    }

    #[test]
    fn fixture_state_record_minimal_gets_defaults() {
        let record = StateRecord::from_json(&read_fixture("state_record_minimal.json")).unwrap();
        assert_eq!(record.bytes_confirmed, 400);
        assert!(record.retry_budget.is_unlimited());
        assert_eq!(record.content_type, "application/octet-stream");
        assert!(!record.monitoring_enabled);
        assert!(record.resource_metadata.is_null());

        // Defaults are written out explicitly.
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["retryBudget"], -1);
        assert_eq!(value["contentType"], "application/octet-stream");
    }

    #[test]
    fn fixture_state_record_invalid_is_rejected() {
        let err = StateRecord::from_json(&read_fixture("state_record_invalid.json")).unwrap_err();
        assert!(matches!(
            err,
            StateError::ConfirmedExceedsTotal {
                confirmed: 1001,
                total: 1000
            }
        ));
    }

    #[test]
    fn state_record_uses_camel_case_keys() {
        let value = load_fixture("state_record.json");
        let record: StateRecord = serde_json::from_value(value).unwrap();
        let out = serde_json::to_value(&record).unwrap();
        for key in [
            "bytesConfirmed",
            "totalSize",
            "credentialToken",
            "sourceDescriptor",
            "resourceMetadata",
            "monitoringEnabled",
            "retryBudget",
            "sessionUrl",
            "contentType",
            "initiatedAt",
        ] {
            assert!(out.get(key).is_some(), "missing key {key}");
        }
    }

    // --- Service error payloads ---

    #[test]
    fn fixture_api_error_metadata() {
        let body = roundtrip_test::<ApiErrorBody>("api_error_metadata.json");
        assert_eq!(body.error.code, 400);
        assert_eq!(body.error.reason(), Some("invalidTitle"));
        assert!(!body.error.is_auth_rejection());
    }

    #[test]
    fn fixture_api_error_auth() {
        let body = roundtrip_test::<ApiErrorBody>("api_error_auth.json");
        assert!(body.error.is_auth_rejection());
        assert_eq!(body.error.errors[0].location_type, "header");
    }

    // --- Progress ---

    #[test]
    fn fixture_upload_progress() {
        let progress = roundtrip_test::<UploadProgress>("upload_progress.json");
        assert!((progress.percentage() - 40.0).abs() < f64::EPSILON);
        assert_eq!(progress.eta_secs, Some(6.0));
    }
}
