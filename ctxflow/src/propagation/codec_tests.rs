//! Tests for the correlation context codec and header helpers.

#[cfg(test)]
mod tests {
    use crate::core::DataValue;
    use crate::errors::CodecError;
    use crate::policy::DataProperties;
    use crate::propagation::{
        decode_correlation_context, decode_entry, decode_header, down_propagation_headers,
        encode_correlation_context, encode_header, read_down_propagation_headers,
        up_propagation_headers, CORRELATION_CONTEXT_HEADER,
    };
    use crate::testing::{assert_data, assert_no_data, TestEnvironment};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn decode_all(header: &str) -> HashMap<String, DataValue> {
        let mut out = HashMap::new();
        decode_correlation_context(header, |k, v| {
            out.insert(k, v);
        });
        out
    }

    fn round_trip(value: DataValue) -> Option<DataValue> {
        let header = encode_correlation_context([("k", &value)])?;
        decode_all(&header).remove("k")
    }

    #[test]
    fn test_round_trip_preserves_type() {
        let values = vec![
            DataValue::from("plain text"),
            DataValue::Byte(-7),
            DataValue::Short(1234),
            DataValue::Int(-42),
            DataValue::Long(9_007_199_254_740_993),
            DataValue::Float(1.25),
            DataValue::Double(-0.1),
            DataValue::Char(','),
            DataValue::Boolean(true),
            DataValue::Boolean(false),
        ];
        for value in values {
            assert_eq!(round_trip(value.clone()), Some(value));
        }
    }

    #[test]
    fn test_long_decodes_as_long_not_string() {
        let decoded = round_trip(DataValue::Long(5)).unwrap();
        assert!(matches!(decoded, DataValue::Long(5)));
    }

    #[test]
    fn test_encode_format() {
        let name = DataValue::from("a b,c=d");
        let count = DataValue::Int(3);
        let header = encode_correlation_context([("user name", &name), ("count", &count)]).unwrap();
        assert_eq!(header, "user%20name=a%20b%2Cc%3Dd,count=3;type=i");
    }

    #[test]
    fn test_byte_uses_a_and_boolean_uses_b() {
        let byte = DataValue::Byte(1);
        let flag = DataValue::Boolean(true);
        assert_eq!(
            encode_correlation_context([("x", &byte)]).unwrap(),
            "x=1;type=a"
        );
        assert_eq!(
            encode_correlation_context([("x", &flag)]).unwrap(),
            "x=true;type=b"
        );
    }

    #[test]
    fn test_encode_unsupported_only_emits_nothing() {
        let object = DataValue::from(serde_json::json!({"nested": [1, 2]}));
        assert_eq!(encode_correlation_context([("x", &object)]), None);
        assert!(encode_header([("x", &object)]).is_empty());
    }

    #[test]
    fn test_encode_drops_only_unsupported_entries() {
        let object = DataValue::from(serde_json::json!([]));
        let text = DataValue::from("ok");
        assert_eq!(
            encode_correlation_context([("x", &object), ("y", &text)]),
            Some("y=ok".to_string())
        );
    }

    #[test]
    fn test_encode_empty_input() {
        let entries: Vec<(&str, &DataValue)> = Vec::new();
        assert_eq!(encode_correlation_context(entries), None);
    }

    #[test]
    fn test_unicode_round_trip() {
        let value = DataValue::from("grüße/東京");
        let header = encode_correlation_context([("ключ", &value)]).unwrap();
        assert!(header.is_ascii());
        assert_eq!(decode_all(&header).get("ключ"), Some(&value));
    }

    #[test]
    fn test_decode_skips_malformed_entry() {
        let decoded = decode_all("a=1,bad_entry_no_equals,c=3");
        let expected: HashMap<String, DataValue> = [
            ("a".to_string(), DataValue::from("1")),
            ("c".to_string(), DataValue::from("3")),
        ]
        .into_iter()
        .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_decode_trims_whitespace_and_plus() {
        let decoded = decode_all(" a = x+y ; type = s , b=2");
        assert_eq!(decoded.get("b"), Some(&DataValue::from("2")));
        // "x y" is not a short, so the typed entry is skipped
        assert_eq!(decoded.get("a"), None);

        let decoded = decode_all(" a = x+y ,b=2");
        assert_eq!(decoded.get("a"), Some(&DataValue::from("x y")));
    }

    #[test]
    fn test_decode_unknown_type_keeps_string() {
        let decoded = decode_all("a=12;type=q,b=7;type=ii");
        assert_eq!(decoded.get("a"), Some(&DataValue::from("12")));
        assert_eq!(decoded.get("b"), Some(&DataValue::from("7")));
    }

    #[test]
    fn test_decode_ignores_other_properties() {
        let decoded = decode_all("a=12;ttl=5;type=l;flag");
        assert_eq!(decoded.get("a"), Some(&DataValue::Long(12)));
    }

    #[test]
    fn test_decode_entry_errors() {
        assert!(matches!(
            decode_entry("a=b=c"),
            Err(CodecError::MissingAssignment { .. })
        ));
        assert!(matches!(decode_entry("=v"), Err(CodecError::EmptyKey { .. })));
        assert!(matches!(
            decode_entry("a=%FF%FE"),
            Err(CodecError::InvalidEncoding { .. })
        ));
        assert!(matches!(
            decode_entry("a=300;type=a"),
            Err(CodecError::InvalidValue { type_id: 'a', .. })
        ));
    }

    #[test]
    fn test_decode_empty_value() {
        assert_eq!(
            decode_entry("a=").unwrap(),
            ("a".to_string(), DataValue::from(""))
        );
    }

    #[test]
    fn test_decode_returns_accepted_count() {
        let accepted = decode_correlation_context("a=1,,b=%FF,c=2", |_, _| {});
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_decode_header_into_context_case_insensitive() {
        let env = TestEnvironment::default();
        let context = env.create(false);
        let headers = HashMap::from([(
            "correlation-context".to_string(),
            "user=alice,retries=2;type=i".to_string(),
        )]);

        let written = decode_header(&headers, &context);

        assert_eq!(written, 2);
        assert_data(&context, "user", "alice");
        assert_data(&context, "retries", 2_i32);
    }

    #[test]
    fn test_decode_header_without_header() {
        let env = TestEnvironment::default();
        let context = env.create(false);
        assert_eq!(decode_header(&HashMap::new(), &context), 0);
    }

    #[test]
    fn test_down_propagation_headers_use_global_flags() {
        let env = TestEnvironment::builder()
            .key("tenant", DataProperties::default().with_down_global(true))
            .key("reply", DataProperties::default().with_up_global(true))
            .down_key("local_only")
            .build();
        let context = env
            .open(&[
                ("tenant", DataValue::from("acme")),
                ("reply", DataValue::Long(1)),
                ("local_only", DataValue::from("x")),
            ])
            .unwrap();

        let down = down_propagation_headers(&context);
        let up = up_propagation_headers(&context);

        assert_eq!(
            down.get(CORRELATION_CONTEXT_HEADER).map(String::as_str),
            Some("tenant=acme")
        );
        assert_eq!(
            up.get(CORRELATION_CONTEXT_HEADER).map(String::as_str),
            Some("reply=1;type=l")
        );
        context.close().unwrap();
    }

    #[test]
    fn test_read_down_propagation_headers_filters_keys() {
        let env = TestEnvironment::builder()
            .key("tenant", DataProperties::default().with_down_global(true))
            .build();
        let context = env.create(false);
        let headers = HashMap::from([(
            CORRELATION_CONTEXT_HEADER.to_string(),
            "tenant=acme,injected=evil".to_string(),
        )]);

        let written = read_down_propagation_headers(&headers, &context);

        assert_eq!(written, 1);
        assert_data(&context, "tenant", "acme");
        assert_no_data(&context, "injected");
    }

    #[test]
    fn test_decode_into_closed_context_writes_nothing() {
        let env = TestEnvironment::default();
        let context = env.create(false);
        context.close().unwrap();
        let headers = HashMap::from([(
            CORRELATION_CONTEXT_HEADER.to_string(),
            "a=1".to_string(),
        )]);

        assert_eq!(decode_header(&headers, &context), 0);
        assert_no_data(&context, "a");
    }
}
