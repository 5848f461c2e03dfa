// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════
mod mtuple_tests {
    use crate::config::{CaptureConfig, RepeatedCallPolicy};
    use crate::contract::{Contract, OperationSignature, Parameter, signature_of};
    use crate::error::{BindError, BoxError, MTupleError, MethodSendingError};
    use crate::extractor::{Receiver, Sink};
    use crate::field_value::ValueKind;
    use crate::mtuple::{MTuple, MTupleBuilder};
    use crate::types::FieldMap;
    use crate::value::{MNumber, MValue};
    use once_cell::sync::Lazy;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    crate::contract! {
        #[derive(Debug, Clone, PartialEq)]
        enum Person {
            With { name: String, age: i64 },
        }
    }

    crate::contract! {
        #[derive(Debug, Clone, PartialEq)]
        enum Message {
            ItemCreated { id: String, name: String },
            ItemDeleted { id: String },
        }
    }

    crate::contract! {
        #[derive(Debug, Clone, PartialEq)]
        enum Shipment {
            Dispatched { order: u64, carrier: Option<String>, weight: f64, tags: Vec<String> },
            Held { order: u64, reason: MValue },
            Cancelled {},
        }
    }

    fn person_name(sink: Sink<String>) -> impl FnMut(Person) {
        move |p| match p {
            Person::With { name, .. } => sink.accept(name),
        }
    }

    fn person_age(sink: Sink<i64>) -> impl FnMut(Person) {
        move |p| match p {
            Person::With { age, .. } => sink.accept(age),
        }
    }

    fn message_id(sink: Sink<String>) -> impl FnMut(Message) {
        move |m| match m {
            Message::ItemCreated { id, .. } | Message::ItemDeleted { id } => sink.accept(id),
        }
    }

    fn shipment_order(sink: Sink<u64>) -> impl FnMut(Shipment) {
        move |s| match s {
            Shipment::Dispatched { order, .. } | Shipment::Held { order, .. } => sink.accept(order),
            Shipment::Cancelled {} => {}
        }
    }

    fn person(name: &str, age: i64) -> MTuple<Person> {
        MTuple::<Person>::build(|p| {
            p.call(Person::With {
                name: name.to_string(),
                age,
            })
        })
        .unwrap()
        .unwrap()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    /// Receiver whose own logic always fails.
    struct Rejecting;

    impl Receiver<Person> for Rejecting {
        fn receive(&mut self, _call: Person) -> Result<(), BoxError> {
            Err("too young".into())
        }
    }

    /// Declares the same parameter twice.
    #[derive(Debug)]
    enum Broken {
        Twice { a: i64 },
    }

    impl Contract for Broken {
        const NAME: &'static str = "Broken";

        fn operations() -> &'static [OperationSignature] {
            static OPS: Lazy<Vec<OperationSignature>> = Lazy::new(|| {
                vec![OperationSignature::new(
                    "Broken",
                    "Twice",
                    vec![
                        Parameter::new("a", ValueKind::I64),
                        Parameter::new("a", ValueKind::I64),
                    ],
                )]
            });
            OPS.as_slice()
        }

        fn operation_name(&self) -> &'static str {
            "Twice"
        }

        fn into_args(self) -> Vec<MValue> {
            match self {
                Broken::Twice { a } => vec![a.into(), a.into()],
            }
        }

        fn bind(signature: &OperationSignature, _args: &[MValue]) -> Result<Self, BindError> {
            Err(BindError::UnknownOperation {
                operation: signature.name().into(),
            })
        }
    }

    /// Well-formed declaration whose binding has lost its only variant.
    #[derive(Debug)]
    enum Legacy {
        Ping,
    }

    impl Contract for Legacy {
        const NAME: &'static str = "Legacy";

        fn operations() -> &'static [OperationSignature] {
            static OPS: Lazy<Vec<OperationSignature>> =
                Lazy::new(|| vec![OperationSignature::new("Legacy", "Ping", vec![])]);
            OPS.as_slice()
        }

        fn operation_name(&self) -> &'static str {
            "Ping"
        }

        fn into_args(self) -> Vec<MValue> {
            vec![]
        }

        fn bind(signature: &OperationSignature, _args: &[MValue]) -> Result<Self, BindError> {
            Err(BindError::UnknownOperation {
                operation: signature.name().into(),
            })
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Extraction
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_extract_values() {
        let record = person("Theodor", 41);

        assert_eq!(record.extract(person_name).unwrap(), Some("Theodor".to_string()));
        assert_eq!(record.extract(person_age).unwrap(), Some(41));
    }

    #[test]
    fn test_extract_across_operations() {
        let created = MTuple::<Message>::build(|m| {
            m.call(Message::ItemCreated {
                id: "123".into(),
                name: "Foo".into(),
            })
        })
        .unwrap()
        .unwrap();
        let deleted = MTuple::<Message>::build(|m| m.call(Message::ItemDeleted { id: "123".into() }))
            .unwrap()
            .unwrap();

        assert_eq!(created.extract(message_id).unwrap(), Some("123".to_string()));
        assert_eq!(
            created.extract(message_id).unwrap(),
            deleted.extract(message_id).unwrap()
        );
    }

    #[test]
    fn test_extract_without_sink_write_is_absent() {
        let cancelled = MTuple::from_call(Shipment::Cancelled {}).unwrap();
        assert_eq!(cancelled.extract(shipment_order).unwrap(), None);

        let held = MTuple::from_call(Shipment::Held {
            order: 7,
            reason: MValue::from("customs"),
        })
        .unwrap();
        assert_eq!(held.extract(shipment_order).unwrap(), Some(7));
    }

    #[test]
    fn test_extract_with_borrowed_closure() {
        let record = person("Ada", 36);
        let initial = |sink: Sink<char>| {
            move |p: Person| match p {
                Person::With { name, .. } => {
                    if let Some(c) = name.chars().next() {
                        sink.accept(c)
                    }
                }
            }
        };

        assert_eq!(record.extract(&initial).unwrap(), Some('A'));
        assert_eq!(record.extract(&initial).unwrap(), Some('A'));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Identity
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_equality() {
        let rosa1 = person("Rosa", 39);
        let rosa2 = person("Rosa", 39);
        let walter = person("Walter", 39);

        assert_eq!(rosa1, rosa2);
        assert_ne!(rosa2, walter);
        assert_ne!(rosa1, walter);
    }

    #[test]
    fn test_hash_codes() {
        let antonio1 = person("Antonio", 67);
        let antonio2 = person("Antonio", 67);
        let victor = person("Victor", 23);

        assert_eq!(hash_of(&antonio1), hash_of(&antonio2));
        assert_ne!(hash_of(&antonio2), hash_of(&victor));
        assert_eq!(antonio1.fingerprint(), antonio2.fingerprint());
        assert_ne!(antonio1.fingerprint(), victor.fingerprint());
    }

    #[test]
    fn test_equality_across_operations() {
        let created = MTuple::from_call(Message::ItemCreated {
            id: "1".into(),
            name: "1".into(),
        })
        .unwrap();
        let deleted = MTuple::from_call(Message::ItemDeleted { id: "1".into() }).unwrap();

        assert_ne!(created, deleted);
    }

    #[test]
    fn test_float_fields_compare_by_bits() {
        let dispatched = |weight: f64| {
            MTuple::from_call(Shipment::Dispatched {
                order: 1,
                carrier: None,
                weight,
                tags: vec![],
            })
            .unwrap()
        };

        assert_eq!(dispatched(f64::NAN), dispatched(f64::NAN));
        assert_eq!(hash_of(&dispatched(f64::NAN)), hash_of(&dispatched(f64::NAN)));
        assert_ne!(dispatched(0.0), dispatched(-0.0));
    }

    #[test]
    fn test_clone_is_equal() {
        let record = person("Grete", 52);
        let _ = record.to_map();
        let copy = record.clone();

        assert_eq!(record, copy);
        assert_eq!(record.to_map(), copy.to_map());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Name-indexed access
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_values_by_parameter_name() {
        let record = person("Herbert", 23);

        assert_eq!(record.get("age"), Some(&MValue::from(23i64)));
        assert_eq!(record.get_as::<i64>("age"), Some(23));
        assert_eq!(record.get_as::<String>("name"), Some("Herbert".to_string()));
    }

    #[test]
    fn test_unknown_parameter_is_absent() {
        let record = person("Herbert", 23);

        assert!(record.get("height").is_none());
        assert!(record.get_as::<i64>("name").is_none());
    }

    #[test]
    fn test_to_map_is_memoized() {
        let record = person("Ilse", 80);
        let first: *const FieldMap = record.to_map();
        let second: *const FieldMap = record.to_map();

        assert!(std::ptr::eq(first, second));
        assert_eq!(record.to_map().len(), 2);
    }

    #[test]
    fn test_to_map_concurrent_first_access() {
        let record = person("Konrad", 58);

        let seen: Vec<(usize, FieldMap)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let map = record.to_map();
                        (map as *const FieldMap as usize, map.clone())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let (addr, map) = &seen[0];
        for (a, m) in &seen {
            assert_eq!(a, addr);
            assert_eq!(m, map);
        }
        assert_eq!(map.get("name"), Some(&MValue::from("Konrad")));
    }

    #[test]
    fn test_optional_and_nested_fields() {
        let record = MTuple::from_call(Shipment::Dispatched {
            order: 9,
            carrier: None,
            weight: 2.5,
            tags: vec!["fragile".into(), "express".into()],
        })
        .unwrap();

        assert_eq!(record.get("carrier"), Some(&MValue::Null));
        assert_eq!(record.get_as::<Option<String>>("carrier"), Some(None));
        assert_eq!(record.get_as::<f64>("weight"), Some(2.5));
        assert_eq!(
            record.get_as::<Vec<String>>("tags"),
            Some(vec!["fragile".to_string(), "express".to_string()])
        );

        let call = record.to_call().unwrap();
        assert_eq!(
            call,
            Shipment::Dispatched {
                order: 9,
                carrier: None,
                weight: 2.5,
                tags: vec!["fragile".into(), "express".into()],
            }
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Builder
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_last_call_wins() {
        let record = MTuple::<Message>::build(|m| {
            m.call(Message::ItemCreated {
                id: "1".into(),
                name: "first".into(),
            });
            m.call(Message::ItemDeleted { id: "2".into() });
        })
        .unwrap()
        .unwrap();

        assert_eq!(record.operation_name(), "ItemDeleted");
        assert_eq!(record.args(), &[MValue::from("2")]);
        assert!(record.get("name").is_none());
    }

    #[test]
    fn test_strict_policy_rejects_repeated_calls() {
        let result = MTupleBuilder::<Message>::with_config(CaptureConfig::strict()).build(|m| {
            m.call(Message::ItemCreated {
                id: "1".into(),
                name: "first".into(),
            });
            m.call(Message::ItemDeleted { id: "1".into() });
            m.call(Message::ItemDeleted { id: "2".into() });
        });

        match result {
            Err(MTupleError::RepeatedCapture {
                contract,
                first,
                second,
            }) => {
                assert_eq!(contract, "Message");
                assert_eq!(first, "ItemCreated");
                assert_eq!(second, "ItemDeleted");
            }
            other => panic!("expected RepeatedCapture, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_policy_accepts_single_call() {
        let record = MTupleBuilder::<Message>::with_config(CaptureConfig::strict())
            .build(|m| m.call(Message::ItemDeleted { id: "5".into() }))
            .unwrap();

        assert!(record.is_some());
    }

    #[test]
    fn test_no_call_builds_nothing() {
        let record = MTuple::<Person>::build(|_| {}).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_replay_onto_builder_copies_record() {
        let original = person("Lotte", 31);
        let mut builder = MTupleBuilder::<Person>::new();
        original.accept(&mut builder).unwrap();

        let copy = builder.build(|_| {}).unwrap().unwrap();
        assert_eq!(original, copy);
    }

    #[test]
    fn test_invalid_contract_is_rejected() {
        let result = MTuple::<Broken>::build(|b| b.call(Broken::Twice { a: 1 }));

        match result {
            Err(MTupleError::Configuration { contract, reason }) => {
                assert_eq!(contract, "Broken");
                assert!(reason.contains("`a`"), "reason: {reason}");
            }
            other => panic!("expected Configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_capture_config_deserializes() {
        let strict: CaptureConfig = serde_json::from_str(r#"{"repeated_calls":"reject"}"#).unwrap();
        let default: CaptureConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(strict, CaptureConfig::strict());
        assert_eq!(default.repeated_calls, RepeatedCallPolicy::LastCallWins);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Replay and errors
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_accept_replays_onto_closure() {
        let record = person("Otto", 45);
        let mut seen = Vec::new();
        record.accept(&mut |p: Person| seen.push(p)).unwrap();

        assert_eq!(
            seen,
            vec![Person::With {
                name: "Otto".into(),
                age: 45
            }]
        );
    }

    #[test]
    fn test_receiver_failure_is_replay_error() {
        let record = person("Paul", 12);
        let err = record.accept(&mut Rejecting).unwrap_err();

        match err {
            MTupleError::MethodSending(MethodSendingError::Replay {
                operation, source, ..
            }) => {
                assert_eq!(operation, "With");
                assert_eq!(source.to_string(), "too young");
            }
            other => panic!("expected Replay, got {:?}", other),
        }
    }

    #[test]
    fn test_unbindable_args_are_access_error() {
        let sig = signature_of::<Person>("With").unwrap();
        let err = MTuple::<Person>::over(sig, vec![MValue::from(41i64), MValue::from("Theodor")])
            .unwrap_err();

        match err {
            MTupleError::MethodSending(MethodSendingError::Access { source, .. }) => {
                assert_eq!(
                    source,
                    BindError::TypeMismatch {
                        parameter: "name".into(),
                        expected: ValueKind::Str,
                        actual: ValueKind::I64,
                    }
                );
            }
            other => panic!("expected Access, got {:?}", other),
        }
    }

    #[test]
    fn test_over_map_missing_required_field_is_access_error() {
        let sig = signature_of::<Person>("With").unwrap();
        let mut fields = FieldMap::default();
        fields.insert("name".into(), MValue::from("Rosa"));

        let err = MTuple::<Person>::over_map(sig, &fields).unwrap_err();
        assert!(matches!(
            err,
            MTupleError::MethodSending(MethodSendingError::Access {
                source: BindError::TypeMismatch { actual: ValueKind::Null, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_lost_variant_is_unsupported() {
        let record = MTuple::<Legacy>::build(|l| l.call(Legacy::Ping)).unwrap().unwrap();
        let err = record.accept(&mut |_: Legacy| {}).unwrap_err();

        assert!(matches!(
            err,
            MTupleError::UnsupportedOperation { ref operation, .. } if operation == "Ping"
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Positional and name-indexed construction
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_over_matches_built_record() {
        let sig = signature_of::<Person>("With").unwrap();
        let built = person("Rosa", 39);
        let over =
            MTuple::<Person>::over(sig, vec![MValue::from("Rosa"), MValue::from(39i64)]).unwrap();

        assert_eq!(built, over);
    }

    #[test]
    fn test_over_rejects_foreign_signature() {
        let foreign = signature_of::<Message>("ItemDeleted").unwrap();
        let err = MTuple::<Person>::over(foreign, vec![MValue::from("1")]).unwrap_err();

        assert!(matches!(err, MTupleError::UnsupportedOperation { .. }));
        assert!(matches!(
            signature_of::<Person>("without"),
            Err(MTupleError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_over_rejects_wrong_arity() {
        let sig = signature_of::<Person>("With").unwrap();
        let err = MTuple::<Person>::over(sig, vec![MValue::from("Rosa")]).unwrap_err();

        assert!(matches!(
            err,
            MTupleError::Arity {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_over_map_fills_missing_with_null() {
        let sig = signature_of::<Shipment>("Dispatched").unwrap();
        let mut fields = FieldMap::default();
        fields.insert("order".into(), MValue::from(3u64));
        fields.insert("weight".into(), MValue::from(1.0));
        fields.insert("tags".into(), MValue::Array(vec![]));
        fields.insert("ignored".into(), MValue::from(true));

        let record = MTuple::<Shipment>::over_map(sig, &fields).unwrap();
        assert_eq!(record.get("carrier"), Some(&MValue::Null));
        assert!(record.get("ignored").is_none());
        assert_eq!(record.extract(shipment_order).unwrap(), Some(3));
    }

    #[test]
    fn test_over_stores_declared_types() {
        let sig = signature_of::<Shipment>("Dispatched").unwrap();
        let over = MTuple::<Shipment>::over(
            sig,
            vec![
                MValue::from(4i64),
                MValue::Null,
                MValue::from(2i64),
                MValue::Array(vec![]),
            ],
        )
        .unwrap();
        let built = MTuple::from_call(Shipment::Dispatched {
            order: 4,
            carrier: None,
            weight: 2.0,
            tags: vec![],
        })
        .unwrap();

        assert_eq!(over.args()[0], MValue::Number(MNumber::U64(4)));
        assert_eq!(over.args()[2], MValue::Number(MNumber::F64(2.0)));
        assert_eq!(over, built);
        assert_eq!(hash_of(&over), hash_of(&built));
    }

    #[test]
    fn test_json_fields_rebuild_equal_record() {
        let original = MTuple::from_call(Shipment::Held {
            order: 3,
            reason: MValue::Null,
        })
        .unwrap();

        let json = serde_json::to_value(&original).unwrap();
        let fields: FieldMap = json["fields"]
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.as_str().into(), MValue::from(v.clone())))
            .collect();
        assert_eq!(fields.get("order"), Some(&MValue::from(3i64)));

        let rebuilt = MTuple::<Shipment>::over_map(original.signature(), &fields).unwrap();
        assert_eq!(original, rebuilt);
        assert_eq!(hash_of(&original), hash_of(&rebuilt));
        assert_eq!(original.fingerprint(), rebuilt.fingerprint());
    }

    #[test]
    fn test_over_map_round_trips_to_map() {
        let record = person("Herbert", 23);
        let rebuilt = MTuple::<Person>::over_map(record.signature(), record.to_map()).unwrap();

        assert_eq!(record, rebuilt);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rendering and serialization
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_display() {
        assert_eq!(person("Theodor", 41).to_string(), "Person.With{name=Theodor, age=41}");

        let held = MTuple::from_call(Shipment::Held {
            order: 2,
            reason: crate::mobj!({ "code" => 17i64, "detail" => { "by" => "customs" } }),
        })
        .unwrap();
        assert_eq!(
            held.to_string(),
            "Shipment.Held{order=2, reason={code=17, detail={by=customs}}}"
        );
        assert_eq!(MTuple::from_call(Shipment::Cancelled {}).unwrap().to_string(), "Shipment.Cancelled{}");
    }

    #[test]
    fn test_signature_display() {
        let sig = signature_of::<Message>("ItemCreated").unwrap();
        assert_eq!(sig.to_string(), "Message.ItemCreated(id: string, name: string)");
    }

    #[test]
    fn test_serialize_json() {
        let json = serde_json::to_value(person("Theodor", 41)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "contract": "Person",
                "operation": "With",
                "fields": { "name": "Theodor", "age": 41 }
            })
        );
    }

    #[test]
    fn test_mvalue_json_round_trip() {
        let json = r#"{"a":[1,2.5,null,"x"],"b":{"c":true}}"#;
        let value: MValue = serde_json::from_str(json).unwrap();

        let expected = crate::mobj!({
            "a" => (MValue::Array(vec![
                MValue::from(1i64),
                MValue::from(2.5),
                MValue::Null,
                MValue::from("x"),
            ])),
            "b" => { "c" => true }
        });
        assert_eq!(value, expected);
        assert_eq!(MValue::from(serde_json::Value::from(value.clone())), value);
    }

    #[test]
    fn test_float_to_integer_bounds() {
        let two_pow_63 = 9_223_372_036_854_775_808.0;
        let two_pow_64 = 18_446_744_073_709_551_616.0;

        assert_eq!(MNumber::F64(two_pow_63).as_i64(), None);
        assert_eq!(MNumber::F64(-two_pow_63).as_i64(), Some(i64::MIN));
        assert_eq!(MNumber::F64(two_pow_64).as_u64(), None);
        assert_eq!(MNumber::F64(two_pow_63).as_u64(), Some(1u64 << 63));
        assert_eq!(MNumber::F64(1.5).as_i64(), None);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Properties
    // ═══════════════════════════════════════════════════════════════════════

    proptest! {
        #[test]
        fn prop_extract_returns_captured_value(name in ".*", age in any::<i64>()) {
            let record = person(&name, age);
            prop_assert_eq!(record.extract(person_name).unwrap(), Some(name.clone()));
            prop_assert_eq!(record.extract(person_age).unwrap(), Some(age));
        }

        #[test]
        fn prop_structural_equality(name in "[a-z]{0,12}", age in any::<i64>(), delta in 1i64..1000) {
            let a = person(&name, age);
            let b = person(&name, age);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(hash_of(&a), hash_of(&b));

            let older = person(&name, age.wrapping_add(delta));
            prop_assert_ne!(&a, &older);
            let renamed = person(&format!("{name}!"), age);
            prop_assert_ne!(&a, &renamed);
        }

        #[test]
        fn prop_get_matches_positional_arg(id in "[0-9]{1,6}", name in ".*") {
            let record = MTuple::from_call(Message::ItemCreated { id: id.clone(), name: name.clone() }).unwrap();
            for (i, p) in record.signature().parameters().iter().enumerate() {
                prop_assert_eq!(record.get(p.name()), Some(&record.args()[i]));
            }
            prop_assert_eq!(record.to_map(), record.to_map());
        }

        #[test]
        fn prop_cross_variant_id(id in ".*", name in ".*", created in any::<bool>()) {
            let call = if created {
                Message::ItemCreated { id: id.clone(), name }
            } else {
                Message::ItemDeleted { id: id.clone() }
            };
            let record = MTuple::from_call(call).unwrap();
            prop_assert_eq!(record.extract(message_id).unwrap(), Some(id));
        }
    }
}
