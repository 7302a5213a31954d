// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability

//! Array and sequence members, through JSON and through indexed field paths.

mod common;

use common::{endpoints, open, write_and_take, PROFILE};
use dds_connector::{Connector, Error, LoopbackApi};

/// Inline configuration whose type holds `id` plus one extra `member`.
fn config_with_member(member: &str) -> String {
    format!(
        concat!(
            r#"str://"<dds><types><struct name="CollectionType">"#,
            r#"<member name="id" type="long" key="true"/>{}</struct></types>"#,
            r#"<domain_library name="MyDomainLibrary"><domain name="MyDomain" domain_id="0">"#,
            r#"<register_type name="CollectionType" type_ref="CollectionType"/>"#,
            r#"<topic name="CollectionTopic" register_type_ref="CollectionType"/></domain></domain_library>"#,
            r#"<domain_participant_library name="MyParticipantLibrary">"#,
            r#"<domain_participant name="Zero" domain_ref="MyDomainLibrary::MyDomain">"#,
            r#"<publisher name="MyPublisher"><data_writer name="MyWriter" topic_ref="CollectionTopic"/></publisher>"#,
            r#"<subscriber name="MySubscriber"><data_reader name="MyReader" topic_ref="CollectionTopic"/></subscriber>"#,
            r#"</domain_participant></domain_participant_library></dds>""#
        ),
        member
    )
}

#[test]
fn arrays_through_json() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "ArrayTest.xml");
    let (output, input) = endpoints(&connector);

    output
        .instance()
        .set_json(
            r#"{
                "id": 1,
                "int_array": [0, 10, 20, 30, 40, 50, 60, 70, 80, 90],
                "string_array": ["test1", "test2", "test3", "test4", "test5"],
                "data": "array_test"
            }"#,
        )
        .expect("set_json");
    output.write().expect("write");
    connector.wait(-1).expect("wait");
    input.take().expect("take");

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "id").expect("id"), 1);
    assert_eq!(samples.get_string(0, "data").expect("data"), "array_test");
    assert_eq!(samples.get_i32(0, "int_array[3]").expect("element"), 30);
    assert_eq!(samples.get_string(0, "string_array[4]").expect("element"), "test5");
    assert_eq!(samples.get_u32(0, "int_array#").expect("length"), 10);

    let json = samples.get_json(0).expect("json");
    assert!(json.contains("int_array"), "{}", json);
    let value = samples.get_value(0).expect("value");
    assert_eq!(value["int_array"].as_array().map(Vec::len), Some(10));
    assert_eq!(value["string_array"][0], "test1");
}

#[test]
fn short_json_array_keeps_remaining_defaults() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "ArrayTest.xml");
    let (output, input) = endpoints(&connector);

    output
        .instance()
        .set_json(r#"{"id": 2, "int_array": [100, 200, 300], "data": "json_array_test"}"#)
        .expect("set_json");
    write_and_take(&connector, &output, &input);

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "int_array[2]").expect("set"), 300);
    assert_eq!(samples.get_i32(0, "int_array[9]").expect("default"), 0);
    assert_eq!(samples.get_string(0, "string_array[0]").expect("default"), "");
}

#[test]
fn array_bounds_are_enforced() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "ArrayTest.xml");
    let (output, input) = endpoints(&connector);
    let instance = output.instance();

    assert!(instance
        .set_json(r#"{"int_array": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]}"#)
        .is_err());
    assert!(matches!(
        instance.set_number("int_array[10]", 1.0),
        Err(Error::FieldNotFound { .. })
    ));
    assert!(instance.set_number("int_array", 1.0).is_err());

    instance.set_number("int_array[9]", 9.0).expect("last element");
    instance.set_string("string_array[0]", "first").expect("string element");
    write_and_take(&connector, &output, &input);

    let samples = input.samples();
    assert_eq!(samples.get_i64(0, "int_array[9]").expect("element"), 9);
    assert_eq!(samples.get_string(0, "string_array[0]").expect("element"), "first");
    assert!(matches!(
        samples.get_i32(0, "int_array[10]"),
        Err(Error::FieldNotFound { .. })
    ));
}

#[test]
fn sequences_through_json() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "SequenceTest.xml");
    let (output, input) = endpoints(&connector);

    output
        .instance()
        .set_json(
            r#"{
                "id": 1,
                "int_sequence": [10, 20, 30, 40, 50],
                "string_sequence": ["hello", "world", "test"],
                "data": "sequence_test"
            }"#,
        )
        .expect("set_json");
    output.write().expect("write");
    connector.wait(-1).expect("wait");
    input.take().expect("take");

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "id").expect("id"), 1);
    assert_eq!(samples.get_i32(0, "int_sequence#").expect("length"), 5);
    assert_eq!(samples.get_i32(0, "string_sequence#").expect("length"), 3);
    assert_eq!(samples.get_i32(0, "int_sequence[4]").expect("element"), 50);
    assert_eq!(
        samples.get_string(0, "string_sequence[1]").expect("element"),
        "world"
    );
    assert!(samples
        .get_json(0)
        .expect("json")
        .contains("sequence_test"));
}

#[test]
fn sequences_grow_when_elements_are_set() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "SequenceTest.xml");
    let (output, input) = endpoints(&connector);
    let instance = output.instance();

    instance.set_number("int_sequence[2]", 7.0).expect("grow");
    assert!(instance.set_number("int_sequence[10]", 1.0).is_err());
    assert!(instance
        .set_json(r#"{"int_sequence": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]}"#)
        .is_err());
    write_and_take(&connector, &output, &input);

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "int_sequence#").expect("length"), 3);
    assert_eq!(samples.get_i32(0, "int_sequence[0]").expect("filled"), 0);
    assert_eq!(samples.get_i32(0, "int_sequence[2]").expect("set"), 7);
    assert_eq!(samples.get_i32(0, "string_sequence#").expect("empty"), 0);
}

#[test]
fn set_json_replaces_the_whole_record() {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "SequenceTest.xml");
    let (output, input) = endpoints(&connector);

    output
        .instance()
        .set_json(r#"{"id": 3, "int_sequence": [1, 2, 3]}"#)
        .expect("first");
    output.instance().set_json(r#"{"data": "second"}"#).expect("second");
    write_and_take(&connector, &output, &input);

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "id").expect("id"), 0);
    assert_eq!(samples.get_i32(0, "int_sequence#").expect("length"), 0);
    assert_eq!(samples.get_string(0, "data").expect("data"), "second");
}

#[test]
fn oversized_array_dimensions_are_a_config_error() {
    for dims in ["4611686018427387904", "4294967296,4294967296", "1048576"] {
        let config = config_with_member(&format!(
            r#"<member name="big" type="long" arrayDimensions="{}"/>"#,
            dims
        ));
        match Connector::with_api(LoopbackApi::shared(), PROFILE, &config) {
            Err(Error::Config(message)) => {
                assert!(message.contains("arrayDimensions"), "{}", message)
            }
            other => panic!("expected a config error for {}, got {:?}", dims, other.err()),
        }
    }
}

#[test]
fn unbounded_sequence_growth_is_limited() {
    let config = config_with_member(r#"<member name="free" type="long" sequenceMaxLength="-1"/>"#);
    let connector = Connector::with_api(LoopbackApi::shared(), PROFILE, &config).expect("open");
    let (output, input) = endpoints(&connector);
    let instance = output.instance();

    instance.set_number("free[99]", 1.0).expect("modest growth");
    assert!(matches!(
        instance.set_number("free[5000000]", 1.0),
        Err(Error::FieldNotFound { .. })
    ));
    write_and_take(&connector, &output, &input);

    let samples = input.samples();
    assert_eq!(samples.get_i32(0, "free#").expect("length"), 100);
    assert_eq!(samples.get_i32(0, "free[99]").expect("element"), 1);
}
