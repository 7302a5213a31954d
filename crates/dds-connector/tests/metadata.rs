// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability
#![allow(clippy::unreadable_literal)] // Large test constants

//! Sample metadata, write parameters, request/reply correlation and
//! endpoint matching.

mod common;

use common::{endpoints, open, test_connector, write_and_take};
use dds_connector::{
    Error, Identity, InstanceState, LoopbackApi, MatchedEndpoint, SampleState, ViewState,
    WriteParams,
};

#[test]
fn sample_and_view_states_follow_reads() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    output.instance().set("st", "state_test").expect("st");
    output.write().expect("write");

    input.read().expect("first read");
    let infos = input.infos();
    assert_eq!(infos.len().expect("len"), 1);
    assert!(infos.is_valid(0).expect("valid"));
    assert_eq!(infos.sample_state(0).expect("sample state"), SampleState::NotRead);
    assert_eq!(infos.view_state(0).expect("view state"), ViewState::New);
    assert_eq!(infos.instance_state(0).expect("instance state"), InstanceState::Alive);

    input.read().expect("second read");
    assert_eq!(infos.sample_state(0).expect("sample state"), SampleState::Read);
    assert_eq!(infos.view_state(0).expect("view state"), ViewState::NotNew);
}

#[test]
fn identities_carry_writer_guid_and_sequence() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    output.instance().set("st", "identity_test").expect("st");
    output.write().expect("write");
    output.write().expect("write");
    connector.wait(1000).expect("wait");
    input.take().expect("take");

    let infos = input.infos();
    let first = infos.identity(0).expect("first identity");
    let second = infos.identity(1).expect("second identity");
    assert!(!first.is_unknown());
    assert_eq!(first.writer_guid, second.writer_guid);
    assert_eq!(second.sequence_number, first.sequence_number + 1);

    let json = infos.identity_json(0).expect("identity json");
    assert!(json.contains("writer_guid"), "{}", json);
    assert_eq!(Identity::from_json(&json).expect("parse"), first);

    // Nothing was related to these samples.
    assert!(infos.related_identity(0).expect("related").is_unknown());
}

#[test]
fn write_params_set_identity_and_timestamp() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    let identity = Identity::new([7; 16], 42);
    let params = WriteParams::new()
        .with_source_timestamp(1_234_567_890_000_000_000)
        .with_identity(identity);

    output.instance().set("st", "timestamp_test").expect("st");
    output.write_with_params(&params).expect("write with params");
    connector.wait(1000).expect("wait");
    input.take().expect("take");

    let infos = input.infos();
    assert_eq!(
        infos.source_timestamp(0).expect("source timestamp"),
        1_234_567_890_000_000_000
    );
    assert!(infos.reception_timestamp(0).expect("reception timestamp") > 0);
    assert_eq!(infos.identity(0).expect("identity"), identity);
}

#[test]
fn default_source_timestamp_is_current_time() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    output.instance().set("st", "now").expect("st");
    write_and_take(&connector, &output, &input);

    let infos = input.infos();
    let source = infos.source_timestamp(0).expect("source");
    let reception = infos.reception_timestamp(0).expect("reception");
    assert!(source > 0);
    assert!(reception >= source);
}

#[test]
fn dispose_and_unregister_produce_invalid_samples() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    output.instance().set("st", "test_dispose").expect("st");
    output.instance().set("l", 12_i32).expect("l");
    output.write().expect("write");
    output.write_with_params(&WriteParams::dispose()).expect("dispose");
    output
        .write_with_params_json(r#"{"action":"unregister"}"#)
        .expect("unregister");
    connector.wait(1000).expect("wait");
    input.take().expect("take");

    let infos = input.infos();
    assert_eq!(infos.len().expect("len"), 3);
    assert!(infos.is_valid(0).expect("valid"));
    assert!(!infos.is_valid(1).expect("disposed"));
    assert!(!infos.is_valid(2).expect("unregistered"));
    assert_eq!(
        infos.instance_state(1).expect("state"),
        InstanceState::NotAliveDisposed
    );
    assert_eq!(
        infos.instance_state(2).expect("state"),
        InstanceState::NotAliveNoWriters
    );

    // Invalid samples only carry the key.
    let samples = input.samples();
    assert_eq!(samples.get_string(1, "st").expect("key"), "test_dispose");
    assert_eq!(samples.get_i32(1, "l").expect("non-key"), 0);
}

#[test]
fn malformed_write_params_are_rejected() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    match output.write_with_params_json("not json") {
        Err(Error::Native { code, message }) => {
            assert_eq!(code, 3);
            assert!(message.contains("write parameters"), "{}", message);
        }
        other => panic!("expected a native error, got {:?}", other),
    }
    assert!(input.take().unwrap_err().is_no_data());
}

#[test]
fn info_indices_are_validated() {
    let (_api, connector) = test_connector();
    let (output, input) = endpoints(&connector);
    output.instance().set("st", "test").expect("st");
    write_and_take(&connector, &output, &input);

    let infos = input.infos();
    assert!(matches!(infos.is_valid(-1), Err(Error::InvalidArgument(_))));
    assert!(matches!(infos.identity(5), Err(Error::InvalidArgument(_))));
    assert!(matches!(infos.view_state(-3_i64), Err(Error::InvalidArgument(_))));
    assert!(!infos.is_empty().expect("not empty"));
}

#[test]
fn request_reply_correlates_with_related_identity() {
    let api = LoopbackApi::shared();
    let requester = open(&api, "MyParticipantLibrary::Requester", "RequestReplyTest.xml");
    let replier = open(&api, "MyParticipantLibrary::Replier", "RequestReplyTest.xml");

    let request_writer = requester
        .get_output("RequestPublisher::RequestWriter")
        .expect("request writer");
    let reply_reader = requester
        .get_input("ReplySubscriber::ReplyReader")
        .expect("reply reader");
    let request_reader = replier
        .get_input("RequestSubscriber::RequestReader")
        .expect("request reader");
    let reply_writer = replier
        .get_output("ReplyPublisher::ReplyWriter")
        .expect("reply writer");

    let request_identity = Identity::new(
        [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        42,
    );
    request_writer.instance().set("request_id", 1_i32).expect("id");
    request_writer
        .instance()
        .set("request_data", "test_request")
        .expect("data");
    request_writer
        .write_with_params_json(&format!(
            r#"{{"identity":{}}}"#,
            request_identity.to_json().expect("identity json")
        ))
        .expect("request");

    replier.wait(2000).expect("request arrives");
    request_reader.take().expect("take request");
    assert_eq!(request_reader.samples().len().expect("len"), 1);
    assert_eq!(
        request_reader.samples().get_i32(0, "request_id").expect("id"),
        1
    );
    assert_eq!(
        request_reader
            .samples()
            .get_string(0, "request_data")
            .expect("data"),
        "test_request"
    );
    let received = request_reader.infos().identity(0).expect("request identity");
    assert_eq!(received, request_identity);

    reply_writer.instance().set("reply_id", 1_i32).expect("id");
    reply_writer
        .instance()
        .set("reply_data", "test_reply")
        .expect("data");
    reply_writer
        .write_with_params(&WriteParams::new().with_related_sample_identity(received))
        .expect("reply");

    requester.wait(2000).expect("reply arrives");
    reply_reader.take().expect("take reply");
    assert_eq!(
        reply_reader.samples().get_string(0, "reply_data").expect("data"),
        "test_reply"
    );
    let related = reply_reader.infos().related_identity(0).expect("related");
    assert_eq!(related, request_identity);
    let related_json = reply_reader
        .infos()
        .related_identity_json(0)
        .expect("related json");
    assert!(related_json.contains("42"), "{}", related_json);

    assert_eq!(api.outstanding_strings(), 0);
}

#[test]
fn matching_is_reported_as_deltas() {
    let api = LoopbackApi::shared();
    let requester = open(&api, "MyParticipantLibrary::Requester", "RequestReplyTest.xml");
    let request_writer = requester
        .get_output("RequestPublisher::RequestWriter")
        .expect("request writer");
    let reply_reader = requester
        .get_input("ReplySubscriber::ReplyReader")
        .expect("reply reader");

    assert!(request_writer
        .wait_for_subscriptions(5)
        .unwrap_err()
        .is_timeout());
    assert!(request_writer
        .matched_subscriptions()
        .expect("none yet")
        .is_empty());

    let replier = open(&api, "MyParticipantLibrary::Replier", "RequestReplyTest.xml");
    assert_eq!(request_writer.wait_for_subscriptions(1000).expect("match"), 1);
    assert_eq!(reply_reader.wait_for_publications(1000).expect("match"), 1);
    assert_eq!(
        request_writer.matched_subscriptions().expect("matched"),
        vec![MatchedEndpoint {
            name: Some("RequestSubscriber::RequestReader".into())
        }]
    );
    let json = reply_reader.matched_publications_json().expect("json");
    assert!(json.contains("ReplyPublisher::ReplyWriter"), "{}", json);

    replier.close().expect("close replier");
    assert_eq!(
        request_writer.wait_for_subscriptions(1000).expect("unmatch"),
        -1
    );
    assert!(request_writer
        .matched_subscriptions()
        .expect("matched")
        .is_empty());
    assert_eq!(api.outstanding_strings(), 0);
}
