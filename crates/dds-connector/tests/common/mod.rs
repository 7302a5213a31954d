// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use dds_connector::{Connector, Input, LoopbackApi, Output};

pub const PROFILE: &str = "MyParticipantLibrary::Zero";
pub const WRITER: &str = "MyPublisher::MyWriter";
pub const READER: &str = "MySubscriber::MyReader";

/// Absolute path of a fixture under `tests/xml`.
pub fn xml_path(file: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("xml")
        .join(file)
        .to_string_lossy()
        .into_owned()
}

pub fn open(api: &Arc<LoopbackApi>, profile: &str, file: &str) -> Connector {
    Connector::with_api(api.clone(), profile, &xml_path(file)).expect("open connector")
}

/// Fresh loopback plus a connector on `Test.xml`.
pub fn test_connector() -> (Arc<LoopbackApi>, Connector) {
    let api = LoopbackApi::shared();
    let connector = open(&api, PROFILE, "Test.xml");
    (api, connector)
}

pub fn endpoints(connector: &Connector) -> (Output, Input) {
    let output = connector.get_output(WRITER).expect("output");
    let input = connector.get_input(READER).expect("input");
    (output, input)
}

/// Write the staging record and take it back on `input`.
pub fn write_and_take(connector: &Connector, output: &Output, input: &Input) {
    output.write().expect("write");
    connector.wait(1000).expect("wait for data");
    input.take().expect("take");
}
