// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_codes_serialize_snake_case() {
    let response = Response::error(ErrorCode::FailedPrecondition, "job is running");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "Error");
    assert_eq!(json["code"], "failed_precondition");
    assert_eq!(json["message"], "job is running");
}

#[test]
fn error_code_display_matches_wire() {
    assert_eq!(ErrorCode::NotFound.to_string(), "not_found");
    assert_eq!(ErrorCode::Canceled.to_string(), "canceled");
}

#[test]
fn job_started_round_trips() {
    let response = Response::JobStarted {
        uuid: "u-1".into(),
        status: JobStatus::Scheduled,
        scheduled_at_ms: Some(123),
        started_at_ms: None,
    };
    let encoded = serde_json::to_string(&response).unwrap();
    let decoded: Response = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn log_chunk_frame_round_trips() {
    let response = Response::LogChunk { bytes: b"output\n".to_vec() };
    let encoded = serde_json::to_string(&response).unwrap();
    let decoded: Response = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn stream_end_is_bare() {
    let json = serde_json::to_value(&Response::StreamEnd).unwrap();
    assert_eq!(json, serde_json::json!({"type": "StreamEnd"}));
}

#[test]
fn full_job_record_embeds() {
    let job = jl_core::Job::builder().name("detail").build();
    let response = Response::Job { job: Box::new(job.clone()) };
    let encoded = serde_json::to_string(&response).unwrap();
    match serde_json::from_str::<Response>(&encoded).unwrap() {
        Response::Job { job: decoded } => assert_eq!(decoded.uuid, job.uuid),
        other => panic!("unexpected response {:?}", other),
    }
}
