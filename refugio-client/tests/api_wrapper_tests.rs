//! Integration tests for the per-entity REST wrappers.

use refugio_client::{ClientError, RequestBody};
use refugio_core::{
    AnswerDraft, ApiErrorKind, DoubtId, ExperienceDraft, MediaId, RefugeId, RefugeQuery,
    RenovationDraft, RenovationId, UploadFile, UserId, UserUpdate,
};
use refugio_test_utils::assertions::{assert_api_status, assert_transport_error};
use refugio_test_utils::fixtures::*;
use refugio_test_utils::{scripted_api, ScriptedIdentityProvider, ScriptedTransport, TEST_BASE_URL};
use reqwest::Method;
use serde_json::json;

fn photo(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF],
    }
}

#[tokio::test]
async fn test_refuge_reads_are_public() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(200, json!([refuge_json("r1", "Amitges")]));
    transport.push(200, refuge_json("r1", "Amitges"));

    let api = scripted_api(&transport, &identity);
    let query = RefugeQuery {
        name: Some("Ami".into()),
        region: None,
        page: Some(2),
    };
    let refuges = api.list_refuges(&query).await.unwrap();
    assert_eq!(refuges.len(), 1);
    let refuge = api.get_refuge(&RefugeId::new("r1")).await.unwrap();
    assert_eq!(refuge.map(|r| r.name), Some("Amitges".to_string()));

    let requests = transport.requests();
    assert_eq!(requests[0].url, format!("{TEST_BASE_URL}/refuges/"));
    assert_eq!(
        requests[0].query,
        vec![("name".to_string(), "Ami".to_string()), ("page".to_string(), "2".to_string())]
    );
    assert!(requests.iter().all(|request| request.bearer_token().is_none()));
    assert_eq!(identity.cached_calls(), 0);
}

#[tokio::test]
async fn test_missing_entities_read_as_none() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(404, error_json("Refuge not found"));
    transport.push(404, error_json("User not found"));

    let api = scripted_api(&transport, &identity);
    assert_eq!(api.get_refuge(&RefugeId::new("nope")).await.unwrap(), None);
    assert_eq!(api.get_user(&UserId::new("nope")).await.unwrap(), None);
}

#[tokio::test]
async fn test_list_404_is_an_error() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(404, error_json("Refuge not found"));

    let api = scripted_api(&transport, &identity);
    let result = api.list_refuge_media(&RefugeId::new("nope")).await;
    assert_api_status(&result, 404);
}

#[tokio::test]
async fn test_favourite_add_uses_user_scoped_path() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(200, json!(["r1", "r2", "r9"]));

    let api = scripted_api(&transport, &identity);
    let favourites = api
        .add_favourite_refuge(&UserId::new("u1"), &RefugeId::new("r9"))
        .await
        .unwrap();
    assert_eq!(favourites.len(), 3);

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, format!("{TEST_BASE_URL}/users/u1/favorite-refuges/r9/"));
    assert_eq!(request.bearer_token(), Some("tok-0"));
}

#[tokio::test]
async fn test_validation_details_surface_verbatim() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(
        400,
        json!({ "error": "Invalid data", "details": { "username": ["too short"] } }),
    );

    let api = scripted_api(&transport, &identity);
    let update = UserUpdate {
        username: Some("x".into()),
        ..UserUpdate::default()
    };
    let err = api
        .update_user(&UserId::new("u1"), &update)
        .await
        .unwrap_err();
    let details = err.api_error().and_then(|e| e.validation_details()).cloned();
    assert_eq!(
        details.and_then(|d| d.get("username").cloned()),
        Some(vec!["too short".to_string()])
    );
    assert_eq!(
        transport.requests()[0].body,
        Some(RequestBody::Json(json!({ "username": "x" })))
    );
}

#[tokio::test]
async fn test_renovation_overlap_carries_conflicting_entity() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(
        409,
        json!({
            "error": "Overlapping renovation",
            "conflict": renovation_json("v7", "r1", "u2", &["u2"]),
        }),
    );

    let api = scripted_api(&transport, &identity);
    let draft = RenovationDraft {
        refuge_id: RefugeId::new("r1"),
        ini_date: chrono::NaiveDate::from_ymd_opt(2026, 7, 2).unwrap(),
        fin_date: chrono::NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
        description: "Paint".into(),
        materials_needed: None,
        group_link: None,
    };
    let err = api.create_renovation(&draft).await.unwrap_err();
    let api_error = err.api_error().unwrap();
    assert!(matches!(api_error.kind, ApiErrorKind::Conflict { .. }));
    assert_eq!(api_error.conflicting().unwrap()["id"], json!("v7"));
}

#[tokio::test]
async fn test_forbidden_and_server_errors_use_fixed_messages() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(403, error_json("You are not the creator of renovation v1"));
    transport.push(502, error_json("upstream exploded"));

    let api = scripted_api(&transport, &identity);
    let forbidden = api.delete_renovation(&RenovationId::new("v1")).await;
    assert_api_status(&forbidden, 403);
    assert_eq!(
        forbidden.unwrap_err().api_error().unwrap().message,
        refugio_core::FORBIDDEN_MESSAGE
    );

    let server = api.list_renovations().await;
    assert_api_status(&server, 502);
    assert_eq!(
        server.unwrap_err().api_error().unwrap().message,
        refugio_core::SERVER_ERROR_MESSAGE
    );
}

#[tokio::test]
async fn test_media_upload_is_multipart() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(201, json!({ "uploaded": [media_json("m1", "r1", "u1", None)] }));

    let api = scripted_api(&transport, &identity);
    let uploaded = api
        .upload_refuge_media(&RefugeId::new("r1"), &[photo("a.jpg")])
        .await
        .unwrap();
    assert_eq!(uploaded.uploaded[0].key, MediaId::new("m1"));

    match &transport.requests()[0].body {
        Some(RequestBody::Multipart(fields)) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].name(), "files");
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_experience_create_sends_comment_and_files() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(201, experience_json("e1", "r1", "u1", &["m1", "m2"]));

    let api = scripted_api(&transport, &identity);
    let draft = ExperienceDraft {
        comment: Some("Sunny".into()),
        files: vec![photo("a.jpg"), photo("b.jpg")],
    };
    let experience = api
        .create_experience(&RefugeId::new("r1"), &draft)
        .await
        .unwrap();
    assert_eq!(experience.media_ids.len(), 2);

    match &transport.requests()[0].body {
        Some(RequestBody::Multipart(fields)) => {
            let names: Vec<_> = fields.iter().map(|field| field.name()).collect();
            assert_eq!(names, vec!["comment", "files", "files"]);
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push_empty(204);
    transport.push_empty(204);

    let api = scripted_api(&transport, &identity);
    api.delete_refuge_media(&RefugeId::new("r1"), &MediaId::new("m1"))
        .await
        .unwrap();
    api.delete_doubt(&DoubtId::new("d1")).await.unwrap();

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            format!("{TEST_BASE_URL}/refuges/r1/media/m1/"),
            format!("{TEST_BASE_URL}/doubts/d1/"),
        ]
    );
}

#[tokio::test]
async fn test_answer_create_posts_to_doubt() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(201, answer_json("a1", "d1", "u1"));

    let api = scripted_api(&transport, &identity);
    let draft = AnswerDraft {
        message: "Yes".into(),
        parent_answer_id: None,
    };
    let answer = api.create_answer(&DoubtId::new("d1"), &draft).await.unwrap();
    assert_eq!(answer.doubt_id, DoubtId::new("d1"));
    assert_eq!(
        transport.requests()[0].url,
        format!("{TEST_BASE_URL}/doubts/d1/answers/")
    );
}

#[tokio::test]
async fn test_undecodable_success_body_is_decode_error() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");
    transport.push(200, json!({ "unexpected": "shape" }));

    let api = scripted_api(&transport, &identity);
    let result = api.join_renovation(&RenovationId::new("v1")).await;
    assert!(matches!(result, Err(ClientError::Decode(_))));
}

#[tokio::test]
async fn test_transport_failure_surfaces_as_client_error() {
    let transport = ScriptedTransport::new();
    let identity = ScriptedIdentityProvider::new("tok-0");

    let api = scripted_api(&transport, &identity);
    let result = api.list_user_media(&UserId::new("u1")).await;
    assert_transport_error(&result);
}
