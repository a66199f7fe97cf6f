use anyhow::Result;
use http_client_manager::core::SavedRequestStore;
use http_client_manager::{ManagerError, SavedRequest, Settings};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn site(dir: &TempDir, base_url: &str) -> Result<Settings> {
    let module = dir.path().join("modules/placeholder");
    std::fs::create_dir_all(&module)?;
    std::fs::write(
        module.join("placeholder.http_services_api.yml"),
        format!(
            r#"
placeholder:
  title: Placeholder
  api_path: placeholder.yml
  config:
    base_uri: "{}"
"#,
            base_url
        ),
    )?;
    std::fs::write(
        module.join("placeholder.yml"),
        r#"
operations:
  CreatePost:
    httpMethod: POST
    uri: /posts
    parameters:
      title: {type: string, required: true}
      userId: {type: integer}
      tags: {type: array}
"#,
    )?;

    let settings = Settings::from_toml_str(&format!(
        r#"
root = "{}"

[[providers]]
name = "placeholder"
path = "modules/placeholder"
"#,
        dir.path().display().to_string().replace('\\', "/")
    ))?;
    Ok(settings)
}

#[tokio::test]
async fn test_saved_request_replays_with_typed_parameters() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/posts")
            .json_body(json!({"title": "Saved", "userId": 5, "tags": ["x", "y"]}));
        then.status(201).json_body(json!({"id": 101}));
    });

    let temp_dir = TempDir::new()?;
    let settings = site(&temp_dir, &server.base_url())?;
    let store = settings.request_store();
    let dispatcher = settings.dispatcher();

    let request = SavedRequest::new("create_saved_post", "Create a post", "placeholder", "CreatePost")
        .with_parameter("title", "Saved")
        .with_parameter("userId", "5")
        .with_parameter("tags", "x\ny");
    store.save(&request).await?;

    assert!(temp_dir
        .path()
        .join("config/http_config_request/http_config_request.create_saved_post.yml")
        .exists());

    let result = dispatcher.execute_stored(&store, "create_saved_post").await?;
    mock.assert();
    assert_eq!(result.status, 201);
    assert_eq!(result.get("id"), Some(&json!(101)));

    let loaded = store.load("create_saved_post").await?.expect("request was saved");
    let again = loaded.execute(&dispatcher).await?;
    assert_eq!(again.status, 201);
    mock.assert_hits(2);
    Ok(())
}

#[tokio::test]
async fn test_missing_saved_request() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = site(&temp_dir, "http://127.0.0.1:9")?;

    let err = settings
        .dispatcher()
        .execute_stored(&settings.request_store(), "never_saved")
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::SavedRequestNotFound { .. }));
    assert_eq!(err.exit_code(), 4);
    Ok(())
}

#[tokio::test]
async fn test_saved_request_for_removed_operation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = site(&temp_dir, "http://127.0.0.1:9")?;
    let store = settings.request_store();

    store
        .save(&SavedRequest::new("stale", "Stale", "placeholder", "DeletePost"))
        .await?;
    let err = settings
        .dispatcher()
        .execute_stored(&store, "stale")
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::OperationNotFound { .. }));
    assert_eq!(store.list().await?.len(), 1);
    assert!(store.delete("stale").await?);
    assert!(store.list().await?.is_empty());
    Ok(())
}
