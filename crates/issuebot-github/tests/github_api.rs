use issuebot_core::github::{GitHubReader, GitHubWriter, Mailer, StyledEmail};
use issuebot_core::BotError;
use issuebot_github::{GitHubClient, MailgunClient};
use mockito::Matcher;

fn comment_json(id: u64, login: &str, at: &str) -> String {
    format!(r#"{{"id":{id},"user":{{"login":"{login}","type":"User"}},"body":"c{id}","created_at":"{at}","html_url":"x"}}"#)
}

#[tokio::test]
async fn comments_are_paginated() {
    let mut server = mockito::Server::new_async().await;
    let page1 = format!(
        "[{},{}]",
        comment_json(1, "alice", "2024-01-01T00:00:00Z"),
        comment_json(2, "bob", "2024-01-02T00:00:00Z")
    );
    let page2 = format!("[{}]", comment_json(3, "alice", "2024-01-03T00:00:00Z"));
    let m1 = server
        .mock("GET", "/repos/acme/sdk/issues/7/comments")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .match_header("authorization", "Bearer t0ken")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page1)
        .create_async()
        .await;
    let m2 = server
        .mock("GET", "/repos/acme/sdk/issues/7/comments")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page2)
        .create_async()
        .await;

    let client = GitHubClient::with_base_url(server.url(), Some("t0ken".into()))
        .unwrap()
        .with_page_size(2);
    let comments = client.fetch_comments("acme", "sdk", 7).await.unwrap();
    assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(comments[1].author(), "bob");
    m1.assert_async().await;
    m2.assert_async().await;
}

#[tokio::test]
async fn open_issues_exclude_pull_requests() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"[
        {"number":1,"title":"Bug","body":null,"user":{"login":"alice"},"labels":[{"name":"stale","color":"fff"}],
         "state":"open","created_at":"2024-01-01T00:00:00Z"},
        {"number":2,"title":"PR","body":"x","user":{"login":"bob"},"labels":[],
         "state":"open","created_at":"2024-01-01T00:00:00Z","pull_request":{"url":"u"}}
    ]"#;
    server
        .mock("GET", "/repos/acme/sdk/issues")
        .match_query(Matcher::UrlEncoded("state".into(), "open".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = GitHubClient::with_base_url(server.url(), None).unwrap();
    let issues = client.fetch_open_issues("acme", "sdk").await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 1);
    assert_eq!(issues[0].labels[0].name, "stale");
}

#[tokio::test]
async fn template_fetch_maps_status_codes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/repos/acme/sdk/contents/.github/ISSUE_TEMPLATE.md")
        .match_header("accept", "application/vnd.github.raw+json")
        .with_status(200)
        .with_body("### [REQUIRED] Steps\n")
        .create_async()
        .await;
    server
        .mock("GET", "/repos/acme/missing/contents/ISSUE_TEMPLATE.md")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/repos/acme/private/contents/ISSUE_TEMPLATE.md")
        .with_status(403)
        .create_async()
        .await;

    let client = GitHubClient::with_base_url(server.url(), None).unwrap();
    let text = client
        .fetch_issue_template("acme", "sdk", ".github/ISSUE_TEMPLATE.md")
        .await
        .unwrap();
    assert_eq!(text, "### [REQUIRED] Steps\n");

    let err = client
        .fetch_issue_template("acme", "missing", "ISSUE_TEMPLATE.md")
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::NotFound(_)), "{err}");

    let err = client
        .fetch_issue_template("acme", "private", "ISSUE_TEMPLATE.md")
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Auth(_)), "{err}");
}

#[tokio::test]
async fn writes_hit_the_issue_endpoints() {
    let mut server = mockito::Server::new_async().await;
    let add = server
        .mock("POST", "/repos/acme/sdk/issues/3/labels")
        .match_body(Matcher::Json(serde_json::json!({"labels": ["stale"]})))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let remove = server
        .mock("DELETE", "/repos/acme/sdk/issues/3/labels/needs%20info")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let comment = server
        .mock("POST", "/repos/acme/sdk/issues/3/comments")
        .match_body(Matcher::PartialJson(serde_json::json!({"body": "hello"})))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;
    let close = server
        .mock("PATCH", "/repos/acme/sdk/issues/3")
        .match_body(Matcher::PartialJson(serde_json::json!({"state": "closed"})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = GitHubClient::with_base_url(server.url(), Some("t".into())).unwrap();
    client.add_label("acme", "sdk", 3, "stale").await.unwrap();
    client.remove_label("acme", "sdk", 3, "needs info").await.unwrap();
    client.add_comment("acme", "sdk", 3, "hello").await.unwrap();
    client.close_issue("acme", "sdk", 3).await.unwrap();

    add.assert_async().await;
    remove.assert_async().await;
    comment.assert_async().await;
    close.assert_async().await;
}

#[tokio::test]
async fn removing_an_absent_label_succeeds() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/repos/acme/sdk/issues/3/labels/stale")
        .with_status(404)
        .create_async()
        .await;
    let client = GitHubClient::with_base_url(server.url(), None).unwrap();
    client.remove_label("acme", "sdk", 3, "stale").await.unwrap();
}

#[tokio::test]
async fn server_errors_are_upstream_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/repos/acme/sdk/collaborators")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;
    let client = GitHubClient::with_base_url(server.url(), None).unwrap();
    let err = client.fetch_collaborators("acme", "sdk").await.unwrap_err();
    assert!(err.is_upstream());
    assert!(matches!(err, BotError::Upstream(_)));
}

#[tokio::test]
async fn mailgun_posts_form_with_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v3/mg.example.com/messages")
        // base64("api:key-123")
        .match_header("authorization", "Basic YXBpOmtleS0xMjM=")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("to".into(), "team@example.com".into()),
            Matcher::UrlEncoded("subject".into(), "[acme/sdk] Issue #1: Crash".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"<x>","message":"Queued"}"#)
        .create_async()
        .await;

    let mailer = MailgunClient::with_base_url(server.url(), "mg.example.com", "key-123").unwrap();
    let email = StyledEmail {
        recipient: "team@example.com".into(),
        subject: "[acme/sdk] Issue #1: Crash".into(),
        header: "New issue".into(),
        body_html: "<p>Crash</p>".into(),
        link: "https://github.com/acme/sdk/issues/1".into(),
        action_label: "Open Issue".into(),
    };
    mailer.send_styled_email(&email).await.unwrap();
    mock.assert_async().await;
}
