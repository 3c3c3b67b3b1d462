use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use postdesk::application::assets::{AssetUploader, UploadedAsset};
use postdesk::application::editor::{
    DeletePhase, EditorError, EditorService, EditorTimings, FieldsInput, PublishOutcome,
    PublishPhase, UploadStatus, VerificationCode,
};
use postdesk::application::post_store::{PostSnapshot, PostStore};
use postdesk::domain::posts::DEFAULT_CATEGORY;
use postdesk::domain::uploads::AssetFolder;
use postdesk::infra::auth::OperatorSession;
use postdesk::infra::db::InMemoryDocumentStore;
use postdesk::infra::uploads::LocalObjectStorage;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

const CODE: &str = "tajny-kod";
const COLLECTION: &str = "blogs";

struct Harness {
    _media: TempDir,
    documents: InMemoryDocumentStore,
    session: Arc<OperatorSession>,
    editor: EditorService,
}

fn harness(timings: EditorTimings) -> Harness {
    let media = tempfile::tempdir().expect("create media dir");
    let storage = LocalObjectStorage::new(
        media.path().to_path_buf(),
        Url::parse("http://127.0.0.1:3001/media/").expect("base url"),
    )
    .expect("create storage");

    let documents = InMemoryDocumentStore::new();
    let shared = Arc::new(documents.clone());
    let session = Arc::new(OperatorSession::from_token(Some("operator".to_string())));
    let store = Arc::new(PostStore::new(shared.clone(), COLLECTION));
    let editor = EditorService::new(
        shared,
        store,
        AssetUploader::new(Arc::new(storage)),
        session.clone(),
        VerificationCode::new(CODE),
        timings,
    );

    Harness {
        _media: media,
        documents,
        session,
        editor,
    }
}

async fn wait_for_posts(
    editor: &EditorService,
    accept: impl Fn(&PostSnapshot) -> bool,
) -> PostSnapshot {
    let mut handle = editor.store().handle();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = handle.current();
            if accept(&snapshot) {
                return snapshot;
            }
            handle.changed().await.expect("store is alive");
        }
    })
    .await
    .expect("collection reached the expected state")
}

fn draft(title: &str, body: &str) -> FieldsInput {
    FieldsInput {
        title: title.to_string(),
        slug: String::new(),
        category: DEFAULT_CATEGORY.to_string(),
        excerpt: String::new(),
        html_content: body.to_string(),
    }
}

async fn publish(editor: &EditorService) -> PublishOutcome {
    editor.request_publish().await.expect("open dialog");
    editor.confirm_publish(CODE).await.expect("publish")
}

#[tokio::test]
async fn create_then_edit_round_trip() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");

    h.editor
        .update_fields(draft("Zażółć gęślą jaźń", "<p>Treść</p>"))
        .await;
    let state = h.editor.snapshot().await;
    assert_eq!(state.fields.slug, "zazoc-gesla-jazn");

    let id = match publish(&h.editor).await {
        PublishOutcome::Created { id } => id,
        other => panic!("expected a created post, got {other:?}"),
    };

    let state = h.editor.snapshot().await;
    assert_eq!(state.publish, PublishPhase::Success);
    assert_eq!(state.fields.title, "");
    assert_eq!(state.fields.category, DEFAULT_CATEGORY);

    let posts = wait_for_posts(&h.editor, |snapshot| snapshot.find(&id).is_some()).await;
    let stored = posts.find(&id).expect("created post");
    assert_eq!(stored.slug, "zazoc-gesla-jazn");
    assert_eq!(stored.excerpt, "Zażółć gęślą jaźń");
    assert!(stored.published);
    let created_at = stored.created_at.expect("creation time");

    let state = h.editor.open(Some(id.clone())).await;
    assert!(state.is_edit_mode());
    assert!(!state.is_loading());
    assert_eq!(state.fields.html_content, "<p>Treść</p>");

    h.editor
        .update_fields(FieldsInput {
            slug: "wlasny-slug".to_string(),
            ..draft("Zażółć gęślą jaźń", "<p>Nowa treść</p>")
        })
        .await;
    assert_eq!(
        publish(&h.editor).await,
        PublishOutcome::Updated { id: id.clone() }
    );

    let state = h.editor.snapshot().await;
    assert!(!state.is_edit_mode());
    assert_eq!(state.fields.html_content, "<p>Nowa treść</p>");

    let posts = wait_for_posts(&h.editor, |snapshot| {
        snapshot
            .find(&id)
            .is_some_and(|post| post.html_content == "<p>Nowa treść</p>")
    })
    .await;
    assert_eq!(posts.posts.len(), 1);
    let edited = posts.find(&id).expect("post");
    assert_eq!(edited.id, id);
    assert_eq!(edited.slug, "wlasny-slug");
    assert_eq!(edited.created_at, Some(created_at));
    assert!(edited.updated_at.is_some_and(|updated| updated >= created_at));
}

#[tokio::test]
async fn wrong_code_keeps_dialog_open_until_the_right_one() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");

    h.editor.update_fields(draft("Szkic", "<p>x</p>")).await;
    h.editor.request_publish().await.expect("open dialog");

    let err = h.editor.confirm_publish("zly-kod").await.expect_err("rejected");
    assert!(matches!(err, EditorError::InvalidCode));

    let state = h.editor.snapshot().await;
    assert!(state.dialog_open());
    assert!(state.code_rejected);
    assert!(state.error.is_none());
    assert_eq!(state.fields.title, "Szkic");
    assert!(h.editor.posts().posts.is_empty());

    let outcome = h.editor.confirm_publish(CODE).await.expect("publish");
    let id = match outcome {
        PublishOutcome::Created { id } => id,
        other => panic!("expected a created post, got {other:?}"),
    };
    let state = h.editor.snapshot().await;
    assert!(!state.dialog_open());
    assert!(!state.code_rejected);

    let posts = wait_for_posts(&h.editor, |snapshot| !snapshot.posts.is_empty()).await;
    assert_eq!(posts.posts.len(), 1);
    assert_eq!(posts.find(&id).expect("created post").title, "Szkic");
}

#[tokio::test]
async fn cancelling_a_rejected_code_closes_the_dialog() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");

    h.editor.update_fields(draft("Szkic", "<p>x</p>")).await;
    h.editor.request_publish().await.expect("open dialog");
    h.editor.confirm_publish("zly-kod").await.expect_err("rejected");

    h.editor.cancel_publish().await;
    let state = h.editor.snapshot().await;
    assert_eq!(state.publish, PublishPhase::Idle);
    assert!(!state.code_rejected);
    assert!(h.editor.posts().posts.is_empty());
}

#[tokio::test]
async fn editing_an_unknown_post_reports_missing_target() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");

    let state = h.editor.open(Some("missing".to_string())).await;
    assert!(state.is_loading());

    h.editor.update_fields(draft("Tytuł", "<p>x</p>")).await;
    h.editor.request_publish().await.expect("open dialog");
    let err = h.editor.confirm_publish(CODE).await.expect_err("no target");
    assert!(matches!(err, EditorError::Write(_)));

    let state = h.editor.snapshot().await;
    assert_eq!(state.publish, PublishPhase::Idle);
    assert!(state.error.is_some());
    assert!(state.is_edit_mode());
}

#[tokio::test]
async fn delete_removes_every_document_with_the_id() {
    let h = harness(EditorTimings::default());
    for (id, title) in [("dup", "Pierwszy"), ("dup", "Duplikat"), ("inny", "Zostaje")] {
        h.documents
            .insert_document(
                COLLECTION,
                json!({
                    "id": id,
                    "title": title,
                    "slug": id,
                    "category": DEFAULT_CATEGORY,
                    "excerpt": "",
                    "mainImage": null,
                    "htmlContent": "",
                    "published": true,
                }),
            )
            .await
            .expect("seed document");
    }
    let _follower = h.editor.start().await.expect("subscribe");
    wait_for_posts(&h.editor, |snapshot| snapshot.posts.len() == 3).await;

    assert!(matches!(
        h.editor.confirm_delete().await,
        Err(EditorError::NoDeletePending)
    ));

    h.editor
        .request_delete("dup".to_string())
        .await
        .expect("request delete");
    h.editor.cancel_delete().await;
    assert_eq!(h.editor.snapshot().await.delete, DeletePhase::Idle);

    h.editor
        .request_delete("dup".to_string())
        .await
        .expect("request delete");
    let removed = h.editor.confirm_delete().await.expect("delete");
    assert_eq!(removed, 2);

    let posts = wait_for_posts(&h.editor, |snapshot| snapshot.find("dup").is_none()).await;
    assert_eq!(posts.posts.len(), 1);
    assert_eq!(posts.find("inny").expect("untouched post").title, "Zostaje");
}

#[tokio::test]
async fn malformed_documents_are_skipped() {
    let h = harness(EditorTimings::default());
    h.documents
        .insert_document(COLLECTION, json!({ "title": 42 }))
        .await
        .expect("seed malformed");
    h.editor.update_fields(draft("Dobry", "<p>ok</p>")).await;
    let _follower = h.editor.start().await.expect("subscribe");
    publish(&h.editor).await;

    let posts = wait_for_posts(&h.editor, |snapshot| !snapshot.posts.is_empty()).await;
    assert_eq!(posts.posts.len(), 1);
    assert_eq!(posts.posts[0].title, "Dobry");
}

#[tokio::test]
async fn starting_twice_keeps_a_single_subscription() {
    let h = harness(EditorTimings::default());
    let _first = h.editor.start().await.expect("subscribe");
    let _second = h.editor.start().await.expect("subscribe again");
    wait_for_posts(&h.editor, |snapshot| snapshot.loaded).await;

    assert_eq!(h.documents.open_subscriptions(), 1);
    assert!(h.editor.store().is_subscribed().await);

    h.editor.store().unsubscribe().await;
    assert!(!h.editor.store().is_subscribed().await);
}

#[tokio::test]
async fn signed_out_operator_cannot_upload_or_publish() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");
    h.session.sign_out();

    let err = h
        .editor
        .upload(
            AssetFolder::Main,
            UploadedAsset::new("hero.png", None, Bytes::from_static(b"png")),
        )
        .await
        .expect_err("no session");
    assert!(matches!(err, EditorError::AuthTokenUnavailable));
    assert!(matches!(
        h.editor.snapshot().await.main_upload,
        UploadStatus::Failed(_)
    ));

    h.editor.update_fields(draft("Tytuł", "<p>x</p>")).await;
    h.editor.request_publish().await.expect("open dialog");
    let err = h.editor.confirm_publish(CODE).await.expect_err("no session");
    assert!(matches!(err, EditorError::AuthTokenUnavailable));
    assert!(h.editor.snapshot().await.error.is_some());
}

#[tokio::test]
async fn uploads_fill_main_image_and_inline_link() {
    let h = harness(EditorTimings::default());

    let url = h
        .editor
        .upload(
            AssetFolder::Main,
            UploadedAsset::new("hero.png", Some("image/png".into()), Bytes::from_static(b"png")),
        )
        .await
        .expect("main upload");
    assert!(url.starts_with("http://127.0.0.1:3001/media/blog-main-images/"));
    assert!(url.ends_with("-hero.png"));

    let inline = h
        .editor
        .upload(
            AssetFolder::Inline,
            UploadedAsset::new("in text.jpg", None, Bytes::from_static(b"jpg")),
        )
        .await
        .expect("inline upload");
    assert!(inline.ends_with("-in%20text.jpg"));

    let state = h.editor.snapshot().await;
    assert_eq!(state.fields.main_image.as_deref(), Some(url.as_str()));
    assert_eq!(state.inline_image_link.as_deref(), Some(inline.as_str()));
    assert_eq!(state.main_upload, UploadStatus::Idle);

    let err = h
        .editor
        .upload(
            AssetFolder::Main,
            UploadedAsset::new("notes.txt", None, Bytes::from_static(b"text")),
        )
        .await
        .expect_err("not an image");
    assert!(matches!(err, EditorError::Upload(_)));
    let state = h.editor.snapshot().await;
    assert_eq!(state.fields.main_image.as_deref(), Some(url.as_str()));
}

#[tokio::test(start_paused = true)]
async fn transient_indicators_reset_themselves() {
    let h = harness(EditorTimings::default());
    let _follower = h.editor.start().await.expect("subscribe");

    h.editor
        .upload(
            AssetFolder::Inline,
            UploadedAsset::new("a.png", None, Bytes::from_static(b"png")),
        )
        .await
        .expect("inline upload");
    let tag = h.editor.copy_inline_tag().await.expect("copy");
    assert!(tag.starts_with("<img src=\""));
    assert_eq!(h.editor.snapshot().await.copied_tag.as_deref(), Some(tag.as_str()));

    h.editor.update_fields(draft("Tytuł", "<p>x</p>")).await;
    publish(&h.editor).await;
    assert!(h.editor.snapshot().await.publish_success());

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let state = h.editor.snapshot().await;
    assert!(state.copied_tag.is_none());
    assert!(state.publish_success());

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(!h.editor.snapshot().await.publish_success());
}

#[tokio::test(start_paused = true)]
async fn second_publish_restarts_the_success_reset() {
    let h = harness(EditorTimings {
        success_reset: Duration::from_secs(3),
        copied_reset: Duration::from_secs(2),
    });
    let _follower = h.editor.start().await.expect("subscribe");

    h.editor.update_fields(draft("Pierwszy", "<p>1</p>")).await;
    publish(&h.editor).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.editor.update_fields(draft("Drugi", "<p>2</p>")).await;
    publish(&h.editor).await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(h.editor.snapshot().await.publish_success());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!h.editor.snapshot().await.publish_success());
}
