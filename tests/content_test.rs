//! Integration tests for documents, comments, attachments, labels and
//! todos.

mod common;

use capstan::models::{Attachment, Comment, Document, Label, Todo, TodoPriority};
use capstan::storage::{
    AttachmentRepository, CommentRepository, DocumentRepository, LabelRepository, TodoRepository,
};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_document_aggregate_roundtrip() {
    let Some(db) = common::database().await else {
        return;
    };
    let documents = DocumentRepository::new(db.clone());
    let comments = CommentRepository::new(db.clone());
    let attachments = AttachmentRepository::new(db.clone());
    let labels = LabelRepository::new(db.clone());
    let author = common::seed_user(&db).await;

    let doc = documents
        .create(
            &Document::new("Design notes", common::unique("file"), author.id.clone()),
            &author.id,
        )
        .await
        .unwrap();
    assert_eq!(doc.created_by.as_ref(), Some(&author.id));

    let comment = comments
        .create(&Comment::new("looks good", author.id.clone()), &doc.id)
        .await
        .unwrap();
    let attachment = attachments
        .create(
            &Attachment::new("diagram.png", common::unique("file"), author.id.clone()),
            &doc.id,
        )
        .await
        .unwrap();
    let label = labels.create(&Label::new(common::unique("backend"))).await.unwrap();
    labels.attach_to(&label.id, &doc.id).await.unwrap();

    let doc = documents.get(&doc.id).await.unwrap();
    assert_eq!(doc.comments, vec![comment.id]);
    assert_eq!(doc.attachments, vec![attachment.id]);
    assert_eq!(doc.labels, vec![label.id]);
}

#[tokio::test]
#[serial]
async fn test_comment_pagination_is_newest_first() {
    let Some(db) = common::database().await else {
        return;
    };
    let documents = DocumentRepository::new(db.clone());
    let comments = CommentRepository::new(db.clone());
    let author = common::seed_user(&db).await;

    let doc = documents
        .create(
            &Document::new("Minutes", common::unique("file"), author.id.clone()),
            &author.id,
        )
        .await
        .unwrap();
    for body in ["first", "second", "third"] {
        comments
            .create(&Comment::new(body, author.id.clone()), &doc.id)
            .await
            .unwrap();
    }

    let first_page = comments.get_all(&doc.id, 0, 2).await.unwrap();
    let second_page = comments.get_all(&doc.id, 2, 2).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(second_page.len(), 1);
    assert_eq!(first_page[0].content, "third");
    assert_eq!(second_page[0].content, "first");

    let past_the_end = comments.get_all(&doc.id, 3, 2).await.unwrap();
    assert!(past_the_end.is_empty());
}

#[tokio::test]
#[serial]
async fn test_label_detach_is_idempotent() {
    let Some(db) = common::database().await else {
        return;
    };
    let documents = DocumentRepository::new(db.clone());
    let labels = LabelRepository::new(db.clone());
    let author = common::seed_user(&db).await;

    let doc = documents
        .create(
            &Document::new("Tagged", common::unique("file"), author.id.clone()),
            &author.id,
        )
        .await
        .unwrap();
    let label = labels.create(&Label::new(common::unique("infra"))).await.unwrap();

    labels.attach_to(&label.id, &doc.id).await.unwrap();
    labels.attach_to(&label.id, &doc.id).await.unwrap();
    assert_eq!(documents.get(&doc.id).await.unwrap().labels.len(), 1);

    labels.detach_from(&label.id, &doc.id).await.unwrap();
    labels.detach_from(&label.id, &doc.id).await.unwrap();
    assert!(documents.get(&doc.id).await.unwrap().labels.is_empty());
}

#[tokio::test]
#[serial]
async fn test_update_clears_unset_optionals() {
    let Some(db) = common::database().await else {
        return;
    };
    let labels = LabelRepository::new(db.clone());

    let mut label = Label::new(common::unique("ux"));
    label.description = Some("user-facing work".to_string());
    let stored = labels.create(&label).await.unwrap();
    assert_eq!(stored.description.as_deref(), Some("user-facing work"));

    let mut cleared = stored.clone();
    cleared.description = None;
    let updated = labels.update(&cleared).await.unwrap();
    assert!(updated.description.is_none());
    assert!(labels.get(&stored.id).await.unwrap().description.is_none());
}

#[tokio::test]
#[serial]
async fn test_todo_belongs_to_owner() {
    let Some(db) = common::database().await else {
        return;
    };
    let todos = TodoRepository::new(db.clone());
    let owner = common::seed_user(&db).await;

    let mut todo = Todo::new("Water the plants", owner.id.clone());
    todo.priority = TodoPriority::Urgent;
    let stored = todos.create(&todo).await.unwrap();

    assert_eq!(stored.owned_by.as_ref(), Some(&owner.id));
    assert_eq!(stored.created_by.as_ref(), Some(&owner.id));
    assert_eq!(stored.priority, TodoPriority::Urgent);
    assert!(!stored.completed);

    let listed = todos.get_all(&owner.id, 0, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, stored.id);

    todos.delete(&stored.id).await.unwrap();
    assert!(todos.get(&stored.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[serial]
async fn test_todo_completion_roundtrip() {
    let Some(db) = common::database().await else {
        return;
    };
    let todos = TodoRepository::new(db.clone());
    let owner = common::seed_user(&db).await;

    let stored = todos
        .create(&Todo::new("Ship the release", owner.id.clone()))
        .await
        .unwrap();
    let mut done = stored.clone();
    done.completed = true;
    let updated = todos.update(&done).await.unwrap();
    assert!(updated.completed);
    assert!(updated.updated_at.is_some());
}
