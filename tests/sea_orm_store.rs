use migration::{Migrator, MigratorTrait};
use school_admin::store::{DocumentStore, Query, SeaOrmDocumentStore, list_all};
use serde_json::json;

async fn sqlite_store() -> SeaOrmDocumentStore {
    let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    SeaOrmDocumentStore::new(db)
}

#[tokio::test]
async fn documents_round_trip_through_sqlite() {
    let store = sqlite_store().await;

    store
        .create("faculty", "fac-1", json!({ "$id": "ignored", "name": "Science", "classes": ["10"] }))
        .await
        .unwrap();
    assert!(store.create("faculty", "fac-1", json!({})).await.is_err());

    let doc = store.get("faculty", "fac-1").await.unwrap().unwrap();
    assert_eq!(doc.id, "fac-1");
    assert_eq!(doc.data, json!({ "name": "Science", "classes": ["10"] }));

    let updated = store
        .update("faculty", "fac-1", json!({ "classes": ["10", "11"] }))
        .await
        .unwrap();
    assert_eq!(updated.data["name"], "Science");
    assert_eq!(updated.data["classes"], json!(["10", "11"]));

    store.delete("faculty", "fac-1").await.unwrap();
    assert!(store.get("faculty", "fac-1").await.unwrap().is_none());
    assert!(store.delete("faculty", "fac-1").await.is_err());
    assert!(store.update("faculty", "fac-1", json!({})).await.is_err());
}

#[tokio::test]
async fn collections_are_isolated_and_filterable() {
    let store = sqlite_store().await;
    for i in 0..30 {
        let class = if i % 2 == 0 { "10" } else { "11" };
        store
            .create("section", &format!("sec-{i:02}"), json!({ "name": "A", "class": class }))
            .await
            .unwrap();
    }
    store.create("faculty", "sec-00", json!({ "name": "Arts" })).await.unwrap();

    assert_eq!(store.list("section", &[]).await.unwrap().len(), 25);
    assert_eq!(list_all(&store, "section", &[]).await.unwrap().len(), 30);

    let tens = list_all(&store, "section", &[Query::equal("class", "10")]).await.unwrap();
    assert_eq!(tens.len(), 15);

    let last = store
        .list("section", &[Query::OrderDesc("$id".into()), Query::Limit(1)])
        .await
        .unwrap();
    assert_eq!(last[0].id, "sec-29");
    assert_eq!(list_all(&store, "faculty", &[]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn paging_and_id_filters_run_against_the_table() {
    let store = sqlite_store().await;
    for i in 0..30 {
        store
            .create("section", &format!("sec-{i:02}"), json!({ "name": "A", "class": "10" }))
            .await
            .unwrap();
    }

    let tail = store
        .list("section", &[Query::Limit(10), Query::Offset(25)])
        .await
        .unwrap();
    let ids: Vec<&str> = tail.iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, ["sec-25", "sec-26", "sec-27", "sec-28", "sec-29"]);

    let one = store
        .list("section", &[Query::equal("$id", "sec-03")])
        .await
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].data["class"], "10");

    let none = store
        .list("section", &[Query::equal("$id", "sec-03"), Query::equal("class", "11")])
        .await
        .unwrap();
    assert!(none.is_empty());

    let page = store
        .list(
            "section",
            &[Query::equal("class", "10"), Query::OrderDesc("$id".into()), Query::Limit(2), Query::Offset(1)],
        )
        .await
        .unwrap();
    let ids: Vec<&str> = page.iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, ["sec-28", "sec-27"]);
}
