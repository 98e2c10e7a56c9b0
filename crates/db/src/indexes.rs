use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

/// Collections that only ever see list queries sorted by creation time.
const LISTED_COLLECTIONS: &[&str] = &[
    "projects",
    "invoices",
    "payments",
    "expenses",
    "incomes",
    "bazaars",
    "standups",
    "admissions",
    "admission_targets",
    "designations",
    "notifications",
    "menus",
    "tags",
    "user_types",
    "project_categories",
    "technologies",
];

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Tasks
    create_indexes(
        db,
        "tasks",
        vec![
            index(bson::doc! { "createdAt": -1 }),
            index(bson::doc! { "assignTo._id": 1, "createdAt": -1 }),
            index(bson::doc! { "project._id": 1, "createdAt": -1 }),
            index(bson::doc! { "assignDate": -1 }),
            index(bson::doc! { "list._id": 1 }),
        ],
    )
    .await?;

    // Users
    create_indexes(
        db,
        "users",
        vec![
            index(bson::doc! { "createdAt": -1 }),
            index_unique_sparse(bson::doc! { "username": 1 }),
        ],
    )
    .await?;

    for collection in LISTED_COLLECTIONS {
        create_indexes(db, collection, vec![index(bson::doc! { "createdAt": -1 })]).await?;
    }

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique_sparse(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
