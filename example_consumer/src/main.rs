//! Example consumer: a blog API (authors and posts) on PostgreSQL.
//!
//! Create the tables from `sql/schema.sql`, set `DATABASE_URL`, then run
//! `cargo run -p example-consumer`.

use axum::{http::request::Parts, Router};
use schema_crud::{
    common_routes, entity_routes, ApiError, CrudCore, Entity, ErrorCode, FieldDef, FieldKind, PgStore, Registry,
    RouteOptions, Settings, Verb,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Author {
    id: i64,
    name: String,
    email: String,
    bio: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: String,
}

impl Entity for Author {
    const TABLE: &'static str = "author";
    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("name", "name", FieldKind::String).crud("required_on_create,partial_update,allow_get"),
            FieldDef::new("email", "email", FieldKind::String)
                .crud("required_on_create,allow_get")
                .storage("column:email;unique"),
            FieldDef::new("bio", "bio", FieldKind::Pointer).crud("partial_update,allow_get"),
            FieldDef::new("created_at", "createdAt", FieldKind::String)
                .crud("allow_get")
                .storage("column:created_at;type:timestamptz"),
        ];
        FIELDS
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Post {
    id: i64,
    title: String,
    body: String,
    published: bool,
    tags: Vec<String>,
    #[serde(rename = "authorId")]
    author_id: i64,
    #[serde(default)]
    author: Option<Author>,
}

impl Entity for Post {
    const TABLE: &'static str = "post";
    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("title", "title", FieldKind::String)
                .crud("required_on_create,partial_update,allow_get")
                .storage("unique"),
            FieldDef::new("body", "body", FieldKind::String).crud("partial_update,allow_get"),
            FieldDef::new("published", "published", FieldKind::Bool)
                .crud("partial_update,allow_get")
                .storage("default:false"),
            FieldDef::new("tags", "tags", FieldKind::Collection)
                .crud("partial_update,allow_get")
                .storage("default:[]"),
            FieldDef::new("author_id", "authorId", FieldKind::Integer)
                .crud("required_on_create,allow_get")
                .storage("column:author_id"),
            FieldDef::new("author", "author", FieldKind::Pointer).storage("foreignKey:AuthorID"),
        ];
        FIELDS
    }
}

fn require_editor(parts: &mut Parts) -> Result<(), ApiError> {
    match parts.headers.get("x-role").and_then(|v| v.to_str().ok()) {
        Some("editor") => Ok(()),
        _ => Err(ApiError::with_message(ErrorCode::Forbidden, "editor role required")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schema_crud=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let store = PgStore::connect(&settings.database_url, settings.max_connections).await?;
    let core = CrudCore::init(store, Registry::builder().register::<Author>().register::<Post>())?;

    let posts = RouteOptions::<Post>::new()
        .transactional(true)
        .intercept(Verb::Delete, require_editor)
        .before_create(|post: &mut Post| {
            post.title = post.title.trim().to_string();
            Ok(())
        })
        .after_create(|post| {
            tracing::info!(id = post.id, author = post.author_id, "post created");
            Ok(())
        });

    let app = Router::new()
        .merge(entity_routes::<Author, ()>(&core, "authors", RouteOptions::new())?)
        .merge(entity_routes::<Post, ()>(&core, "posts", posts)?)
        .merge(common_routes::<()>(core));

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("blog API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
