//! Application state for the signing API

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub struct AppState {
    pub db: SqlitePool,
    /// Origin the callback bridge page posts its signing event to. The
    /// host page only ever listens to this origin, never the provider's.
    pub public_origin: String,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let db_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:signflow.db?mode=rwc".into());
        let public_origin = std::env::var("PUBLIC_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        Self::connect(&db_url, public_origin).await
    }

    pub async fn connect(db_url: &str, public_origin: impl Into<String>) -> Result<Self> {
        tracing::info!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            db: pool,
            public_origin: public_origin.into(),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content_json TEXT NOT NULL,
                roles_json TEXT NOT NULL,
                variables_json TEXT NOT NULL DEFAULT '[]',
                workflow_json TEXT NOT NULL DEFAULT '{}',
                injected_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signers (
                token TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                role_id TEXT NOT NULL,
                recipient_name TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                step TEXT NOT NULL DEFAULT 'preview',
                responses_json TEXT NOT NULL DEFAULT '[]',
                signing_url TEXT,
                fallback_url TEXT,
                used INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Index for per-document signer lookups (turn computation and
        // access requests go through these).
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signers_document ON signers(document_id)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}
