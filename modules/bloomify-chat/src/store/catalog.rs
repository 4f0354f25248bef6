use anyhow::Result;
use async_trait::async_trait;
use pgvector::Vector;
use uuid::Uuid;

use bloomify_common::{CandidateProduct, Occasion, ScoredProduct};

use super::{sql_count, sql_limit, PgStore};
use crate::traits::Catalog;

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    slug: String,
    name: String,
    price: f64,
    image_url: Option<String>,
}

impl From<CandidateRow> for CandidateProduct {
    fn from(row: CandidateRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            price: row.price,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredRow {
    id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    price: f64,
    image_url: Option<String>,
    similarity: f64,
}

impl From<ScoredRow> for ScoredProduct {
    fn from(row: ScoredRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            similarity: row.similarity,
        }
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn similar_products(
        &self,
        embedding: &[f32],
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT id, slug, name, price, image_url FROM match_products_smart($1, $2, $3, $4)",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(occasion.map(|o| o.as_str()))
        .bind(max_price)
        .bind(sql_count(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn cheapest_products(
        &self,
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, slug, name, price, image_url
            FROM products
            WHERE ($1::text IS NULL OR cardinality(occasions) = 0 OR $1 = ANY (occasions))
              AND ($2::float8 IS NULL OR price <= $2)
            ORDER BY price ASC, slug ASC
            LIMIT $3
            "#,
        )
        .bind(occasion.map(|o| o.as_str()))
        .bind(max_price)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn similar_knowledge(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>> {
        let contents = sqlx::query_scalar::<_, String>("SELECT content FROM match_kb($1, $2)")
            .bind(Vector::from(embedding.to_vec()))
            .bind(sql_count(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(contents)
    }

    async fn list_products(&self, limit: usize) -> Result<Vec<CandidateProduct>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT id, slug, name, price, image_url FROM products ORDER BY slug LIMIT $1",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn products_by_slugs(&self, slugs: &[String]) -> Result<Vec<CandidateProduct>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, slug, name, price, image_url
            FROM products
            WHERE slug = ANY ($1)
            ORDER BY slug
            "#,
        )
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_products(
        &self,
        embedding: &[f32],
        k: usize,
        max_price: Option<f64>,
    ) -> Result<Vec<ScoredProduct>> {
        let rows = sqlx::query_as::<_, ScoredRow>(
            r#"
            SELECT id, slug, name, description, price, image_url, similarity
            FROM match_products($1, $2, $3)
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(sql_count(k))
        .bind(max_price)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
