//! AI persona repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use colloquy_core::{new_v7, Error, NewPersona, Persona, PersonaRepository, Result, UpdatePersona};

const PERSONA_COLUMNS: &str = "id, owner, name, description, system_prompt, traits, \
                               preferred_model, is_default, created_at, updated_at";

/// PostgreSQL implementation of [`PersonaRepository`].
///
/// At most one default persona per owner is enforced by a partial unique
/// index; setting a new default clears the old one in the same transaction.
#[derive(Clone)]
pub struct PgPersonaRepository {
    pool: Pool<Postgres>,
}

impl PgPersonaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Persona {
        Persona {
            id: r.get("id"),
            owner: r.get("owner"),
            name: r.get("name"),
            description: r.get("description"),
            system_prompt: r.get("system_prompt"),
            traits: r.get("traits"),
            preferred_model: r.get("preferred_model"),
            is_default: r.get("is_default"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }
}

#[async_trait]
impl PersonaRepository for PgPersonaRepository {
    async fn list(&self, owner: &str) -> Result<Vec<Persona>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas WHERE owner = $1
             ORDER BY is_default DESC, created_at ASC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<Persona>> {
        let row = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas WHERE id = $1 AND owner = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn get_default(&self, owner: &str) -> Result<Option<Persona>> {
        let row = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM ai_personas WHERE owner = $1 AND is_default"
        ))
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn create(&self, owner: &str, persona: NewPersona) -> Result<Persona> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if persona.is_default {
            sqlx::query("UPDATE ai_personas SET is_default = false WHERE owner = $1 AND is_default")
                .bind(owner)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let traits = persona
            .traits
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let row = sqlx::query(&format!(
            "INSERT INTO ai_personas
                (id, owner, name, description, system_prompt, traits, preferred_model, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PERSONA_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(owner)
        .bind(&persona.name)
        .bind(&persona.description)
        .bind(&persona.system_prompt)
        .bind(traits)
        .bind(&persona.preferred_model)
        .bind(persona.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(Self::parse_row(&row))
    }

    async fn update(
        &self,
        id: Uuid,
        owner: &str,
        update: UpdatePersona,
    ) -> Result<Option<Persona>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if update.is_default == Some(true) {
            sqlx::query(
                "UPDATE ai_personas SET is_default = false
                 WHERE owner = $1 AND id <> $2 AND is_default",
            )
            .bind(owner)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        let row = sqlx::query(&format!(
            "UPDATE ai_personas SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                system_prompt = COALESCE($3, system_prompt),
                traits = COALESCE($4, traits),
                preferred_model = COALESCE($5, preferred_model),
                is_default = COALESCE($6, is_default),
                updated_at = now()
             WHERE id = $7 AND owner = $8
             RETURNING {PERSONA_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.system_prompt)
        .bind(&update.traits)
        .bind(&update.preferred_model)
        .bind(update.is_default)
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn delete(&self, id: Uuid, owner: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ai_personas WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
