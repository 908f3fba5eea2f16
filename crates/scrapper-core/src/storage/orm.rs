//! Query-builder `LinkStorage`: same statements as [`super::sql::SqlLinkStorage`]
//! but assembled with `sea-query` instead of hand-written SQL strings, executed
//! over the same `deadpool_postgres` pool.
//!
//! Spec requires two storage implementations with identical observable
//! behavior (equivalence property, spec §8.6); this one exists to exercise
//! that property, not because the builder buys anything the raw-SQL
//! implementation lacks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use sea_query::{Alias, Expr, Iden, OnConflict, PostgresQueryBuilder, Query};
use sea_query_postgres::PostgresBinder;
use tracing::error;

use crate::error::StorageError;
use crate::models::{LinkResponse, LinkRow};

use super::LinkStorage;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    TelegramId,
}

#[derive(Iden)]
enum Links {
    Table,
    Id,
    Url,
    ChangedAt,
}

#[derive(Iden)]
enum LinkUsers {
    Table,
    UserId,
    LinkId,
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum LinkTags {
    Table,
    LinkId,
    TagId,
    UserId,
}

#[derive(Iden)]
enum Filters {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum LinkFilters {
    Table,
    LinkId,
    FilterId,
    UserId,
}

pub struct OrmLinkStorage {
    pool: Pool,
}

impl OrmLinkStorage {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStorage for OrmLinkStorage {
    async fn create_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::insert()
            .into_table(Users::Table)
            .columns([Users::TelegramId])
            .values_panic([user_tg_id.into()])
            .on_conflict(
                OnConflict::column(Users::TelegramId)
                    .do_nothing()
                    .to_owned(),
            )
            .build_postgres(PostgresQueryBuilder);
        client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| StorageError::CreateChat(e.to_string()))?;
        Ok(())
    }

    async fn delete_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::delete()
            .from_table(Users::Table)
            .and_where(Expr::col(Users::TelegramId).eq(user_tg_id))
            .build_postgres(PostgresQueryBuilder);
        client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| StorageError::DeleteChat(e.to_string()))?;
        Ok(())
    }

    async fn chat_exists(&self, user_tg_id: i64) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .column(Users::Id)
            .from(Users::Table)
            .and_where(Expr::col(Users::TelegramId).eq(user_tg_id))
            .build_postgres(PostgresQueryBuilder);
        let row = client.query_opt(sql.as_str(), &values.as_params()).await?;
        Ok(row.is_some())
    }

    async fn add_link(
        &self,
        user_tg_id: i64,
        url: &str,
        tags: &[String],
        filters: &[String],
    ) -> Result<(), StorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let (sql, values) = Query::select()
            .column(Users::Id)
            .from(Users::Table)
            .and_where(Expr::col(Users::TelegramId).eq(user_tg_id))
            .build_postgres(PostgresQueryBuilder);
        let user_row = tx.query_opt(sql.as_str(), &values.as_params()).await?;
        let Some(user_row) = user_row else {
            return Err(StorageError::ChatNotFound);
        };
        let user_id: i64 = user_row.get(0);

        let (sql, values) = Query::insert()
            .into_table(Links::Table)
            .columns([Links::Url, Links::ChangedAt])
            .values_panic([url.into(), Expr::current_timestamp().into()])
            .on_conflict(OnConflict::column(Links::Url).do_nothing().to_owned())
            .build_postgres(PostgresQueryBuilder);
        tx.execute(sql.as_str(), &values.as_params()).await?;

        let (sql, values) = Query::select()
            .column(Links::Id)
            .from(Links::Table)
            .and_where(Expr::col(Links::Url).eq(url))
            .build_postgres(PostgresQueryBuilder);
        let link_row = tx.query_one(sql.as_str(), &values.as_params()).await?;
        let link_id: i64 = link_row.get(0);

        let (sql, values) = Query::insert()
            .into_table(LinkUsers::Table)
            .columns([LinkUsers::UserId, LinkUsers::LinkId])
            .values_panic([user_id.into(), link_id.into()])
            .on_conflict(
                OnConflict::columns([LinkUsers::UserId, LinkUsers::LinkId])
                    .do_nothing()
                    .to_owned(),
            )
            .build_postgres(PostgresQueryBuilder);
        let inserted = tx.execute(sql.as_str(), &values.as_params()).await?;
        if inserted == 0 {
            return Err(StorageError::LinkAlreadyExists);
        }

        for tag in tags {
            let (sql, values) = Query::insert()
                .into_table(Tags::Table)
                .columns([Tags::Name])
                .values_panic([tag.as_str().into()])
                .on_conflict(OnConflict::column(Tags::Name).do_nothing().to_owned())
                .build_postgres(PostgresQueryBuilder);
            tx.execute(sql.as_str(), &values.as_params()).await?;

            let (sql, values) = Query::select()
                .column(Tags::Id)
                .from(Tags::Table)
                .and_where(Expr::col(Tags::Name).eq(tag.as_str()))
                .build_postgres(PostgresQueryBuilder);
            let tag_row = tx.query_one(sql.as_str(), &values.as_params()).await?;
            let tag_id: i64 = tag_row.get(0);

            let (sql, values) = Query::insert()
                .into_table(LinkTags::Table)
                .columns([LinkTags::LinkId, LinkTags::TagId, LinkTags::UserId])
                .values_panic([link_id.into(), tag_id.into(), user_id.into()])
                .on_conflict(
                    OnConflict::columns([LinkTags::LinkId, LinkTags::TagId, LinkTags::UserId])
                        .do_nothing()
                        .to_owned(),
                )
                .build_postgres(PostgresQueryBuilder);
            tx.execute(sql.as_str(), &values.as_params()).await?;
        }

        for filter in filters {
            let (sql, values) = Query::insert()
                .into_table(Filters::Table)
                .columns([Filters::Name])
                .values_panic([filter.as_str().into()])
                .on_conflict(OnConflict::column(Filters::Name).do_nothing().to_owned())
                .build_postgres(PostgresQueryBuilder);
            tx.execute(sql.as_str(), &values.as_params()).await?;

            let (sql, values) = Query::select()
                .column(Filters::Id)
                .from(Filters::Table)
                .and_where(Expr::col(Filters::Name).eq(filter.as_str()))
                .build_postgres(PostgresQueryBuilder);
            let filter_row = tx.query_one(sql.as_str(), &values.as_params()).await?;
            let filter_id: i64 = filter_row.get(0);

            let (sql, values) = Query::insert()
                .into_table(LinkFilters::Table)
                .columns([
                    LinkFilters::LinkId,
                    LinkFilters::FilterId,
                    LinkFilters::UserId,
                ])
                .values_panic([link_id.into(), filter_id.into(), user_id.into()])
                .on_conflict(
                    OnConflict::columns([
                        LinkFilters::LinkId,
                        LinkFilters::FilterId,
                        LinkFilters::UserId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .build_postgres(PostgresQueryBuilder);
            tx.execute(sql.as_str(), &values.as_params()).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_link(&self, user_tg_id: i64, url: &str) -> Result<(), StorageError> {
        let client = self.pool.get().await?;

        let user_id_sub = Query::select()
            .column(Users::Id)
            .from(Users::Table)
            .and_where(Expr::col(Users::TelegramId).eq(user_tg_id))
            .take();
        let link_id_sub = Query::select()
            .column(Links::Id)
            .from(Links::Table)
            .and_where(Expr::col(Links::Url).eq(url))
            .take();

        let (sql, values) = Query::delete()
            .from_table(LinkUsers::Table)
            .and_where(Expr::col(LinkUsers::UserId).in_subquery(user_id_sub))
            .and_where(Expr::col(LinkUsers::LinkId).in_subquery(link_id_sub))
            .build_postgres(PostgresQueryBuilder);
        let affected = client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| StorageError::RemoveLink(e.to_string()))?;
        if affected == 0 {
            return Err(StorageError::LinkNotFound);
        }

        let orphan_sub = Query::select()
            .column(LinkUsers::LinkId)
            .from(LinkUsers::Table)
            .take();
        let (sql, values) = Query::delete()
            .from_table(Links::Table)
            .and_where(Expr::col(Links::Url).eq(url))
            .and_where(Expr::col(Links::Id).not_in_subquery(orphan_sub))
            .build_postgres(PostgresQueryBuilder);
        if let Err(e) = client.execute(sql.as_str(), &values.as_params()).await {
            error!("link gc for {url}: {e}");
        }

        Ok(())
    }

    async fn get_links(&self, user_tg_id: i64) -> Result<Vec<LinkResponse>, StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .column((Links::Table, Links::Id))
            .column((Links::Table, Links::Url))
            .column((Links::Table, Links::ChangedAt))
            .from(Links::Table)
            .inner_join(
                LinkUsers::Table,
                Expr::col((Links::Table, Links::Id)).equals((LinkUsers::Table, LinkUsers::LinkId)),
            )
            .inner_join(
                Users::Table,
                Expr::col((Users::Table, Users::Id)).equals((LinkUsers::Table, LinkUsers::UserId)),
            )
            .and_where(Expr::col((Users::Table, Users::TelegramId)).eq(user_tg_id))
            .order_by((Links::Table, Links::Id), sea_query::Order::Asc)
            .build_postgres(PostgresQueryBuilder);
        let rows = client.query(sql.as_str(), &values.as_params()).await?;

        let mut links: Vec<LinkResponse> = rows
            .iter()
            .map(|row| LinkResponse {
                id: row.get(0),
                url: row.get(1),
                tags: Vec::new(),
                filters: Vec::new(),
                last_checked: row.get(2),
                last_version: String::new(),
            })
            .collect();

        let (sql, values) = Query::select()
            .column((LinkTags::Table, LinkTags::LinkId))
            .column((Tags::Table, Tags::Name))
            .from(Tags::Table)
            .inner_join(
                LinkTags::Table,
                Expr::col((LinkTags::Table, LinkTags::TagId)).equals((Tags::Table, Tags::Id)),
            )
            .inner_join(
                Users::Table,
                Expr::col((Users::Table, Users::Id)).equals((LinkTags::Table, LinkTags::UserId)),
            )
            .and_where(Expr::col((Users::Table, Users::TelegramId)).eq(user_tg_id))
            .build_postgres(PostgresQueryBuilder);
        let tag_rows = client.query(sql.as_str(), &values.as_params()).await?;

        let (sql, values) = Query::select()
            .column((LinkFilters::Table, LinkFilters::LinkId))
            .column((Filters::Table, Filters::Name))
            .from(Filters::Table)
            .inner_join(
                LinkFilters::Table,
                Expr::col((LinkFilters::Table, LinkFilters::FilterId))
                    .equals((Filters::Table, Filters::Id)),
            )
            .inner_join(
                Users::Table,
                Expr::col((Users::Table, Users::Id))
                    .equals((LinkFilters::Table, LinkFilters::UserId)),
            )
            .and_where(Expr::col((Users::Table, Users::TelegramId)).eq(user_tg_id))
            .build_postgres(PostgresQueryBuilder);
        let filter_rows = client.query(sql.as_str(), &values.as_params()).await?;

        for link in &mut links {
            link.tags = tag_rows
                .iter()
                .filter(|r| r.get::<_, i64>(0) == link.id)
                .map(|r| r.get(1))
                .collect();
            link.filters = filter_rows
                .iter()
                .filter(|r| r.get::<_, i64>(0) == link.id)
                .map(|r| r.get(1))
                .collect();
        }

        Ok(links)
    }

    async fn delete_tag(&self, user_tg_id: i64, tag: &str) -> Result<(), StorageError> {
        let client = self.pool.get().await?;

        let user_id_sub = Query::select()
            .column(Users::Id)
            .from(Users::Table)
            .and_where(Expr::col(Users::TelegramId).eq(user_tg_id))
            .take();
        let tag_id_sub = Query::select()
            .column(Tags::Id)
            .from(Tags::Table)
            .and_where(Expr::col(Tags::Name).eq(tag))
            .take();

        let (sql, values) = Query::delete()
            .from_table(LinkTags::Table)
            .and_where(Expr::col(LinkTags::UserId).in_subquery(user_id_sub))
            .and_where(Expr::col(LinkTags::TagId).in_subquery(tag_id_sub))
            .build_postgres(PostgresQueryBuilder);
        let affected = client.execute(sql.as_str(), &values.as_params()).await?;
        if affected == 0 {
            return Err(StorageError::TagNotFound);
        }
        Ok(())
    }

    async fn is_url_in_added(&self, user_tg_id: i64, url: &str) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .expr_as(
                Expr::exists(
                    Query::select()
                        .expr(Expr::val(1))
                        .from(LinkUsers::Table)
                        .inner_join(
                            Users::Table,
                            Expr::col((Users::Table, Users::Id))
                                .equals((LinkUsers::Table, LinkUsers::UserId)),
                        )
                        .inner_join(
                            Links::Table,
                            Expr::col((Links::Table, Links::Id))
                                .equals((LinkUsers::Table, LinkUsers::LinkId)),
                        )
                        .and_where(Expr::col((Users::Table, Users::TelegramId)).eq(user_tg_id))
                        .and_where(Expr::col((Links::Table, Links::Url)).eq(url))
                        .take(),
                ),
                Alias::new("exists"),
            )
            .build_postgres(PostgresQueryBuilder);
        let row = client.query_one(sql.as_str(), &values.as_params()).await?;
        Ok(row.get(0))
    }

    async fn get_batch_of_links(
        &self,
        batch_size: i64,
        after_id: i64,
    ) -> Result<(Vec<LinkRow>, i64), StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .columns([Links::Id, Links::Url, Links::ChangedAt])
            .from(Links::Table)
            .and_where(Expr::col(Links::Id).gt(after_id))
            .order_by(Links::Id, sea_query::Order::Asc)
            .limit(batch_size.max(0) as u64)
            .build_postgres(PostgresQueryBuilder);
        let rows = client.query(sql.as_str(), &values.as_params()).await?;

        let mut new_after_id = after_id;
        let links: Vec<LinkRow> = rows
            .iter()
            .map(|row| {
                let link = LinkRow {
                    id: row.get(0),
                    url: row.get(1),
                    changed_at: row.get(2),
                };
                new_after_id = link.id;
                link
            })
            .collect();
        Ok((links, new_after_id))
    }

    async fn get_previous_update(&self, link_id: i64) -> Result<DateTime<Utc>, StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .column(Links::ChangedAt)
            .from(Links::Table)
            .and_where(Expr::col(Links::Id).eq(link_id))
            .build_postgres(PostgresQueryBuilder);
        let row = client.query_one(sql.as_str(), &values.as_params()).await?;
        Ok(row.get(0))
    }

    async fn save_last_update(&self, link_id: i64, ts: DateTime<Utc>) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::update()
            .table(Links::Table)
            .value(Links::ChangedAt, ts)
            .and_where(Expr::col(Links::Id).eq(link_id))
            .build_postgres(PostgresQueryBuilder);
        client.execute(sql.as_str(), &values.as_params()).await?;
        Ok(())
    }

    async fn get_tg_chat_ids_for_link(&self, url: &str) -> Result<Vec<i64>, StorageError> {
        let client = self.pool.get().await?;
        let (sql, values) = Query::select()
            .column((Users::Table, Users::TelegramId))
            .from(Users::Table)
            .inner_join(
                LinkUsers::Table,
                Expr::col((Users::Table, Users::Id)).equals((LinkUsers::Table, LinkUsers::UserId)),
            )
            .inner_join(
                Links::Table,
                Expr::col((Links::Table, Links::Id)).equals((LinkUsers::Table, LinkUsers::LinkId)),
            )
            .and_where(Expr::col((Links::Table, Links::Url)).eq(url))
            .build_postgres(PostgresQueryBuilder);
        let rows = client.query(sql.as_str(), &values.as_params()).await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }
}
