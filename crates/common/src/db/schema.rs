//! Idempotent schema creation from the entity definitions

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

/// Create every table and index that does not exist yet, parents first
pub async fn create_schema(conn: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(conn.get_database_backend());

    create_table(conn, &schema, OrganizationEntity).await?;
    create_table(conn, &schema, DepartmentEntity).await?;
    create_table(conn, &schema, DocumentEntity).await?;
    create_table(conn, &schema, VendorEntity).await?;
    create_table(conn, &schema, CustomerEntity).await?;
    create_table(conn, &schema, InvoiceEntity).await?;
    create_table(conn, &schema, PaymentEntity).await?;
    create_table(conn, &schema, SummaryEntity).await?;
    create_table(conn, &schema, LineItemEntity).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    conn: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let backend = conn.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    conn.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        conn.execute(backend.build(&index)).await?;
    }

    Ok(())
}
