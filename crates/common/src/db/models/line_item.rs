//! Line item entity
//!
//! Many per document; the whole set is replaced on re-ingestion.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "line_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text", indexed)]
    pub document_id: String,

    pub sr_no: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Decimal(Some((14, 4)))", nullable)]
    pub quantity: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((14, 4)))", nullable)]
    pub unit_price: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub total_price: Option<Decimal>,

    /// Sachkonto
    #[sea_orm(column_type = "Text", nullable)]
    pub general_ledger_account: Option<String>,

    /// BU-Schluessel
    #[sea_orm(column_type = "Text", nullable)]
    pub tax_key: Option<String>,

    #[sea_orm(column_type = "Decimal(Some((7, 4)))")]
    pub vat_rate: Decimal,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub vat_amount: Decimal,

    pub confidence_description: Option<f64>,

    pub confidence_quantity: Option<f64>,

    pub confidence_unit_price: Option<f64>,

    pub confidence_total_price: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
