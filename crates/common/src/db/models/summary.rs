//! Document totals (one per document)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "summaries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text", unique)]
    pub document_id: String,

    /// "invoice" or "creditNote"
    #[sea_orm(column_type = "Text", nullable)]
    pub document_type: Option<String>,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub sub_total: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub total_tax: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub invoice_total: Option<Decimal>,

    #[sea_orm(column_type = "Text", nullable)]
    pub currency_symbol: Option<String>,

    pub confidence_sub_total: Option<f64>,

    pub confidence_total_tax: Option<f64>,

    pub confidence_invoice_total: Option<f64>,
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
