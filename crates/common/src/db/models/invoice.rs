//! Invoice header facts (one per document)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text", unique)]
    pub document_id: String,

    /// Invoice number as printed on the document
    #[sea_orm(column_type = "Text", nullable)]
    pub invoice_id: Option<String>,

    #[sea_orm(indexed)]
    pub invoice_date: Option<Date>,

    pub delivery_date: Option<Date>,

    pub confidence_invoice_id: Option<f64>,

    pub confidence_invoice_date: Option<f64>,

    pub confidence_delivery_date: Option<f64>,
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
