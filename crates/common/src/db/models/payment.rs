//! Payment terms (one per document)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text", unique)]
    pub document_id: String,

    #[sea_orm(indexed)]
    pub due_date: Option<Date>,

    #[sea_orm(column_type = "Text", nullable)]
    pub payment_terms: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub bank_account_number: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub bic: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub account_name: Option<String>,

    pub net_days: i32,

    #[sea_orm(column_type = "Decimal(Some((7, 4)))", nullable)]
    pub discount_percentage: Option<Decimal>,

    pub discount_days: i32,

    pub discount_due_date: Option<Date>,

    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub discounted_total: Option<Decimal>,

    pub confidence_payment_terms: Option<f64>,

    pub confidence_bank_account: Option<f64>,

    pub confidence_due_date: Option<f64>,
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
