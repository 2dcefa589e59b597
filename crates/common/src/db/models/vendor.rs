//! Vendor entity (one per document)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text", unique)]
    pub document_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub vendor_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub vendor_party_number: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub vendor_address: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub vendor_tax_id: Option<String>,

    pub confidence_name: Option<f64>,

    pub confidence_address: Option<f64>,

    pub confidence_tax_id: Option<f64>,
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
