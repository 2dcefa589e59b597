//! Document entity
//!
//! One row per uploaded file, keyed by the upstream document id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub file_path: Option<String>,

    pub file_size: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub file_type: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub status: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub organization_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub department_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub uploaded_by_id: Option<String>,

    pub is_validated_by_human: bool,

    /// Written on first insert only
    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    pub processed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub analytics_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub original_file_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub template_name: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,

    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,

    #[sea_orm(has_one = "super::vendor::Entity")]
    Vendor,

    #[sea_orm(has_one = "super::customer::Entity")]
    Customer,

    #[sea_orm(has_one = "super::invoice::Entity")]
    Invoice,

    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,

    #[sea_orm(has_one = "super::summary::Entity")]
    Summary,

    #[sea_orm(has_many = "super::line_item::Entity")]
    LineItems,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl Related<super::summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Summary.def()
    }
}

impl Related<super::line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
