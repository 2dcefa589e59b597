//! SeaORM entity models
//!
//! Relational model for ingested invoice documents

pub mod customer;
pub mod department;
pub mod document;
pub mod invoice;
pub mod line_item;
pub mod organization;
pub mod payment;
pub mod summary;
pub mod vendor;

pub use organization::{
    Entity as OrganizationEntity,
    Model as Organization,
    ActiveModel as OrganizationActiveModel,
    Column as OrganizationColumn,
};

pub use department::{
    Entity as DepartmentEntity,
    Model as Department,
    ActiveModel as DepartmentActiveModel,
    Column as DepartmentColumn,
};

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use vendor::{
    Entity as VendorEntity,
    Model as Vendor,
    ActiveModel as VendorActiveModel,
    Column as VendorColumn,
};

pub use customer::{
    Entity as CustomerEntity,
    Model as Customer,
    ActiveModel as CustomerActiveModel,
    Column as CustomerColumn,
};

pub use invoice::{
    Entity as InvoiceEntity,
    Model as Invoice,
    ActiveModel as InvoiceActiveModel,
    Column as InvoiceColumn,
};

pub use payment::{
    Entity as PaymentEntity,
    Model as Payment,
    ActiveModel as PaymentActiveModel,
    Column as PaymentColumn,
};

pub use summary::{
    Entity as SummaryEntity,
    Model as Summary,
    ActiveModel as SummaryActiveModel,
    Column as SummaryColumn,
};

pub use line_item::{
    Entity as LineItemEntity,
    Model as LineItem,
    ActiveModel as LineItemActiveModel,
    Column as LineItemColumn,
};
