//! Invoice data model, templates and their storage records.

mod model;
mod records;
mod template;

pub use model::{DEFAULT_UNIT, Invoice, ItemField, LineItem, generate_invoice_number};
pub use records::{InvoiceItemRecord, InvoiceRecord, TemplateRecord, TranslationRecord};
pub use template::{
    Colors, CompanyProfile, DEFAULT_TEMPLATE_ID, FooterDesign, Position, Template,
    TemplateRegistry, Toggles, Watermark,
};
