//! Share message construction and messaging handoff links.

use std::collections::HashMap;

use crate::document::Invoice;
use crate::error::Result;
use crate::numeric::format_currency;

/// Message used when the user has not customized one
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Hello {{client_name}},\n\
    Please find invoice {{invoice_number}} for {{total_amount}}.\n\
    Download: {{invoice_link}}";

const WHATSAPP_BASE: &str = "https://wa.me/?text=";

/// Substitute `{{name}}` placeholders. Unknown placeholders are left as written.
pub fn build_share_message(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            // Unterminated: copy the remainder verbatim
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match variables.get(name.trim()) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Messaging deep link with `message` prefilled
pub fn whatsapp_url(message: &str) -> String {
    format!("{WHATSAPP_BASE}{}", urlencoding::encode(message))
}

/// The well-known placeholder values for an invoice
#[derive(Debug, Clone, Default)]
pub struct ShareVariables {
    pub invoice_number: String,
    pub client_name: String,
    pub total_amount: String,
    pub invoice_link: String,
}

impl ShareVariables {
    pub fn for_invoice(invoice: &Invoice, invoice_link: impl Into<String>) -> Result<Self> {
        Ok(Self {
            invoice_number: invoice.invoice_number().to_string(),
            client_name: invoice.party_name().to_string(),
            total_amount: format_currency(invoice.total())?,
            invoice_link: invoice_link.into(),
        })
    }

    pub fn into_map(self) -> HashMap<String, String> {
        HashMap::from([
            ("invoice_number".to_string(), self.invoice_number),
            ("client_name".to_string(), self.client_name),
            ("total_amount".to_string(), self.total_amount),
            ("invoice_link".to_string(), self.invoice_link),
        ])
    }
}
