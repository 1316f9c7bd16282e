//! Authoring session: the single writer for one invoice being edited.
//!
//! Every edit arrives as a [`Command`] and is applied to a copy of the state, which replaces the
//! live state only if the whole command succeeds. Observers follow changes through a revision
//! counter published on a `watch` channel. At most one export runs per session at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::bilingual::FieldResolution;
use crate::document::{Invoice, ItemField, Template, TemplateRegistry};
use crate::error::{Error, Result};
use crate::render::{RenderOptions, VisualTree, project};

/// A single atomic edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SetInvoiceNumber { value: String },
    SetPartyName { value: String },
    SetDate { value: NaiveDate },
    SetTaxEnabled { value: bool },
    SetTaxRate { value: f64 },
    AddItem,
    UpdateItem { index: usize, field: ItemField },
    RemoveItem { index: usize },
    ReorderItems { from: usize, to: usize },
    AddTag { value: String },
    RemoveTag { value: String },
    SelectTemplate { id: String },
    UpsertTemplate { template: Template },
    DeleteTemplate { id: String },
}

impl Command {
    /// Whether the command edits the invoice itself (and so bumps `updated_at`)
    const fn edits_invoice(&self) -> bool {
        !matches!(
            self,
            Self::SelectTemplate { .. } | Self::UpsertTemplate { .. } | Self::DeleteTemplate { .. }
        )
    }
}

#[derive(Clone)]
struct State {
    invoice: Invoice,
    templates: TemplateRegistry,
    template_id: String,
}

impl State {
    fn apply(&mut self, command: Command) -> Result<()> {
        let invoice = &mut self.invoice;
        match command {
            Command::SetInvoiceNumber { value } => invoice.set_invoice_number(value),
            Command::SetPartyName { value } => invoice.set_party_name(value),
            Command::SetDate { value } => invoice.set_date(value),
            Command::SetTaxEnabled { value } => invoice.set_tax_enabled(value),
            Command::SetTaxRate { value } => invoice.set_tax_rate(value)?,
            Command::AddItem => {
                invoice.add_item();
            }
            Command::UpdateItem { index, field } => invoice.update_item(index, field)?,
            Command::RemoveItem { index } => {
                invoice.remove_item(index)?;
            }
            Command::ReorderItems { from, to } => invoice.reorder(from, to)?,
            Command::AddTag { value } => {
                invoice.add_tag(&value);
            }
            Command::RemoveTag { value } => {
                invoice.remove_tag(&value);
            }
            Command::SelectTemplate { id } => {
                if self.templates.get(&id).is_none() {
                    return Err(Error::InvariantViolation(format!("unknown template {id:?}")));
                }
                self.template_id = id;
            }
            Command::UpsertTemplate { template } => self.templates.upsert(template),
            Command::DeleteTemplate { id } => {
                self.templates.delete(&id)?;
                if self.template_id == id {
                    self.template_id = self.templates.first().id.clone();
                }
            }
        }
        Ok(())
    }
}

/// Clears the session's export flag when dropped
#[derive(Debug)]
pub struct ExportTicket {
    busy: Arc<AtomicBool>,
}

impl Drop for ExportTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// State container for one invoice being authored
pub struct AuthoringSession {
    state: State,
    revision: watch::Sender<u64>,
    exporting: Arc<AtomicBool>,
}

impl AuthoringSession {
    pub fn new(invoice: Invoice, templates: TemplateRegistry) -> Self {
        let template_id = templates.first().id.clone();
        let (revision, _) = watch::channel(0);
        Self {
            state: State {
                invoice,
                templates,
                template_id,
            },
            revision,
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub const fn invoice(&self) -> &Invoice {
        &self.state.invoice
    }

    pub const fn templates(&self) -> &TemplateRegistry {
        &self.state.templates
    }

    /// The selected template
    pub fn template(&self) -> &Template {
        self.state.templates.get_or_default(&self.state.template_id)
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Follow revisions of this session
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Apply `command` atomically; on error the session is unchanged.
    ///
    /// Returns the new revision.
    pub fn apply(&mut self, command: Command, now: DateTime<Utc>) -> Result<u64> {
        let edits_invoice = command.edits_invoice();
        let mut next = self.state.clone();
        next.apply(command)?;
        if edits_invoice {
            next.invoice.touch(now);
        }
        self.state = next;

        self.revision.send_modify(|r| *r += 1);
        let revision = self.revision();
        debug!("Session revision {}", revision);
        Ok(revision)
    }

    /// Apply a series of commands as one unit
    pub fn apply_all(&mut self, commands: Vec<Command>, now: DateTime<Utc>) -> Result<u64> {
        let mut next = self.state.clone();
        let mut edits_invoice = false;
        for command in commands {
            edits_invoice |= command.edits_invoice();
            next.apply(command)?;
        }
        if edits_invoice {
            next.invoice.touch(now);
        }
        self.state = next;
        self.revision.send_modify(|r| *r += 1);
        Ok(self.revision())
    }

    /// Store the outcome of resolving item `index`'s description.
    ///
    /// When the description was typed in the target script, the back-filled canonical text
    /// becomes the description and the typed text its translation, in one revision.
    /// A degraded resolution leaves the item untouched and returns its warning.
    pub fn apply_resolution(
        &mut self,
        index: usize,
        resolution: &FieldResolution,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        match resolution {
            FieldResolution::Resolved { variants } => {
                let typed = self
                    .state
                    .invoice
                    .items()
                    .get(index)
                    .map(|item| item.description.trim().to_string())
                    .ok_or(Error::IndexOutOfRange {
                        index,
                        len: self.state.invoice.items().len(),
                    })?;

                // Target-script input was back-filled: the canonical text replaces what was typed
                let mut commands = Vec::with_capacity(2);
                if typed != variants.canonical {
                    commands.push(Command::UpdateItem {
                        index,
                        field: ItemField::Description(variants.canonical.clone()),
                    });
                }
                commands.push(Command::UpdateItem {
                    index,
                    field: ItemField::TranslatedDescription(Some(variants.translated.clone())),
                });
                self.apply_all(commands, now)?;
                Ok(None)
            }
            FieldResolution::Degraded { warning, .. } => Ok(Some(warning.clone())),
        }
    }

    /// Project the invoice through the selected template
    pub fn render(&self, options: &RenderOptions) -> Result<VisualTree> {
        project(&self.state.invoice, self.template(), options)
    }

    /// Mark an export as running. Fails with `ExportInProgress` while another ticket is alive.
    pub fn begin_export(&self) -> Result<ExportTicket> {
        self.exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ExportInProgress)?;
        Ok(ExportTicket {
            busy: Arc::clone(&self.exporting),
        })
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bilingual::Variants;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 16, 10, minute, 0).unwrap()
    }

    fn session() -> AuthoringSession {
        let date = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        let invoice = Invoice::new("INV-001", "Mehta Builders", date, at(0));
        AuthoringSession::new(invoice, TemplateRegistry::new())
    }

    #[test]
    fn test_apply_updates_totals_and_revision() {
        let mut s = session();
        let mut rx = s.subscribe();

        s.apply(
            Command::UpdateItem {
                index: 0,
                field: ItemField::Quantity(10.0),
            },
            at(1),
        )
        .unwrap();
        let rev = s
            .apply(
                Command::UpdateItem {
                    index: 0,
                    field: ItemField::Rate(16_500.0),
                },
                at(2),
            )
            .unwrap();

        assert_eq!(rev, 2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
        assert!((s.invoice().subtotal() - 165_000.0).abs() < 1e-9);
        assert_eq!(s.invoice().updated_at(), at(2));
    }

    #[test]
    fn test_failed_command_leaves_state_unchanged() {
        let mut s = session();
        let before = s.invoice().clone();

        let err = s.apply(Command::RemoveItem { index: 0 }, at(5)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(s.invoice(), &before);
        assert_eq!(s.revision(), 0);

        let err = s
            .apply(
                Command::UpdateItem {
                    index: 3,
                    field: ItemField::Rate(1.0),
                },
                at(5),
            )
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 3, len: 1 }));
        assert_eq!(s.invoice(), &before);
    }

    #[test]
    fn test_apply_all_is_atomic() {
        let mut s = session();
        let before = s.invoice().clone();

        let result = s.apply_all(
            vec![
                Command::AddItem,
                Command::SetPartyName {
                    value: "Patel Traders".into(),
                },
                Command::UpdateItem {
                    index: 1,
                    field: ItemField::Quantity(f64::NAN),
                },
            ],
            at(3),
        );
        assert!(result.is_err());
        assert_eq!(s.invoice(), &before);
    }

    #[test]
    fn test_template_commands() {
        let mut s = session();
        let custom = Template::named("Modern");
        let id = custom.id.clone();

        s.apply(Command::UpsertTemplate { template: custom }, at(1)).unwrap();
        s.apply(Command::SelectTemplate { id: id.clone() }, at(1)).unwrap();
        assert_eq!(s.template().name, "Modern");
        assert_eq!(s.invoice().updated_at(), at(0));

        s.apply(Command::DeleteTemplate { id }, at(2)).unwrap();
        assert_eq!(s.template().id, crate::document::DEFAULT_TEMPLATE_ID);

        let err = s
            .apply(
                Command::SelectTemplate {
                    id: "missing".into(),
                },
                at(2),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_export_ticket_is_exclusive() {
        let s = session();
        let ticket = s.begin_export().unwrap();
        assert!(s.is_exporting());
        assert!(matches!(s.begin_export(), Err(Error::ExportInProgress)));

        drop(ticket);
        assert!(!s.is_exporting());
        assert!(s.begin_export().is_ok());
    }

    #[test]
    fn test_apply_resolution() {
        let mut s = session();
        let resolved = FieldResolution::Resolved {
            variants: Variants {
                canonical: "Tiles fitting".into(),
                translated: "ટાઇલ્સ ફિટિંગ".into(),
                mixed_script: None,
            },
        };
        assert_eq!(s.apply_resolution(0, &resolved, at(1)).unwrap(), None);
        assert_eq!(
            s.invoice().items()[0].translated_description.as_deref(),
            Some("ટાઇલ્સ ફિટિંગ")
        );

        let degraded = FieldResolution::Degraded {
            canonical: "Grouting".into(),
            warning: "translation unavailable".into(),
        };
        let rev = s.revision();
        assert_eq!(
            s.apply_resolution(0, &degraded, at(2)).unwrap().as_deref(),
            Some("translation unavailable")
        );
        assert_eq!(s.revision(), rev);
    }

    #[test]
    fn test_apply_resolution_backfills_typed_target_script() {
        let mut s = session();
        s.apply(
            Command::UpdateItem {
                index: 0,
                field: ItemField::Description("ટાઇલ્સ ફિટિંગ".into()),
            },
            at(1),
        )
        .unwrap();
        let rev = s.revision();

        let resolved = FieldResolution::Resolved {
            variants: Variants {
                canonical: "Tiles fitting".into(),
                translated: "ટાઇલ્સ ફિટિંગ".into(),
                mixed_script: Some("tiles fitting".into()),
            },
        };
        assert_eq!(s.apply_resolution(0, &resolved, at(2)).unwrap(), None);

        let item = &s.invoice().items()[0];
        assert_eq!(item.description, "Tiles fitting");
        assert_eq!(item.translated_description.as_deref(), Some("ટાઇલ્સ ફિટિંગ"));
        assert_eq!(s.revision(), rev + 1);
    }

    #[test]
    fn test_apply_resolution_out_of_range() {
        let mut s = session();
        let resolved = FieldResolution::Resolved {
            variants: Variants {
                canonical: "Tiles fitting".into(),
                translated: "ટાઇલ્સ ફિટિંગ".into(),
                mixed_script: None,
            },
        };
        assert!(matches!(
            s.apply_resolution(3, &resolved, at(1)),
            Err(Error::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_command_json() {
        let command: Command = serde_json::from_str(
            r#"{"type":"update_item","index":0,"field":{"field":"rate","value":33.33}}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            Command::UpdateItem {
                index: 0,
                field: ItemField::Rate(33.33),
            }
        );
    }
}
