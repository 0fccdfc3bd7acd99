/// Options for a single save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Event name to record instead of the derived one. Normalized like
    /// `InvoicePaid` → `INVOICE_PAID` and used for this save only.
    pub outbox_event: Option<String>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save recording `event` instead of the derived event name.
    pub fn event(event: impl Into<String>) -> Self {
        Self {
            outbox_event: Some(event.into()),
        }
    }
}
