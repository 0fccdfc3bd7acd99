mod outboxable;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Outboxable)]
// ============================================================================

/// Derive macro that enrols a struct in outbox tracking.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Outboxable)]
/// #[outboxable(name = "Billing::Invoice", table = "invoices")]
/// struct Invoice {
///     #[outboxable(identifier)]
///     pub id: i64,
///     pub customer: String,
/// }
/// ```
///
/// - `#[outboxable(name = "...")]` sets the fully qualified aggregate name
///   that event names and outbox resolution are derived from.
///   If omitted, defaults to the struct name (no namespace).
/// - `#[outboxable(table = "...")]` sets the table the aggregate lives in.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[outboxable(validate = path::to_fn)]` plugs in a
///   `fn(&Self, &mut Errors)` validation hook.
/// - `#[outboxable(identifier)]` marks the primary key field. If omitted,
///   a field named `identifier` is used, then a field named `id`.
///
/// The identifier field type must convert into `AggregateIdentifier`.
#[proc_macro_derive(Outboxable, attributes(outboxable))]
pub fn derive_outboxable(input: TokenStream) -> TokenStream {
    outboxable::derive_outboxable(input)
}
