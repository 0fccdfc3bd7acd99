//! Name inflection shared by event naming, outbox resolution and config keys.

use heck::ToSnakeCase;

/// Underscore a type path or identifier.
///
/// `::` becomes `/` and every path segment is snake-cased:
///
/// ```
/// use transactional_outbox::inflector::underscore;
///
/// assert_eq!(underscore("Billing::Invoice"), "billing/invoice");
/// assert_eq!(underscore("FakeModel"), "fake_model");
/// assert_eq!(underscore("HTTPServer"), "http_server");
/// ```
pub fn underscore(name: &str) -> String {
    name.split("::")
        .flat_map(|segment| segment.split('/'))
        .map(|segment| segment.to_snake_case())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a type path into its namespace segments and its final segment,
/// all underscored.
///
/// `"Billing::Accounts::Invoice"` yields `(["billing", "accounts"], "invoice")`.
pub fn split_type_name(name: &str) -> (Vec<String>, String) {
    let underscored = underscore(name.trim_start_matches("::"));
    let mut segments: Vec<String> = underscored
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    let last = segments.pop().unwrap_or_default();
    (segments, last)
}

/// Underscored path of the namespace directly enclosing `name`, or `None`
/// for top-level types.
pub fn namespace_of(name: &str) -> Option<String> {
    let (namespace, _) = split_type_name(name);
    if namespace.is_empty() {
        None
    } else {
        Some(namespace.join("/"))
    }
}
