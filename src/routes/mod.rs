/// Router Module Index
///
/// Splits the API by access level. The split is enforced with a router
/// layer, so a protected endpoint cannot be exposed by forgetting an
/// extractor in its handler.

/// Routes open to anonymous callers. Reads still apply the visibility
/// policy, so a session changes what they return.
pub mod public;

/// Routes behind the `Identity` middleware. Requires a valid session.
pub mod authenticated;
