//! HTTP handlers, one module per resource.
//!
//! Public reads take `MaybeIdentity` and consult `policy::can_read`;
//! mutations take `Identity` and consult `policy::can_mutate` before touching
//! the repository. Every handler returns `Result<_, AppError>`.

pub mod articles;
pub mod reviews;
pub mod session;
pub mod taxonomy;
