//! Client side of Folio: the portfolio form, the shareable view and PDF export.

pub mod api;
pub mod error;
pub mod export;
pub mod form;
pub mod view;

#[cfg(test)]
mod test_support;
