//! Terminal client for the FactuFácil invoice request service.
//!
//! Customers and guests file invoice requests against a store's receipts;
//! store staff review and resolve them. [`app::App`] ties the pieces
//! together and [`terminal`] drives it interactively.

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feedback;
pub mod form;
pub mod lookup;
pub mod model;
pub mod profiles;
pub mod requests;
pub mod router;
pub mod session;
pub mod share;
pub mod staff_users;
pub mod storage;
pub mod terminal;
pub mod upload;

#[cfg(test)]
mod testing;
