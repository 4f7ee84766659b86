//! Cursor-paged admin product listing over a document store.
//!
//! - [`pager`] holds [`PagedCollectionCache`], the page fetcher with its
//!   cursor table and deletion repair.
//! - [`store`] defines the [`DocumentStore`] collaborator and its memory,
//!   SQLite and Firestore backends.
//! - [`catalog`] normalizes raw documents into [`Product`] records.

pub mod catalog;
pub mod config;
pub mod logging;
pub mod pager;
pub mod store;

pub use catalog::{FromDocument, Product, Rating};
pub use pager::{Page, PageError, PagedCollectionCache};
pub use store::{Cursor, Document, DocumentStore, OrderedQuery};
