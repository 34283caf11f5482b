// SPDX-License-Identifier: MPL-2.0
//! # wikilink
//!
//! MediaWiki title resolution and a Wikibase entity model that computes `wbeditentity` payloads.
//!
//! ## Overview
//!
//! `wikilink` is the data core of a MediaWiki/Wikibase client. It does not talk to any wiki by
//! itself: site configuration is handed in through the [`site::Sites`] trait and entity reads and
//! writes go through the [`wikibase::Repository`] trait, both implemented by the caller (usually on
//! top of an HTTP client).
//!
//! **Key Features:**
//!
//! - **Link Resolution**: Parses the text of a `[[wiki link]]` into site, namespace, title, section
//!   and anchor, following MediaWiki's title grammar including chained interwiki prefixes.
//! - **Strict Title Validation**: Invalid titles are rejected with a specific reason, never repaired.
//! - **Wikibase Entities**: Items, properties, lexemes, forms, senses and media info with their
//!   labels, descriptions, aliases, statements and sitelinks.
//! - **Minimal Diffs**: Changes are serialised as a diff against the last fetched state, exactly in
//!   the shape `wbeditentity` expects.
//!
//! ## Getting Started
//!
//! ### Installation
//!
//! ```toml
//! [dependencies]
//! wikilink = "0.1.0"
//! ```
//!
//! ### Resolving Links
//!
//! ```rust
//! use std::sync::Arc;
//! use wikilink::link::Link;
//! use wikilink::site::{Site, SiteInfo, SiteRegistry, Sites};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = SiteRegistry::new();
//!     registry
//!         .register_family("wikipedia", ["en", "de"])
//!         .register(SiteInfo::new("wikipedia", "en"))
//!         .register(SiteInfo::new("wikipedia", "de"));
//!     let sites: Arc<dyn Sites> = Arc::new(registry);
//!     let en = Site::load(&sites, "wikipedia", "en")?;
//!
//!     let link = Link::new("de:user_talk:example#History|the talk page", &en);
//!     assert_eq!(link.site()?.code(), "de");
//!     assert_eq!(link.namespace()?, 3);
//!     assert_eq!(link.title()?, "Example");
//!     assert_eq!(link.section()?, Some("History"));
//!     assert_eq!(link.anchor(), Some("the talk page"));
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Diffing Entity Data
//!
//! Every collection serialises either completely or as a diff against a baseline:
//!
//! ```rust
//! use serde_json::json;
//! use wikilink::wikibase::LanguageDict;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let baseline = json!({"en": {"language": "en", "value": "Foo"}});
//!     let mut labels = LanguageDict::from_json(&baseline)?;
//!     labels.insert("en", "Bar");
//!     labels.insert("de", "Baz");
//!
//!     assert_eq!(
//!         labels.to_json(Some(&baseline))?,
//!         json!({
//!             "en": {"language": "en", "value": "Bar"},
//!             "de": {"language": "de", "value": "Baz"}
//!         })
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! A [`wikibase::WikibaseEntity`] does the same for all of its attributes. It loads itself through
//! its repository on first access, remembers what it got as the baseline and sends only the
//! difference on [`wikibase::WikibaseEntity::edit_entity`].
//!
//! ## Modules and API
//!
//! ### `site` Module
//!
//! **Purpose**: Namespaces, interwiki maps and the [`site::Sites`] oracle.
//!
//! Sites can be configured by hand, or from real siteinfo with the `siteinfo` module:
//! [`site::SiteInfo::from_api_json`] reads an `action=query&meta=siteinfo` response and
//! [`site::SiteInfo::from_dump_header`] reads the `<siteinfo>` header of an XML dump.
//!
//! ### `link` Module
//!
//! **Purpose**: [`link::Link`] parses lazily on first access and caches the outcome, including a
//! failure. Errors are [`link::LinkError`]: either an invalid title with an
//! [`link::InvalidTitleReason`] or an interwiki prefix whose site is unknown.
//!
//! ### `wikibase` Module
//!
//! **Purpose**: The entity model.
//!
//! Statements of an entity live in a [`wikibase::ClaimCollection`] and are addressed through
//! [`wikibase::ClaimHandle`]s. Writes that the API offers for single statements (`wbsetclaim`,
//! `wbsetreference`, `wbsetqualifier`, ...) are methods of the entity taking such a handle:
//!
//! ```rust,ignore
//! let handle = entity.add_claim(claim, EditOptions::default())?;
//! entity.add_source(&handle, source, EditOptions::default())?;
//! entity.change_rank(&handle, Rank::Preferred)?;
//! ```
//!
//! A handle stops working once its statement is removed or the entity is reloaded.
//!
//! ## Features and Configuration
//!
//! ### Logging and Error Handling
//!
//! - Uses the `tracing` crate for debug output and warnings. No subscriber is installed by the library.
//! - Siteinfo parsing skips malformed namespace entries with a warning. Enable the `strict` feature
//!   to make it fail instead:
//!
//! ```toml
//! [dependencies]
//! wikilink = { version = "0.1.0", features = ["strict"] }
//! ```
//!
//! ### Command Line
//!
//! The `cli` feature builds the `wikilink` binary, which resolves links against siteinfo files and
//! prints the `wbeditentity` payload between two entity JSON files.
//!
//! ## Dependencies
//!
//! - **`compact_str`**: Used in the public API for short strings (site codes, namespace names).
//! - **`serde_json`**: Entity data is exchanged as [`serde_json::Value`].
//!
//! ## Licensing
//!
//! This project is licensed under the Mozilla Public License 2.0.

pub mod link;
pub mod site;
pub mod siteinfo;
#[cfg(test)]
mod test_support;
pub mod utils;
pub mod wikibase;
