//! Translates directive-annotated GraphQL type definitions into an augmented GraphQL schema,
//! and operations against that schema into Cypher statements.
//!
//! ## Usage
//!
//! Build a [`GraphCypher`] from type definitions and a [`Driver`]. It hands out
//! [`ExecutableSchema`]s, which execute requests by compiling each root field into one Cypher
//! statement and running it through the driver.
//!
//! ```ignore
//! let library = GraphCypher::builder()
//!     .type_defs(type_defs)
//!     .driver(driver)
//!     .build()?;
//! let schema = library.schema()?;
//! let response = schema.execute(request, &RequestContext::default()).await;
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_patterns,
    unused,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod auth;
pub mod config;
pub mod error;
pub mod execute;
pub(crate) mod filter;
pub mod graphql;
pub mod model;
pub(crate) mod schema;
pub mod subscriptions;
pub(crate) mod translate;
pub(crate) mod utils;

pub use crate::config::Features;
pub use crate::config::RequestContext;
pub use crate::error::CompileError;
pub use crate::error::DriverError;
pub use crate::error::GraphCypherError;
pub use crate::error::SingleValidationError;
pub use crate::error::ValidationErrors;
pub use crate::execute::ExecutableSchema;
pub use crate::execute::GraphCypher;
pub use crate::execute::driver::Driver;
pub use crate::execute::driver::FieldResolver;
pub use crate::execute::driver::Transaction;
pub use crate::graphql::Request;
pub use crate::graphql::Response;
pub use crate::model::TypeModel;
pub use crate::subscriptions::BroadcastEngine;
pub use crate::subscriptions::SubscriptionsEngine;
pub use crate::translate::CompiledOperation;
